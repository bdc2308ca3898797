/// In-memory filtering and sorting of listed items
use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::data::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Name,
    #[default]
    CreatedAt,
    YearReleased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Search, category and tag filter plus sort key.
///
/// `search` matches name, manufacturer and notes case-insensitively. Every tag in
/// `tags` must be present on the item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub sort_by: SortBy,
    pub order: SortOrder,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = [
                Some(item.name.as_str()),
                item.manufacturer.as_deref(),
                item.notes.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if &item.category != category {
                return false;
            }
        }

        self.tags.iter().all(|tag| item.tags.contains(tag))
    }

    /// Matching items in sort order
    pub fn apply(&self, items: &[Item]) -> Vec<Item> {
        let mut matched: Vec<Item> = items.iter().filter(|i| self.matches(i)).cloned().collect();
        matched.sort_by(|a, b| {
            let ord = compare(self.sort_by, a, b);
            match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        matched
    }
}

fn compare(sort_by: SortBy, a: &Item, b: &Item) -> Ordering {
    match sort_by {
        SortBy::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
        // Items without a year sort as year 0
        SortBy::YearReleased => a
            .year_released
            .unwrap_or(0)
            .cmp(&b.year_released.unwrap_or(0)),
    }
}

/// Distinct categories across `items`, sorted
pub fn categories_of(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .map(|i| i.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct tags across `items`, sorted
pub fn tags_of(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .flat_map(|i| i.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
