/// Partial updates to catalog records
///
/// Only the fields that are `Some` are written; everything else keeps its stored
/// value. A patch round-trips through JSON so it can be built from CLI input or an
/// analysis result.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::data::{Item, ItemStatus, MetadataSource};

/// Field-level patch for an item
///
/// Optional fields use `Option<Option<T>>`: `Some(None)` clears the field.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<Option<String>>,
    pub manufacturer: Option<Option<String>>,
    pub year_released: Option<Option<i32>>,
    pub tags: Option<Vec<String>>,
    pub condition: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub status: Option<ItemStatus>,
    pub image_urls: Option<Vec<String>>,
    pub thumbnail_url: Option<Option<String>>,
    pub metadata_source: Option<MetadataSource>,
    pub additional_data: Option<Map<String, Value>>,
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// True when applying the patch would change nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an in-memory item (timestamps untouched)
    pub fn apply(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(sub_category) = &self.sub_category {
            item.sub_category = sub_category.clone();
        }
        if let Some(manufacturer) = &self.manufacturer {
            item.manufacturer = manufacturer.clone();
        }
        if let Some(year) = self.year_released {
            item.year_released = year;
        }
        if let Some(tags) = &self.tags {
            item.tags = tags.clone();
        }
        if let Some(condition) = &self.condition {
            item.condition = condition.clone();
        }
        if let Some(notes) = &self.notes {
            item.notes = notes.clone();
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(urls) = &self.image_urls {
            item.image_urls = urls.clone();
        }
        if let Some(thumbnail_url) = &self.thumbnail_url {
            item.thumbnail_url = thumbnail_url.clone();
        }
        if let Some(source) = self.metadata_source {
            item.metadata_source = source;
        }
        if let Some(extra) = &self.additional_data {
            item.additional_data = extra.clone();
        }
    }
}
