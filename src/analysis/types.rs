/// Analysis request/response types and how a result fills in a new item
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{MetadataSource, NewItem};

/// Category hint sent with an image; selects the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionCategory {
    Books,
    Lego,
    Funko,
    Diecast,
    #[default]
    General,
}

impl CollectionCategory {
    pub const ALL: [CollectionCategory; 5] = [
        CollectionCategory::Books,
        CollectionCategory::Lego,
        CollectionCategory::Funko,
        CollectionCategory::Diecast,
        CollectionCategory::General,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionCategory::Books => "books",
            CollectionCategory::Lego => "lego",
            CollectionCategory::Funko => "funko",
            CollectionCategory::Diecast => "diecast",
            CollectionCategory::General => "general",
        }
    }

    /// Name of the matching catalog category
    pub fn display_name(&self) -> &'static str {
        match self {
            CollectionCategory::Books => "Books",
            CollectionCategory::Lego => "LEGO",
            CollectionCategory::Funko => "Funko Pop",
            CollectionCategory::Diecast => "Diecast",
            CollectionCategory::General => "General",
        }
    }

    /// Accepts wire names and catalog category names, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        CollectionCategory::ALL.into_iter().find(|c| {
            c.as_str() == value || c.display_name().to_ascii_lowercase() == value
        })
    }
}

impl fmt::Display for CollectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identified item details. Every field is optional; models leave out what they
/// cannot see.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemMetadata {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub condition: Option<String>,
    /// Estimated value in USD
    pub value: Option<f64>,
    pub description: Option<String>,
    pub rarity: Option<String>,
    pub additional_metadata: Map<String, Value>,
}

/// Per-field confidence in `0.0..=1.0`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfidenceScore {
    pub overall: f64,
    pub item_identification: f64,
    pub manufacturer: f64,
    pub release_year: f64,
    pub category: f64,
    pub sub_category: f64,
    pub condition: f64,
    pub estimated_value: f64,
    /// Category-specific scores (set number, piece count, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What the endpoint returns, before timing is attached
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AnalysisResponse {
    pub metadata: ItemMetadata,
    pub confidence: ConfidenceScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub metadata: ItemMetadata,
    pub confidence: ConfidenceScore,
    pub processing_time_ms: u64,
    pub model_version: String,
}

/// Minimum confidence for a field to be copied into an item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    pub overall: f64,
    pub name: f64,
    pub manufacturer: f64,
    pub release_year: f64,
    pub category: f64,
    pub sub_category: f64,
    pub condition: f64,
    pub estimated_value: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            overall: 0.7,
            name: 0.8,
            manufacturer: 0.7,
            release_year: 0.6,
            category: 0.8,
            sub_category: 0.7,
            condition: 0.6,
            estimated_value: 0.5,
        }
    }
}

impl AnalysisResult {
    /// Copy confident fields into `item` and mark it as auto-filled.
    ///
    /// Nothing is copied when the overall confidence is below its threshold.
    /// Returns the number of fields written.
    pub fn apply_to(&self, item: &mut NewItem, thresholds: &ConfidenceThresholds) -> usize {
        let meta = &self.metadata;
        let conf = &self.confidence;
        if conf.overall < thresholds.overall {
            return 0;
        }

        let mut applied = 0;
        let mut set = |target: &mut Option<String>, value: &Option<String>, score: f64, min: f64| {
            if let Some(value) = value.as_ref().filter(|v| !v.trim().is_empty()) {
                if score >= min {
                    *target = Some(value.trim().to_string());
                    applied += 1;
                }
            }
        };

        let mut name = None;
        set(&mut name, &meta.name, conf.item_identification, thresholds.name);
        let mut category = None;
        set(&mut category, &meta.category, conf.category, thresholds.category);
        set(&mut item.manufacturer, &meta.manufacturer, conf.manufacturer, thresholds.manufacturer);
        set(&mut item.sub_category, &meta.sub_category, conf.sub_category, thresholds.sub_category);
        set(&mut item.condition, &meta.condition, conf.condition, thresholds.condition);

        if let Some(name) = name {
            item.name = name;
        }
        if let Some(category) = category {
            item.category = category;
        }
        if let Some(year) = meta.year.filter(|_| conf.release_year >= thresholds.release_year) {
            item.year_released = Some(year);
            applied += 1;
        }
        if let Some(value) = meta.value.filter(|_| conf.estimated_value >= thresholds.estimated_value) {
            item.additional_data.insert("estimatedValue".to_string(), Value::from(value));
            applied += 1;
        }

        if item.notes.is_none() {
            item.notes = meta.description.clone().filter(|d| !d.trim().is_empty());
        }
        for (key, value) in &meta.additional_metadata {
            if !value.is_null() {
                item.additional_data.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        item.metadata_source = MetadataSource::AutoApi;
        applied
    }
}

/// Years arrive as numbers or numeric strings
fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(overall: f64) -> AnalysisResult {
        AnalysisResult {
            metadata: ItemMetadata {
                name: Some("Millennium Falcon".to_string()),
                manufacturer: Some("LEGO".to_string()),
                year: Some(2017),
                category: Some("LEGO".to_string()),
                sub_category: Some("Star Wars".to_string()),
                condition: Some("New".to_string()),
                value: Some(799.99),
                additional_metadata: [("setNumber".to_string(), Value::from("75192"))]
                    .into_iter()
                    .collect(),
                ..ItemMetadata::default()
            },
            confidence: ConfidenceScore {
                overall,
                item_identification: 0.95,
                manufacturer: 0.99,
                release_year: 0.5,
                category: 0.9,
                sub_category: 0.75,
                condition: 0.3,
                estimated_value: 0.6,
                extra: Map::new(),
            },
            processing_time_ms: 12,
            model_version: "1.0".to_string(),
        }
    }

    #[test]
    fn test_apply_respects_field_thresholds() {
        let mut item = NewItem::default();
        let applied = result(0.9).apply_to(&mut item, &ConfidenceThresholds::default());

        assert_eq!(applied, 5);
        assert_eq!(item.name, "Millennium Falcon");
        assert_eq!(item.category, "LEGO");
        assert_eq!(item.manufacturer.as_deref(), Some("LEGO"));
        assert_eq!(item.sub_category.as_deref(), Some("Star Wars"));
        // Below threshold
        assert_eq!(item.year_released, None);
        assert_eq!(item.condition, None);
        assert_eq!(item.additional_data["setNumber"], "75192");
        assert_eq!(item.metadata_source, MetadataSource::AutoApi);
    }

    #[test]
    fn test_low_overall_confidence_applies_nothing() {
        let mut item = NewItem::new("Mine", "Books");
        assert_eq!(result(0.4).apply_to(&mut item, &ConfidenceThresholds::default()), 0);
        assert_eq!(item, NewItem::new("Mine", "Books"));
    }

    #[test]
    fn test_metadata_parses_string_years_and_missing_fields() {
        let meta: ItemMetadata =
            serde_json::from_str(r#"{"name": "Dune", "year": "1965", "subCategory": "Sci-Fi"}"#).unwrap();
        assert_eq!(meta.year, Some(1965));
        assert_eq!(meta.sub_category.as_deref(), Some("Sci-Fi"));
        assert!(meta.manufacturer.is_none());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(CollectionCategory::parse("LEGO"), Some(CollectionCategory::Lego));
        assert_eq!(CollectionCategory::parse("funko pop"), Some(CollectionCategory::Funko));
        assert_eq!(CollectionCategory::parse("diecast"), Some(CollectionCategory::Diecast));
        assert_eq!(CollectionCategory::parse("stamps"), None);
    }
}
