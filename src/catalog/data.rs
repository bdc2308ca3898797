/// Catalog data structures
///
/// These structs represent the data model that flows between the database layer,
/// the image pipeline and the CLI.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{ItemId, UserId};

/// Ownership status of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemStatus {
    #[default]
    Owned,
    Wishlist,
    Sold,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Owned => "Owned",
            ItemStatus::Wishlist => "Wishlist",
            ItemStatus::Sold => "Sold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "owned" => Some(ItemStatus::Owned),
            "wishlist" => Some(ItemStatus::Wishlist),
            "sold" => Some(ItemStatus::Sold),
            _ => None,
        }
    }
}

/// Where an item's metadata came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetadataSource {
    AutoApi,
    Scraped,
    #[default]
    Manual,
}

impl MetadataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataSource::AutoApi => "autoApi",
            MetadataSource::Scraped => "scraped",
            MetadataSource::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "autoApi" => Some(MetadataSource::AutoApi),
            "scraped" => Some(MetadataSource::Scraped),
            "manual" => Some(MetadataSource::Manual),
            _ => None,
        }
    }
}

/// A collection item as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub user_id: UserId,
    pub name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub manufacturer: Option<String>,
    pub year_released: Option<i32>,
    pub tags: Vec<String>,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub status: ItemStatus,
    /// Gallery order is display order
    pub image_urls: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub metadata_source: MetadataSource,
    /// Category-specific extras (set number, scale, piece count, ...)
    pub additional_data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an item; the catalog assigns id and timestamps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub manufacturer: Option<String>,
    pub year_released: Option<i32>,
    pub tags: Vec<String>,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub status: ItemStatus,
    pub image_urls: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub metadata_source: MetadataSource,
    pub additional_data: Map<String, Value>,
}

impl NewItem {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            ..Self::default()
        }
    }
}

/// A user-defined category with its sub-categories and default tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub sub_categories: Vec<String>,
    pub default_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCategory {
    pub name: String,
    pub sub_categories: Vec<String>,
    pub default_tags: Vec<String>,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
