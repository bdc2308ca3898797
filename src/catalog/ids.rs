/// Identifiers that scope storage namespaces.
///
/// Every identifier is a single path segment, so a user, draft or item can never
/// alias another one's storage location.
use std::fmt;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::storage::path::validate_segment;

/// Prefix that marks a draft identifier
pub const DRAFT_PREFIX: &str = "temp_";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random lowercase base36 string of `len` characters
pub(crate) fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

fn checked(kind: &str, value: &str) -> Result<String, CatalogError> {
    validate_segment(value)
        .map_err(|reason| CatalogError::InvalidId(format!("{kind} `{value}`: {reason}")))?;
    Ok(value.to_string())
}

/// Opaque user identifier supplied by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        checked("user id", value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Client-generated identifier of an item that has not been saved yet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DraftId(String);

impl DraftId {
    /// `temp_<unix-millis>_<9 base36 chars>`
    pub fn generate() -> Self {
        Self(format!(
            "{DRAFT_PREFIX}{}_{}",
            Utc::now().timestamp_millis(),
            random_base36(9)
        ))
    }

    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        let value = checked("draft id", value)?;
        if !value.starts_with(DRAFT_PREFIX) || value.len() == DRAFT_PREFIX.len() {
            return Err(CatalogError::InvalidId(format!(
                "draft id `{value}` must start with `{DRAFT_PREFIX}`"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Durable item identifier assigned by the catalog on insert
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        let value = checked("item id", value)?;
        if value.starts_with(DRAFT_PREFIX) {
            return Err(CatalogError::InvalidId(format!(
                "item id `{value}` uses the draft prefix"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_id_impls {
    ($($ty:ident),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = CatalogError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$ty> for String {
            fn from(id: $ty) -> String {
                id.0
            }
        }
    )*};
}

string_id_impls!(UserId, DraftId, ItemId);
