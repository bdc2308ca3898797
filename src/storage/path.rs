//! Object paths and the storage namespace convention:
//!
//! - `users/{user}/temp/{draft}/{filename}` for drafts
//! - `users/{user}/items/{item}/{filename}` for saved items
//! - `.../thumbnails/{filename}` next to each of them

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::ids::{random_base36, DraftId, ItemId, UserId};
use crate::error::StoreError;

/// Namespace segment holding thumbnails
pub const THUMBNAILS: &str = "thumbnails";

/// Check a single path segment: non-empty, no `/`, not `.` or `..`
pub fn validate_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("empty segment".to_string());
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err("segment contains a path separator".to_string());
    }
    if segment == "." || segment == ".." {
        return Err("relative segment".to_string());
    }
    if segment.chars().any(char::is_control) {
        return Err("segment contains control characters".to_string());
    }
    Ok(())
}

/// A `/`-delimited object location in the blob store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Parse a path; leading and trailing slashes are ignored
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        Self::from_segments(path.trim_matches('/').split('/'))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            validate_segment(segment)
                .map_err(|reason| StoreError::InvalidPath(format!("`{segment}`: {reason}")))?;
            if !joined.is_empty() {
                joined.push('/');
            }
            joined.push_str(segment);
        }
        if joined.is_empty() {
            return Err(StoreError::InvalidPath("empty path".to_string()));
        }
        Ok(Self(joined))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last segment
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn parent(&self) -> Option<ObjectPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| ObjectPath(parent.to_string()))
    }

    pub fn join(&self, segment: &str) -> Result<ObjectPath, StoreError> {
        validate_segment(segment)
            .map_err(|reason| StoreError::InvalidPath(format!("`{segment}`: {reason}")))?;
        Ok(ObjectPath(format!("{}/{}", self.0, segment)))
    }

    /// `a/b/file.jpg` → `a/b/thumbnails/file.jpg`
    pub fn thumbnail_counterpart(&self) -> Option<ObjectPath> {
        let parent = self.parent()?;
        Some(ObjectPath(format!(
            "{}/{}/{}",
            parent.0,
            THUMBNAILS,
            self.file_name()
        )))
    }

    /// True when `self` is `prefix` itself or lies anywhere below it
    pub fn starts_with(&self, prefix: &ObjectPath) -> bool {
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }

    /// True when `self` lies exactly one segment below `prefix`
    pub fn is_direct_child_of(&self, prefix: &ObjectPath) -> bool {
        self.parent().as_ref() == Some(prefix)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectPath> for String {
    fn from(path: ObjectPath) -> String {
        path.0
    }
}

/// A storage namespace owned by one user: a draft or a saved item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Draft { user: UserId, draft: DraftId },
    Item { user: UserId, item: ItemId },
}

impl Namespace {
    pub fn draft(user: &UserId, draft: &DraftId) -> Self {
        Namespace::Draft {
            user: user.clone(),
            draft: draft.clone(),
        }
    }

    pub fn item(user: &UserId, item: &ItemId) -> Self {
        Namespace::Item {
            user: user.clone(),
            item: item.clone(),
        }
    }

    pub fn user(&self) -> &UserId {
        match self {
            Namespace::Draft { user, .. } | Namespace::Item { user, .. } => user,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Namespace::Draft { .. })
    }

    /// Root prefix of the namespace
    pub fn root(&self) -> ObjectPath {
        // Identifiers are validated single segments
        let (user, kind, id) = match self {
            Namespace::Draft { user, draft } => (user.as_str(), "temp", draft.as_str()),
            Namespace::Item { user, item } => (user.as_str(), "items", item.as_str()),
        };
        ObjectPath(format!("users/{user}/{kind}/{id}"))
    }

    pub fn thumbnails_root(&self) -> ObjectPath {
        ObjectPath(format!("{}/{}", self.root().0, THUMBNAILS))
    }

    pub fn object(&self, filename: &str) -> Result<ObjectPath, StoreError> {
        self.root().join(filename)
    }

    pub fn thumbnail(&self, filename: &str) -> Result<ObjectPath, StoreError> {
        self.thumbnails_root().join(filename)
    }

    pub fn contains(&self, path: &ObjectPath) -> bool {
        path.starts_with(&self.root())
    }
}

/// Unique stored filename for an upload: `<unix-millis>_<6 base36>_<stem>.jpg`.
///
/// Processed images are always JPEG, so the extension is normalised. The stem keeps
/// only ASCII alphanumerics, `-` and `_`.
pub fn generate_filename(original_name: &str) -> String {
    let stem = original_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let stem = stem.rsplit_once('.').map_or(stem, |(stem, _)| stem);
    let mut clean: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if clean.trim_matches('_').is_empty() {
        clean = "image".to_string();
    }

    format!(
        "{}_{}_{}.jpg",
        Utc::now().timestamp_millis(),
        random_base36(6),
        clean
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::parse("u1").unwrap()
    }

    #[test]
    fn test_namespace_roots() {
        let draft = DraftId::parse("temp_1700000000_ab12cd").unwrap();
        let item = ItemId::parse("item_42").unwrap();

        assert_eq!(
            Namespace::draft(&user(), &draft).root().as_str(),
            "users/u1/temp/temp_1700000000_ab12cd"
        );
        let ns = Namespace::item(&user(), &item);
        assert_eq!(ns.root().as_str(), "users/u1/items/item_42");
        assert_eq!(
            ns.thumbnail("a.jpg").unwrap().as_str(),
            "users/u1/items/item_42/thumbnails/a.jpg"
        );
    }

    #[test]
    fn test_thumbnail_counterpart_shares_filename() {
        let path = ObjectPath::parse("users/u1/items/i/b.jpg").unwrap();
        let thumb = path.thumbnail_counterpart().unwrap();
        assert_eq!(thumb.as_str(), "users/u1/items/i/thumbnails/b.jpg");
        assert_eq!(thumb.file_name(), path.file_name());
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert!(ObjectPath::parse("users/u1/../u2/x.jpg").is_err());
        assert!(ObjectPath::parse("users//x.jpg").is_err());
        assert!(ObjectPath::parse("").is_err());
        assert_eq!(ObjectPath::parse("/a/b/").unwrap().as_str(), "a/b");
    }

    #[test]
    fn test_prefix_matching_respects_segments() {
        let root = ObjectPath::parse("users/u1/items/i1").unwrap();
        assert!(ObjectPath::parse("users/u1/items/i1/a.jpg").unwrap().starts_with(&root));
        assert!(!ObjectPath::parse("users/u1/items/i10/a.jpg").unwrap().starts_with(&root));
        assert!(ObjectPath::parse("users/u1/items/i1/a.jpg")
            .unwrap()
            .is_direct_child_of(&root));
        assert!(!ObjectPath::parse("users/u1/items/i1/thumbnails/a.jpg")
            .unwrap()
            .is_direct_child_of(&root));
    }

    #[test]
    fn test_generated_filename() {
        let name = generate_filename("My Falcon (boxed).PNG");
        assert!(name.ends_with("_My_Falcon__boxed_.jpg"), "{name}");
        assert!(validate_segment(&name).is_ok());

        let name = generate_filename("../../etc/passwd");
        assert!(name.ends_with("_passwd.jpg"), "{name}");

        let name = generate_filename("???.webp");
        assert!(name.ends_with("_image.jpg"), "{name}");

        assert_ne!(generate_filename("a.jpg"), generate_filename("a.jpg"));
    }
}
