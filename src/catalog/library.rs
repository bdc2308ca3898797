use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::data::{Category, Item, ItemStatus, MetadataSource, NewCategory, NewItem};
use super::edit::ItemPatch;
use super::ids::{ItemId, UserId};
use crate::error::CatalogError;

/// Categories created for a user whose catalog has none yet
pub const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("Books", &["Fiction", "Non-fiction", "Comics"]),
    ("LEGO", &["Star Wars", "Technic", "City", "Creator"]),
    ("Funko Pop", &["Movies", "Games", "Anime"]),
    ("Diecast", &["1:18", "1:24", "1:43", "1:64"]),
];

const ITEM_COLUMNS: &str = "id, user_id, name, category, sub_category, manufacturer, \
     year_released, tags_json, condition, notes, status, image_urls_json, thumbnail_url, \
     metadata_source, additional_json, created_at, updated_at";

/// The Library manages the SQLite catalog database.
/// It stores item records and categories, scoped per user.
pub struct Library {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl Library {
    /// Open or create the catalog at `db_path`, creating parent directories
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        info!(path = %db_path.display(), "Catalog database opened");

        let library = Library {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Catalog that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let library = Library {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Get the path where the database should be stored
    /// - Linux: ~/.local/share/collection-vault/collection.db
    /// - macOS: ~/Library/Application Support/collection-vault/collection.db
    /// - Windows: %APPDATA%\collection-vault\collection.db
    pub fn default_db_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("collection-vault");
        path.push("collection.db");
        Some(path)
    }

    /// Get the path to the database file (None for in-memory catalogs)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Poisoned)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<(), CatalogError> {
        let conn = self.conn()?;

        // List-valued and map-valued fields are stored as JSON text
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                name            TEXT NOT NULL,
                category        TEXT NOT NULL,
                sub_category    TEXT,
                manufacturer    TEXT,
                year_released   INTEGER,
                tags_json       TEXT NOT NULL DEFAULT '[]',
                condition       TEXT,
                notes           TEXT,
                status          TEXT NOT NULL DEFAULT 'Owned',
                image_urls_json TEXT NOT NULL DEFAULT '[]',
                thumbnail_url   TEXT,
                metadata_source TEXT NOT NULL DEFAULT 'manual',
                additional_json TEXT NOT NULL DEFAULT '{}',
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL,
                name                TEXT NOT NULL,
                sub_categories_json TEXT NOT NULL DEFAULT '[]',
                default_tags_json   TEXT NOT NULL DEFAULT '[]',
                created_at          INTEGER NOT NULL,
                updated_at          INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_user_created
                ON items(user_id, created_at DESC);

            CREATE INDEX IF NOT EXISTS idx_categories_user_name
                ON categories(user_id, name);",
        )?;

        debug!("Catalog schema initialized");
        Ok(())
    }

    /// Get a count of a user's items
    pub fn item_count(&self, user: &UserId) -> Result<i64, CatalogError> {
        let count = self.conn()?.query_row(
            "SELECT COUNT(*) FROM items WHERE user_id = ?1",
            [user.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Insert a new item. Returns the stored record with its assigned id.
    pub fn add_item(&self, user: &UserId, new: NewItem) -> Result<Item, CatalogError> {
        let now = Utc::now();
        let item = Item {
            id: ItemId::generate(),
            user_id: user.clone(),
            name: new.name,
            category: new.category,
            sub_category: new.sub_category,
            manufacturer: new.manufacturer,
            year_released: new.year_released,
            tags: new.tags,
            condition: new.condition,
            notes: new.notes,
            status: new.status,
            image_urls: new.image_urls,
            thumbnail_url: new.thumbnail_url,
            metadata_source: new.metadata_source,
            additional_data: new.additional_data,
            created_at: now,
            updated_at: now,
        };

        self.conn()?.execute(
            &format!(
                "INSERT INTO items ({ITEM_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                item.id.as_str(),
                item.user_id.as_str(),
                item.name,
                item.category,
                item.sub_category,
                item.manufacturer,
                item.year_released,
                serde_json::to_string(&item.tags)?,
                item.condition,
                item.notes,
                item.status.as_str(),
                serde_json::to_string(&item.image_urls)?,
                item.thumbnail_url,
                item.metadata_source.as_str(),
                serde_json::to_string(&item.additional_data)?,
                item.created_at.timestamp_millis(),
                item.updated_at.timestamp_millis(),
            ],
        )?;

        info!(user = %user, item = %item.id, name = %item.name, "Item added");
        Ok(item)
    }

    pub fn get_item(&self, user: &UserId, id: &ItemId) -> Result<Item, CatalogError> {
        read_item(&*self.conn()?, user, id)
    }

    /// Get all of a user's items, newest first
    pub fn list_items(&self, user: &UserId) -> Result<Vec<Item>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE user_id = ?1 ORDER BY created_at DESC, id"
        ))?;

        let raw_items = stmt
            .query_map([user.as_str()], RawItem::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        raw_items.into_iter().map(RawItem::into_item).collect()
    }

    /// Apply a partial update; bumps `updated_at`. Returns the updated record.
    pub fn update_item(
        &self,
        user: &UserId,
        id: &ItemId,
        patch: &ItemPatch,
    ) -> Result<Item, CatalogError> {
        if patch.is_empty() {
            return self.get_item(user, id);
        }
        self.modify_item(user, id, |item| patch.apply(item))
    }

    /// Read, change and write back one item inside a single transaction, so no
    /// other write to the record can land in between. Bumps `updated_at`.
    pub fn modify_item(
        &self,
        user: &UserId,
        id: &ItemId,
        modify: impl FnOnce(&mut Item),
    ) -> Result<Item, CatalogError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut item = read_item(&tx, user, id)?;
        modify(&mut item);
        item.updated_at = Utc::now();

        tx.execute(
            "UPDATE items SET name = ?1, category = ?2, sub_category = ?3, manufacturer = ?4,
                year_released = ?5, tags_json = ?6, condition = ?7, notes = ?8, status = ?9,
                image_urls_json = ?10, thumbnail_url = ?11, metadata_source = ?12,
                additional_json = ?13, updated_at = ?14
             WHERE user_id = ?15 AND id = ?16",
            params![
                item.name,
                item.category,
                item.sub_category,
                item.manufacturer,
                item.year_released,
                serde_json::to_string(&item.tags)?,
                item.condition,
                item.notes,
                item.status.as_str(),
                serde_json::to_string(&item.image_urls)?,
                item.thumbnail_url,
                item.metadata_source.as_str(),
                serde_json::to_string(&item.additional_data)?,
                item.updated_at.timestamp_millis(),
                user.as_str(),
                id.as_str(),
            ],
        )?;
        tx.commit()?;

        debug!(user = %user, item = %id, "Item updated");
        Ok(item)
    }

    /// Rewrite only the image list (and `updated_at`) of an item
    pub fn set_image_urls(
        &self,
        user: &UserId,
        id: &ItemId,
        urls: &[String],
    ) -> Result<(), CatalogError> {
        let changed = self.conn()?.execute(
            "UPDATE items SET image_urls_json = ?1, updated_at = ?2 WHERE user_id = ?3 AND id = ?4",
            params![
                serde_json::to_string(urls)?,
                Utc::now().timestamp_millis(),
                user.as_str(),
                id.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(format!("item {id}")));
        }
        debug!(user = %user, item = %id, count = urls.len(), "Image list persisted");
        Ok(())
    }

    pub fn delete_item(&self, user: &UserId, id: &ItemId) -> Result<(), CatalogError> {
        let changed = self.conn()?.execute(
            "DELETE FROM items WHERE user_id = ?1 AND id = ?2",
            params![user.as_str(), id.as_str()],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(format!("item {id}")));
        }
        info!(user = %user, item = %id, "Item deleted");
        Ok(())
    }

    /// Get a user's categories ordered by name
    pub fn list_categories(&self, user: &UserId) -> Result<Vec<Category>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, sub_categories_json, default_tags_json, created_at, updated_at
             FROM categories WHERE user_id = ?1 ORDER BY name COLLATE NOCASE",
        )?;

        let rows = stmt
            .query_map([user.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, subs, tags, created, updated)| {
                Ok(Category {
                    id,
                    name,
                    sub_categories: serde_json::from_str(&subs)?,
                    default_tags: serde_json::from_str(&tags)?,
                    created_at: from_millis(created),
                    updated_at: from_millis(updated),
                })
            })
            .collect()
    }

    pub fn add_category(&self, user: &UserId, new: NewCategory) -> Result<Category, CatalogError> {
        let now = Utc::now();
        let category = Category {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: new.name,
            sub_categories: new.sub_categories,
            default_tags: new.default_tags,
            created_at: now,
            updated_at: now,
        };

        self.conn()?.execute(
            "INSERT INTO categories
                (id, user_id, name, sub_categories_json, default_tags_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                category.id,
                user.as_str(),
                category.name,
                serde_json::to_string(&category.sub_categories)?,
                serde_json::to_string(&category.default_tags)?,
                now.timestamp_millis(),
                now.timestamp_millis(),
            ],
        )?;
        Ok(category)
    }

    /// Replace a category's name, sub-categories and default tags
    pub fn update_category(
        &self,
        user: &UserId,
        id: &str,
        update: NewCategory,
    ) -> Result<(), CatalogError> {
        let changed = self.conn()?.execute(
            "UPDATE categories SET name = ?1, sub_categories_json = ?2, default_tags_json = ?3,
                updated_at = ?4
             WHERE user_id = ?5 AND id = ?6",
            params![
                update.name,
                serde_json::to_string(&update.sub_categories)?,
                serde_json::to_string(&update.default_tags)?,
                Utc::now().timestamp_millis(),
                user.as_str(),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(format!("category {id}")));
        }
        Ok(())
    }

    pub fn delete_category(&self, user: &UserId, id: &str) -> Result<(), CatalogError> {
        let changed = self.conn()?.execute(
            "DELETE FROM categories WHERE user_id = ?1 AND id = ?2",
            params![user.as_str(), id],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(format!("category {id}")));
        }
        Ok(())
    }

    /// Create the default categories if the user has none. Returns how many were added.
    pub fn seed_default_categories(&self, user: &UserId) -> Result<usize, CatalogError> {
        if !self.list_categories(user)?.is_empty() {
            return Ok(0);
        }

        for (name, subs) in DEFAULT_CATEGORIES {
            self.add_category(
                user,
                NewCategory {
                    name: (*name).to_string(),
                    sub_categories: subs.iter().map(|s| (*s).to_string()).collect(),
                    default_tags: Vec::new(),
                },
            )?;
        }

        info!(user = %user, count = DEFAULT_CATEGORIES.len(), "Seeded default categories");
        Ok(DEFAULT_CATEGORIES.len())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn read_item(conn: &Connection, user: &UserId, id: &ItemId) -> Result<Item, CatalogError> {
    let raw = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE user_id = ?1 AND id = ?2"),
            params![user.as_str(), id.as_str()],
            RawItem::from_row,
        )
        .optional()?;

    raw.ok_or_else(|| CatalogError::NotFound(format!("item {id}")))?
        .into_item()
}

/// Row as stored, before JSON columns are decoded
struct RawItem {
    id: String,
    user_id: String,
    name: String,
    category: String,
    sub_category: Option<String>,
    manufacturer: Option<String>,
    year_released: Option<i32>,
    tags_json: String,
    condition: Option<String>,
    notes: Option<String>,
    status: String,
    image_urls_json: String,
    thumbnail_url: Option<String>,
    metadata_source: String,
    additional_json: String,
    created_at: i64,
    updated_at: i64,
}

impl RawItem {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawItem {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            sub_category: row.get(4)?,
            manufacturer: row.get(5)?,
            year_released: row.get(6)?,
            tags_json: row.get(7)?,
            condition: row.get(8)?,
            notes: row.get(9)?,
            status: row.get(10)?,
            image_urls_json: row.get(11)?,
            thumbnail_url: row.get(12)?,
            metadata_source: row.get(13)?,
            additional_json: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_item(self) -> Result<Item, CatalogError> {
        Ok(Item {
            id: ItemId::parse(&self.id)?,
            user_id: UserId::parse(&self.user_id)?,
            name: self.name,
            category: self.category,
            sub_category: self.sub_category,
            manufacturer: self.manufacturer,
            year_released: self.year_released,
            tags: serde_json::from_str(&self.tags_json)?,
            condition: self.condition,
            notes: self.notes,
            status: ItemStatus::parse(&self.status).unwrap_or_default(),
            image_urls: serde_json::from_str(&self.image_urls_json)?,
            thumbnail_url: self.thumbnail_url,
            metadata_source: MetadataSource::parse(&self.metadata_source).unwrap_or_default(),
            additional_data: serde_json::from_str::<Map<String, Value>>(&self.additional_json)?,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    #[test]
    fn test_add_and_get_item() {
        let library = Library::open_in_memory().unwrap();
        let mut new = NewItem::new("Millennium Falcon", "LEGO");
        new.tags = vec!["ucs".to_string()];
        new.additional_data.insert("setNumber".to_string(), "75192".into());

        let item = library.add_item(&user("u1"), new).unwrap();
        let fetched = library.get_item(&user("u1"), &item.id).unwrap();

        assert_eq!(fetched.name, "Millennium Falcon");
        assert_eq!(fetched.tags, vec!["ucs"]);
        assert_eq!(fetched.additional_data["setNumber"], "75192");
        assert_eq!(fetched.status, ItemStatus::Owned);
        assert_eq!(library.item_count(&user("u1")).unwrap(), 1);
    }

    #[test]
    fn test_items_are_scoped_per_user() {
        let library = Library::open_in_memory().unwrap();
        let item = library
            .add_item(&user("u1"), NewItem::new("Dune", "Books"))
            .unwrap();

        let err = library.get_item(&user("u2"), &item.id).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
        assert!(library.list_items(&user("u2")).unwrap().is_empty());
        assert!(library
            .set_image_urls(&user("u2"), &item.id, &["x".to_string()])
            .is_err());
    }

    #[test]
    fn test_set_image_urls_is_partial() {
        let library = Library::open_in_memory().unwrap();
        let item = library
            .add_item(&user("u1"), NewItem::new("Batmobile", "Diecast"))
            .unwrap();

        let urls = vec!["mem://a".to_string(), "mem://b".to_string()];
        library.set_image_urls(&user("u1"), &item.id, &urls).unwrap();

        let fetched = library.get_item(&user("u1"), &item.id).unwrap();
        assert_eq!(fetched.image_urls, urls);
        assert_eq!(fetched.name, "Batmobile");
        assert!(fetched.updated_at >= item.updated_at);
    }

    #[test]
    fn test_update_item_patch() {
        let library = Library::open_in_memory().unwrap();
        let item = library
            .add_item(&user("u1"), NewItem::new("Groot", "Funko Pop"))
            .unwrap();

        let patch = ItemPatch {
            status: Some(ItemStatus::Wishlist),
            year_released: Some(Some(2014)),
            ..ItemPatch::default()
        };
        let updated = library.update_item(&user("u1"), &item.id, &patch).unwrap();
        assert_eq!(updated.status, ItemStatus::Wishlist);

        let fetched = library.get_item(&user("u1"), &item.id).unwrap();
        assert_eq!(fetched.year_released, Some(2014));
        assert_eq!(fetched.category, "Funko Pop");
    }

    #[test]
    fn test_modify_item_sees_the_latest_write() {
        let library = Library::open_in_memory().unwrap();
        let item = library
            .add_item(&user("u1"), NewItem::new("Dune", "Books"))
            .unwrap();

        // Image list written by a gallery commit
        library
            .set_image_urls(&user("u1"), &item.id, &["mem://b".to_string()])
            .unwrap();
        let patch = ItemPatch {
            notes: Some(Some("first edition".to_string())),
            ..ItemPatch::default()
        };
        library.update_item(&user("u1"), &item.id, &patch).unwrap();
        let updated = library
            .modify_item(&user("u1"), &item.id, |item| {
                item.image_urls.push("mem://c".to_string())
            })
            .unwrap();

        assert_eq!(updated.image_urls, vec!["mem://b", "mem://c"]);
        assert_eq!(updated.notes.as_deref(), Some("first edition"));
    }

    #[test]
    fn test_concurrent_modifications_are_not_lost() {
        let library = std::sync::Arc::new(Library::open_in_memory().unwrap());
        let item = library
            .add_item(&user("u1"), NewItem::new("Batmobile", "Diecast"))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let library = library.clone();
                let id = item.id.clone();
                std::thread::spawn(move || {
                    library
                        .modify_item(&user("u1"), &id, |item| {
                            item.image_urls.push(format!("mem://{n}"))
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let fetched = library.get_item(&user("u1"), &item.id).unwrap();
        assert_eq!(fetched.image_urls.len(), 8);
    }

    #[test]
    fn test_delete_item() {
        let library = Library::open_in_memory().unwrap();
        let item = library
            .add_item(&user("u1"), NewItem::new("Dune", "Books"))
            .unwrap();
        library.delete_item(&user("u1"), &item.id).unwrap();
        assert!(matches!(
            library.delete_item(&user("u1"), &item.id),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_categories() {
        let library = Library::open_in_memory().unwrap();
        assert_eq!(library.seed_default_categories(&user("u1")).unwrap(), 4);
        assert_eq!(library.seed_default_categories(&user("u1")).unwrap(), 0);

        let names: Vec<String> = library
            .list_categories(&user("u1"))
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Books", "Diecast", "Funko Pop", "LEGO"]);

        let lego = library
            .list_categories(&user("u1"))
            .unwrap()
            .into_iter()
            .find(|c| c.name == "LEGO")
            .unwrap();
        library
            .update_category(&user("u1"), &lego.id, NewCategory::new("LEGO Sets"))
            .unwrap();
        library.delete_category(&user("u1"), &lego.id).unwrap();
        assert_eq!(library.list_categories(&user("u1")).unwrap().len(), 3);
    }

    #[test]
    fn test_on_disk_catalog_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("collection.db");

        let id = {
            let library = Library::open(&path).unwrap();
            library
                .add_item(&user("u1"), NewItem::new("Dune", "Books"))
                .unwrap()
                .id
        };

        let reopened = Library::open(&path).unwrap();
        assert_eq!(reopened.get_item(&user("u1"), &id).unwrap().name, "Dune");
        assert_eq!(reopened.path(), Some(path.as_path()));
    }
}
