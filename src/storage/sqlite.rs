//! SQLite-backed listing sink.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{ListingSink, SaveOutcome};
use crate::error::{HarvestError, Result};
use crate::models::ListingRecord;

/// Open a database connection with proper concurrency settings.
fn open_db(db_path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 30000;
    "#,
    )?;
    Ok(conn)
}

fn init_listings_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS listings (
            listing_id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            latitude REAL,
            longitude REAL,
            room_type TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT '',
            person_capacity INTEGER,
            beds INTEGER,
            baths REAL,
            bath_is_shared INTEGER NOT NULL DEFAULT 0,
            registration_number TEXT NOT NULL DEFAULT '',
            municipal_registration TEXT,
            provincial_registration TEXT,
            host_user_id TEXT NOT NULL DEFAULT '',
            host_name TEXT NOT NULL DEFAULT '',
            host_is_superhost INTEGER NOT NULL DEFAULT 0,
            record_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_listings_registration
            ON listings(registration_number);
    "#,
    )?;
    Ok(())
}

/// Write one record. `replace` selects upsert over insert-if-absent.
/// Returns the number of changed rows and whether the id existed before.
fn write_record(conn: &Connection, record: &ListingRecord, replace: bool) -> Result<(usize, bool)> {
    let n = &record.normalized;
    let json = serde_json::to_string(record)
        .map_err(|e| HarvestError::Sink(format!("failed to serialize {}: {}", n.listing_id, e)))?;

    let existed = listing_exists(conn, &n.listing_id)?;

    let sql = if replace {
        r#"
        INSERT INTO listings (
            listing_id, title, name, latitude, longitude, room_type, location,
            person_capacity, beds, baths, bath_is_shared, registration_number,
            municipal_registration, provincial_registration,
            host_user_id, host_name, host_is_superhost, record_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        ON CONFLICT(listing_id) DO UPDATE SET
            title = excluded.title,
            name = excluded.name,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            room_type = excluded.room_type,
            location = excluded.location,
            person_capacity = excluded.person_capacity,
            beds = excluded.beds,
            baths = excluded.baths,
            bath_is_shared = excluded.bath_is_shared,
            registration_number = excluded.registration_number,
            municipal_registration = excluded.municipal_registration,
            provincial_registration = excluded.provincial_registration,
            host_user_id = excluded.host_user_id,
            host_name = excluded.host_name,
            host_is_superhost = excluded.host_is_superhost,
            record_json = excluded.record_json,
            updated_at = CURRENT_TIMESTAMP
        "#
    } else {
        r#"
        INSERT OR IGNORE INTO listings (
            listing_id, title, name, latitude, longitude, room_type, location,
            person_capacity, beds, baths, bath_is_shared, registration_number,
            municipal_registration, provincial_registration,
            host_user_id, host_name, host_is_superhost, record_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#
    };

    let changed = conn.execute(
        sql,
        params![
            n.listing_id,
            n.title,
            n.name,
            n.latitude,
            n.longitude,
            n.room_type,
            n.location,
            n.person_capacity,
            n.beds,
            n.baths,
            n.bath_is_shared,
            n.registration_number,
            n.registration.municipal,
            n.registration.provincial,
            n.host.user_id,
            n.host.name,
            n.host.is_superhost,
            json,
        ],
    )?;

    Ok((changed, existed))
}

fn listing_exists(conn: &Connection, listing_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM listings WHERE listing_id = ?1",
            params![listing_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Listing sink backed by a single SQLite file.
///
/// Each operation opens its own connection on the blocking pool; WAL mode
/// lets concurrent workers write without stepping on each other.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    db_path: PathBuf,
}

impl SqliteSink {
    /// Open (creating if needed) the database and its schema.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = open_db(&db_path)?;
        init_listings_table(&conn)?;
        debug!("Opened listing database at {}", db_path.display());
        Ok(Self { db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(open_db(&self.db_path)?)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let sink = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = sink.connect()?;
            f(&conn)
        })
        .await
        .map_err(|e| HarvestError::Sink(format!("database task failed: {}", e)))?
    }

    pub async fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
            Ok(n as u64)
        })
        .await
    }

    async fn write(&self, record: &ListingRecord, replace: bool) -> SaveOutcome {
        let record = record.clone();
        let listing_id = record.listing_id().to_string();
        let result = self
            .with_conn(move |conn| write_record(conn, &record, replace))
            .await;

        match result {
            Ok((0, _)) => SaveOutcome::Duplicate,
            Ok((_, true)) if replace => SaveOutcome::Updated,
            Ok((_, true)) => SaveOutcome::Duplicate,
            Ok((_, false)) => SaveOutcome::Created,
            Err(e) => {
                warn!("Failed to store listing {}: {}", listing_id, e);
                SaveOutcome::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl ListingSink for SqliteSink {
    async fn exists(&self, listing_id: &str) -> Result<bool> {
        let listing_id = listing_id.to_string();
        self.with_conn(move |conn| listing_exists(conn, &listing_id))
            .await
    }

    async fn get(&self, listing_id: &str) -> Result<Option<ListingRecord>> {
        let listing_id = listing_id.to_string();
        self.with_conn(move |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT record_json FROM listings WHERE listing_id = ?1",
                    params![listing_id],
                    |row| row.get(0),
                )
                .optional()?;
            json.map(|j| {
                serde_json::from_str(&j).map_err(|e| {
                    HarvestError::Sink(format!("corrupt record {}: {}", listing_id, e))
                })
            })
            .transpose()
        })
        .await
    }

    async fn save(&self, record: &ListingRecord) -> SaveOutcome {
        self.write(record, false).await
    }

    async fn replace(&self, record: &ListingRecord) -> SaveOutcome {
        self.write(record, true).await
    }

    async fn listing_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT listing_id FROM listings ORDER BY listing_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListingDetail, NormalizedListing, RegistrationNumbers};
    use tempfile::tempdir;

    fn record(id: &str, beds: u32) -> ListingRecord {
        ListingRecord {
            normalized: NormalizedListing {
                listing_id: id.into(),
                title: "cozy suite".into(),
                beds: Some(beds),
                baths: Some(1.5),
                registration_number: "123456;ABC123".into(),
                registration: RegistrationNumbers {
                    municipal: Some("123456".into()),
                    provincial: Some("ABC123".into()),
                },
                ..Default::default()
            },
            raw: ListingDetail {
                listing_id: id.into(),
                beds_text: format!("{} beds", beds),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_created_then_duplicate() {
        let dir = tempdir().unwrap();
        let sink = SqliteSink::new(dir.path().join("listings.db")).unwrap();

        assert!(!sink.exists("42").await.unwrap());
        assert_eq!(sink.save(&record("42", 2)).await, SaveOutcome::Created);
        assert!(sink.exists("42").await.unwrap());
        assert_eq!(sink.save(&record("42", 3)).await, SaveOutcome::Duplicate);

        let stored = sink.get("42").await.unwrap().unwrap();
        assert_eq!(stored.normalized.beds, Some(2));
        assert_eq!(stored.raw.beds_text, "2 beds");
        assert_eq!(sink.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_updates() {
        let dir = tempdir().unwrap();
        let sink = SqliteSink::new(dir.path().join("listings.db")).unwrap();

        assert_eq!(sink.replace(&record("7", 1)).await, SaveOutcome::Created);
        assert_eq!(sink.replace(&record("7", 4)).await, SaveOutcome::Updated);
        let stored = sink.get("7").await.unwrap().unwrap();
        assert_eq!(stored.normalized.beds, Some(4));
    }

    #[tokio::test]
    async fn test_listing_ids_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("listings.db");
        {
            let sink = SqliteSink::new(&path).unwrap();
            sink.save(&record("2", 1)).await;
            sink.save(&record("1", 1)).await;
        }
        let sink = SqliteSink::new(&path).unwrap();
        assert_eq!(sink.listing_ids().await.unwrap(), vec!["1", "2"]);
        assert!(sink.get("missing").await.unwrap().is_none());
    }
}
