// src/site/sqlite.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use super::model::{Site, SiteId, SiteStatus};
use super::store::{SiteStore, StoreError};

/// Raw column values as read from a `sites` row.
type SiteRow = (i64, String, String, Option<DateTime<Utc>>);

/// Columns added after the first schema; applied by `migrate` when missing.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "status",
        "ALTER TABLE sites ADD COLUMN status TEXT NOT NULL DEFAULT 'Unknown'",
    ),
    ("last_checked", "ALTER TABLE sites ADD COLUMN last_checked TEXT"),
];

/// SQLite-backed store. The connection is shared behind a mutex and driven
/// from blocking tasks so probes and requests never stall the runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and bring the schema up to date.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self::from_connection(conn)?;
        info!("SQLite site store ready at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&guard)
        })
        .await?
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL
        )",
        [],
    )?;

    for (column, ddl) in MIGRATIONS {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('sites') WHERE name = ?1",
            params![column],
            |row| row.get::<_, i64>(0),
        )? > 0;

        if !exists {
            info!("Applying migration: adding {} column to sites", column);
            conn.execute(ddl, [])?;
        }
    }

    Ok(())
}

fn into_site((id, url, status, last_checked): SiteRow) -> Result<Site, StoreError> {
    let id = id as SiteId;
    let status = status
        .parse::<SiteStatus>()
        .map_err(|reason| StoreError::Corrupt { id, reason })?;
    Ok(Site {
        id,
        url,
        status,
        last_checked,
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SiteRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

#[async_trait]
impl SiteStore for SqliteStore {
    async fn create(&self, url: &str) -> Result<Site, StoreError> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sites (url, status, last_checked) VALUES (?1, ?2, NULL)",
                params![url, SiteStatus::Unknown.as_str()],
            )?;
            Ok(Site {
                id: conn.last_insert_rowid() as SiteId,
                url,
                status: SiteStatus::Unknown,
                last_checked: None,
            })
        })
        .await
    }

    async fn find(&self, id: SiteId) -> Result<Option<Site>, StoreError> {
        self.with_conn(move |conn| {
            let row = conn
                .prepare_cached("SELECT id, url, status, last_checked FROM sites WHERE id = ?1")?
                .query_row(params![id as i64], read_row)
                .optional()?;
            row.map(into_site).transpose()
        })
        .await
    }

    async fn find_all(&self) -> Result<Vec<Site>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT id, url, status, last_checked FROM sites ORDER BY id")?;
            let sites = stmt
                .query_map([], read_row)?
                .map(|row| into_site(row?))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sites)
        })
        .await
    }

    async fn save(&self, site: &Site) -> Result<(), StoreError> {
        let site = site.clone();
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "INSERT INTO sites (id, url, status, last_checked) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    status = excluded.status,
                    last_checked = excluded.last_checked",
            )?
            .execute(params![
                site.id as i64,
                site.url,
                site.status.as_str(),
                site.last_checked
            ])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find() {
        let store = SqliteStore::open_in_memory().unwrap();
        let site = store.create("example.com").await.unwrap();

        assert_eq!(site.status, SiteStatus::Unknown);
        assert!(site.last_checked.is_none());

        let found = store.find(site.id).await.unwrap().unwrap();
        assert_eq!(found, site);
        assert!(store.find(site.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_status_and_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut site = store.create("example.com").await.unwrap();
        let checked_at = Utc::now();
        site.record_check(SiteStatus::Blocked, checked_at);
        store.save(&site).await.unwrap();

        let found = store.find(site.id).await.unwrap().unwrap();
        assert_eq!(found.status, SiteStatus::Blocked);
        assert_eq!(found.last_checked, Some(checked_at));
    }

    #[tokio::test]
    async fn test_find_all_returns_every_site() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create("a.example").await.unwrap();
        store.create("b.example").await.unwrap();

        let sites = store.find_all().await.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].url, "a.example");
        assert_eq!(sites[1].url, "b.example");
    }

    #[test]
    fn test_migration_adds_missing_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE sites (id INTEGER PRIMARY KEY AUTOINCREMENT, url TEXT NOT NULL)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO sites (url) VALUES ('legacy.example')", [])
            .unwrap();

        migrate(&conn).unwrap();
        // Running twice is a no-op.
        migrate(&conn).unwrap();

        let (status, last_checked): (String, Option<DateTime<Utc>>) = conn
            .query_row("SELECT status, last_checked FROM sites", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(status, "Unknown");
        assert!(last_checked.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_status_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.create("example.com").await.unwrap().id;
        store
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE sites SET status = 'Sideways' WHERE id = ?1",
                    params![id as i64],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(
            store.find(id).await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
