//! Local embedded-database storage adapter.
//!
//! Records live in a SQLite database with four tables keyed by `name`:
//! `documents`, `stylesheets`, `document_contents` and
//! `stylesheet_contents`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use mdstore_common::{
    Collection, ContentRecord, Error, ImageBlob, ImageRef, NamedRecord, RecordName, Result,
};

use crate::adapter::StorageAdapter;
use crate::session::Session;

/// Schema version recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 2;

/// Path that opens a private in-memory database.
const IN_MEMORY: &str = ":memory:";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        name TEXT PRIMARY KEY,
        datetime INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS stylesheets (
        name TEXT PRIMARY KEY,
        datetime INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS document_contents (
        name TEXT PRIMARY KEY,
        text TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS stylesheet_contents (
        name TEXT PRIMARY KEY,
        text TEXT NOT NULL
    );
"#;

/// Local adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("mdstore").join("mdstore.db"),
        }
    }
}

fn storage_err(err: rusqlite::Error) -> Error {
    Error::Storage(err.to_string())
}

/// SQLite-backed storage adapter.
///
/// Blocking database calls run on tokio's blocking pool; the connection is
/// shared behind a mutex.
pub struct LocalAdapter {
    conn: Arc<Mutex<Connection>>,
}

impl LocalAdapter {
    /// Open or create the database at `path`.
    ///
    /// # Postconditions
    /// - Parent directory exists
    /// - All four tables exist and `user_version` is [`SCHEMA_VERSION`]
    ///
    /// # Errors
    /// - Database cannot be opened
    /// - Database was written by a newer schema version
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.as_os_str() != IN_MEMORY {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let conn = Connection::open(path).map_err(storage_err)?;
        Self::init_schema(&conn)?;

        info!("Local database opened at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(IN_MEMORY)
    }

    pub fn from_config(config: &LocalConfig) -> Result<Self> {
        Self::open(&config.path)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(storage_err)?;

        if version > SCHEMA_VERSION {
            return Err(Error::Storage(format!(
                "Database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        conn.execute_batch(SCHEMA).map_err(storage_err)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .map_err(storage_err)?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::Storage("Database lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Storage(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl StorageAdapter for LocalAdapter {
    fn name(&self) -> &str {
        "local"
    }

    async fn auth(&self, _session: &mut Session, _code: &str) -> Result<()> {
        debug!("Local adapter needs no authorization");
        Ok(())
    }

    async fn add_image(&self, _session: &Session, image: ImageBlob) -> Result<ImageRef> {
        Ok(ImageRef::new(image.to_data_url()))
    }

    async fn save_record(
        &self,
        _session: &Session,
        collection: Collection,
        name: &RecordName,
        content: &str,
    ) -> Result<()> {
        let name = name.as_str().to_string();
        let content = content.to_string();
        let now = Utc::now().timestamp_millis();

        debug!("Saving {}/{}", collection, name);
        self.with_conn(move |conn| {
            // Metadata and content commit together.
            let tx = conn.transaction().map_err(storage_err)?;
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (name, datetime) VALUES (?1, ?2)",
                    collection.as_str()
                ),
                params![name, now],
            )
            .map_err(storage_err)?;
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (name, text) VALUES (?1, ?2)",
                    collection.content_table()
                ),
                params![name, content],
            )
            .map_err(storage_err)?;
            tx.commit().map_err(storage_err)
        })
        .await
    }

    async fn list_records(
        &self,
        _session: &Session,
        collection: Collection,
    ) -> Result<Vec<NamedRecord>> {
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(&format!("SELECT name, datetime FROM {}", collection.as_str()))
                    .map_err(storage_err)?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                    .map_err(storage_err)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(storage_err)?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(name, millis)| {
                let datetime = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                    Error::Storage(format!("Invalid timestamp {} for '{}'", millis, name))
                })?;
                Ok(NamedRecord { name, datetime })
            })
            .collect()
    }

    async fn get_record(
        &self,
        _session: &Session,
        collection: Collection,
        name: &RecordName,
    ) -> Result<ContentRecord> {
        let key = name.as_str().to_string();
        let text = self
            .with_conn(move |conn| {
                conn.query_row(
                    &format!("SELECT text FROM {} WHERE name = ?1", collection.content_table()),
                    [key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(storage_err)
            })
            .await?;

        match text {
            Some(text) => Ok(ContentRecord {
                name: name.to_string(),
                text,
            }),
            None => Err(Error::NotFound(format!("{}/{}", collection, name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_contract() {
        let adapter = LocalAdapter::in_memory().unwrap();
        contract::check_all(&adapter, &Session::new()).await;
    }

    #[tokio::test]
    async fn test_local_notes_scenario() {
        let adapter = LocalAdapter::in_memory().unwrap();
        let session = Session::new();
        let before = Utc::now() - chrono::Duration::seconds(1);

        adapter.save_document(&session, "notes", "hello").await.unwrap();

        let listed = adapter.list_documents(&session).await.unwrap();
        let entry = listed.iter().find(|r| r.name == "notes").unwrap();
        assert!(entry.datetime >= before);
        assert!(entry.datetime <= Utc::now());

        let doc = adapter.get_document(&session, "notes").await.unwrap();
        assert_eq!(
            doc,
            ContentRecord {
                name: "notes".to_string(),
                text: "hello".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_local_names_are_case_sensitive() {
        let adapter = LocalAdapter::in_memory().unwrap();
        let session = Session::new();

        adapter.save_document(&session, "Notes", "upper").await.unwrap();
        adapter.save_document(&session, "notes", "lower").await.unwrap();

        assert_eq!(adapter.list_documents(&session).await.unwrap().len(), 2);
        assert_eq!(adapter.get_document(&session, "Notes").await.unwrap().text, "upper");
        assert_eq!(adapter.get_document(&session, "notes").await.unwrap().text, "lower");
    }

    #[tokio::test]
    async fn test_local_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db").join("mdstore.db");
        let session = Session::new();

        {
            let adapter = LocalAdapter::open(&path).unwrap();
            adapter.save_stylesheet(&session, "theme", "h1 {}").await.unwrap();
        }

        let adapter = LocalAdapter::open(&path).unwrap();
        let sheet = adapter.get_stylesheet(&session, "theme").await.unwrap();
        assert_eq!(sheet.text, "h1 {}");
    }

    #[tokio::test]
    async fn test_local_rejects_newer_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("future.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("PRAGMA user_version = 99").unwrap();
        }

        let result = LocalAdapter::open(&path);
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_local_sets_schema_version() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("v.db");
        LocalAdapter::open(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_local_image_is_data_url() {
        let adapter = LocalAdapter::in_memory().unwrap();
        let image = ImageBlob::new(vec![1, 2, 3], "image/png");

        let reference = adapter.add_image(&Session::new(), image).await.unwrap();
        assert_eq!(reference.as_str(), "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn test_local_auth_is_noop() {
        let adapter = LocalAdapter::in_memory().unwrap();
        let mut session = Session::new();

        adapter.open_auth().await.unwrap();
        adapter.auth(&mut session, "code").await.unwrap();
        assert!(!session.is_authenticated());
    }
}
