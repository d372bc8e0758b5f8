//! In-memory storage adapter for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use mdstore_common::{
    Collection, ContentRecord, Error, ImageBlob, ImageRef, NamedRecord, RecordName, Result,
};

use crate::adapter::StorageAdapter;
use crate::session::Session;

/// Stored record: metadata plus body.
#[derive(Debug, Clone)]
struct Entry {
    metadata: NamedRecord,
    text: String,
}

/// In-memory storage adapter.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Images are returned inline as `data:` URLs.
pub struct MemoryAdapter {
    storage: Arc<RwLock<HashMap<(Collection, String), Entry>>>,
}

impl MemoryAdapter {
    /// Create a new empty memory adapter.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Storage("Memory store lock poisoned".to_string())
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    async fn auth(&self, _session: &mut Session, _code: &str) -> Result<()> {
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
        let entry = Entry {
            metadata: NamedRecord {
                name: name.to_string(),
                datetime: Utc::now(),
            },
            text: content.to_string(),
        };

        self.storage
            .write()
            .map_err(poisoned)?
            .insert((collection, name.to_string()), entry);
        Ok(())
    }

    async fn list_records(
        &self,
        _session: &Session,
        collection: Collection,
    ) -> Result<Vec<NamedRecord>> {
        let storage = self.storage.read().map_err(poisoned)?;
        Ok(storage
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, entry)| entry.metadata.clone())
            .collect())
    }

    async fn get_record(
        &self,
        _session: &Session,
        collection: Collection,
        name: &RecordName,
    ) -> Result<ContentRecord> {
        let storage = self.storage.read().map_err(poisoned)?;
        storage
            .get(&(collection, name.to_string()))
            .map(|entry| ContentRecord {
                name: name.to_string(),
                text: entry.text.clone(),
            })
            .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, name)))
    }
}
