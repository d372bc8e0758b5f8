//! Storage adapter trait definition.

use async_trait::async_trait;

use mdstore_common::{
    Collection, ContentRecord, ImageBlob, ImageRef, NamedRecord, RecordName, Result,
};

use crate::session::Session;

/// Shared contract of every persistence backend.
///
/// Backends are interchangeable: a caller picks one from configuration and
/// drives it only through this trait. The caller owns the [`Session`] and
/// passes it to every call; adapters hold no credential of their own.
///
/// Collection-specific operations (`save_document`, `list_stylesheets`, ...)
/// are provided methods over the three collection-generic ones, so both
/// namespaces behave identically on every backend.
///
/// No operation is retried. Cancellation and timeouts are left to the caller.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Backend name (e.g., "local", "dropbox").
    fn name(&self) -> &str;

    /// Start interactive authorization.
    ///
    /// Remote backends open the provider's authorization page; backends
    /// without authorization do nothing.
    async fn open_auth(&self) -> Result<()> {
        Ok(())
    }

    /// URL of the provider's authorization page, for callers that cannot
    /// open a browser.
    ///
    /// `None` for backends without authorization.
    fn authorization_url(&self) -> Option<String> {
        None
    }

    /// Exchange an authorization code for a credential stored in `session`.
    ///
    /// # Errors
    /// - `Authentication` if the exchange fails
    async fn auth(&self, session: &mut Session, code: &str) -> Result<()>;

    /// Store an image and return a displayable reference to it.
    ///
    /// The reference is a hosted URL or an inline `data:` URL depending on
    /// the backend.
    async fn add_image(&self, session: &Session, image: ImageBlob) -> Result<ImageRef>;

    /// Upsert the metadata and content of `name` in `collection`.
    ///
    /// # Postconditions
    /// - An existing record with the same name is fully replaced
    async fn save_record(
        &self,
        session: &Session,
        collection: Collection,
        name: &RecordName,
        content: &str,
    ) -> Result<()>;

    /// List metadata of every record in `collection`.
    ///
    /// A collection that does not exist yet lists as empty. No ordering is
    /// guaranteed.
    async fn list_records(
        &self,
        session: &Session,
        collection: Collection,
    ) -> Result<Vec<NamedRecord>>;

    /// Fetch the content paired with `name`.
    ///
    /// # Errors
    /// - `NotFound` if no record has that name
    async fn get_record(
        &self,
        session: &Session,
        collection: Collection,
        name: &RecordName,
    ) -> Result<ContentRecord>;

    async fn save_document(&self, session: &Session, title: &str, content: &str) -> Result<()> {
        let name = RecordName::new(title)?;
        self.save_record(session, Collection::Documents, &name, content)
            .await
    }

    async fn list_documents(&self, session: &Session) -> Result<Vec<NamedRecord>> {
        self.list_records(session, Collection::Documents).await
    }

    async fn get_document(&self, session: &Session, title: &str) -> Result<ContentRecord> {
        let name = RecordName::new(title)?;
        self.get_record(session, Collection::Documents, &name).await
    }

    async fn save_stylesheet(&self, session: &Session, title: &str, content: &str) -> Result<()> {
        let name = RecordName::new(title)?;
        self.save_record(session, Collection::Stylesheets, &name, content)
            .await
    }

    async fn list_stylesheets(&self, session: &Session) -> Result<Vec<NamedRecord>> {
        self.list_records(session, Collection::Stylesheets).await
    }

    async fn get_stylesheet(&self, session: &Session, title: &str) -> Result<ContentRecord> {
        let name = RecordName::new(title)?;
        self.get_record(session, Collection::Stylesheets, &name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAdapter;
    use mdstore_common::Error;

    #[tokio::test]
    async fn test_provided_methods_reject_bad_titles() {
        let adapter = MemoryAdapter::new();
        let session = Session::new();

        let err = adapter
            .save_document(&session, "a/b", "text")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = adapter.get_stylesheet(&session, "").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_adapter_usable_as_trait_object() {
        let adapter: Box<dyn StorageAdapter> = Box::new(MemoryAdapter::new());
        let session = Session::new();

        adapter.save_stylesheet(&session, "base.css", "body {}").await.unwrap();
        let sheet = adapter.get_stylesheet(&session, "base.css").await.unwrap();
        assert_eq!(sheet.text, "body {}");
    }

    #[tokio::test]
    async fn test_default_auth_is_noop() {
        let adapter = MemoryAdapter::new();
        adapter.open_auth().await.unwrap();
        assert!(adapter.authorization_url().is_none());
    }
}
