//! Dropbox storage adapter implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use mdstore_common::{
    Collection, ContentRecord, Error, ImageBlob, ImageRef, NamedRecord, RecordName, Result,
};

use crate::adapter::StorageAdapter;
use crate::session::Session;

use super::auth::{AuthConfig, AuthManager};
use super::client::{DropboxClient, ListEntry, UploadArg, DROPBOX_API_BASE, DROPBOX_CONTENT_BASE};

fn default_api_base() -> String {
    DROPBOX_API_BASE.to_string()
}

fn default_content_base() -> String {
    DROPBOX_CONTENT_BASE.to_string()
}

/// Dropbox adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxConfig {
    #[serde(flatten)]
    pub auth: AuthConfig,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_content_base")]
    pub content_base: String,
}

impl DropboxConfig {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            auth: AuthConfig::new(app_key, app_secret),
            api_base: default_api_base(),
            content_base: default_content_base(),
        }
    }
}

/// Dropbox storage adapter.
///
/// Collections are the folders `/documents` and `/stylesheets`; each record
/// is one file whose server modification time is the record timestamp.
/// Images go to `/image/<unix-millis>.<ext>` and are shared publicly.
pub struct DropboxAdapter {
    auth: AuthManager,
    client: DropboxClient,
    browser: fn(&str) -> std::io::Result<()>,
}

/// Launch the system browser without waiting for it to exit.
fn open_browser(url: &str) -> std::io::Result<()> {
    open::that_detached(url)
}

impl DropboxAdapter {
    /// Create a new Dropbox adapter.
    ///
    /// # Errors
    /// - Invalid OAuth2 endpoint URLs
    /// - HTTP client construction failure
    pub fn new(config: DropboxConfig) -> Result<Self> {
        let auth = AuthManager::new(config.auth)?;
        let client = DropboxClient::new(config.api_base, config.content_base)?;
        Ok(Self {
            auth,
            client,
            browser: open_browser,
        })
    }

    #[cfg(test)]
    fn with_browser(mut self, browser: fn(&str) -> std::io::Result<()>) -> Self {
        self.browser = browser;
        self
    }
}

/// Rewrite a shared-link URL into a direct-display URL.
///
/// `/s/<id>/<file>` becomes `/s/raw/<id>/<file>`; links without the `/s/`
/// view segment get `raw=1` instead. The `dl=0` flag is dropped and other
/// query pairs are kept.
pub fn raw_link(shared: &str) -> Result<String> {
    let mut url = Url::parse(shared)
        .map_err(|e| Error::Network(format!("Invalid shared link '{}': {}", shared, e)))?;

    let path = url.path().to_string();
    let has_view_segment = path.starts_with("/s/");
    let rewritten = path
        .strip_prefix("/s/")
        .filter(|rest| !rest.starts_with("raw/"))
        .map(|rest| format!("/s/raw/{}", rest));

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, v)| !(k == "dl" && v == "0"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !has_view_segment && !pairs.iter().any(|(k, _)| k == "raw") {
        pairs.push(("raw".to_string(), "1".to_string()));
    }

    if let Some(path) = rewritten {
        url.set_path(&path);
    }
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Ok(url.to_string())
}

#[async_trait]
impl StorageAdapter for DropboxAdapter {
    fn name(&self) -> &str {
        "dropbox"
    }

    async fn open_auth(&self) -> Result<()> {
        let (url, _state) = self.auth.authorization_url();
        info!("Opening Dropbox authorization page");
        (self.browser)(&url)?;
        Ok(())
    }

    fn authorization_url(&self) -> Option<String> {
        Some(self.auth.authorization_url().0)
    }

    async fn auth(&self, session: &mut Session, code: &str) -> Result<()> {
        let credential = self.auth.exchange_code(code).await?;
        session.set_credential(credential);
        Ok(())
    }

    async fn add_image(&self, session: &Session, image: ImageBlob) -> Result<ImageRef> {
        let token = session.require_credential()?;
        let path = format!(
            "/image/{}.{}",
            Utc::now().timestamp_millis(),
            image.extension()
        );

        let uploaded = self
            .client
            .upload(token, &UploadArg::add(&path), image.into_data())
            .await?;
        // autorename may have moved it
        let stored_path = uploaded.path_display.unwrap_or(path);

        // Phase two. A failure here leaves the upload in place.
        let shared = match self.client.create_shared_link(token, &stored_path).await {
            Ok(url) => url,
            Err(e) => {
                warn!(path = %stored_path, error = %e, "Image uploaded but not shared; upload left orphaned");
                return Err(e);
            }
        };

        Ok(ImageRef::new(raw_link(&shared)?))
    }

    async fn save_record(
        &self,
        session: &Session,
        collection: Collection,
        name: &RecordName,
        content: &str,
    ) -> Result<()> {
        let token = session.require_credential()?;
        let path = name.path_in(collection);
        self.client
            .upload(token, &UploadArg::overwrite(&path), content.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    async fn list_records(
        &self,
        session: &Session,
        collection: Collection,
    ) -> Result<Vec<NamedRecord>> {
        let token = session.require_credential()?;

        let entries = match self.client.list_folder(token, &collection.folder()).await {
            Ok(entries) => entries,
            // Folder is created by the first save.
            Err(Error::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                ListEntry::File(file) => Some(NamedRecord {
                    datetime: file.server_modified.unwrap_or_else(Utc::now),
                    name: file.name,
                }),
                _ => None,
            })
            .collect())
    }

    async fn get_record(
        &self,
        session: &Session,
        collection: Collection,
        name: &RecordName,
    ) -> Result<ContentRecord> {
        let token = session.require_credential()?;
        let text = self.client.download(token, &name.path_in(collection)).await?;
        Ok(ContentRecord {
            name: name.to_string(),
            text,
        })
    }
}

/// Create a Dropbox adapter from JSON configuration.
pub fn create_dropbox_adapter(config: serde_json::Value) -> Result<Arc<dyn StorageAdapter>> {
    let dropbox_config: DropboxConfig = serde_json::from_value(config)
        .map_err(|e| Error::InvalidInput(format!("Invalid Dropbox config: {}", e)))?;

    Ok(Arc::new(DropboxAdapter::new(dropbox_config)?))
}
