//! Dropbox HTTP API v2 client.

use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mdstore_common::{Error, Result};

use crate::session::Credential;

/// RPC endpoint host.
pub const DROPBOX_API_BASE: &str = "https://api.dropboxapi.com";
/// Content upload/download host.
pub const DROPBOX_CONTENT_BASE: &str = "https://content.dropboxapi.com";

/// Header carrying the JSON argument of content endpoints.
const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Conflict behavior of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Never overwrite; combine with `autorename` to pick a free name.
    Add,
    /// Replace whatever is at the path.
    Overwrite,
}

/// Argument of `files/upload`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadArg<'a> {
    pub path: &'a str,
    pub mode: WriteMode,
    pub autorename: bool,
    pub mute: bool,
    pub strict_conflict: bool,
}

impl<'a> UploadArg<'a> {
    /// Upload that keeps existing files and renames on conflict.
    pub fn add(path: &'a str) -> Self {
        Self {
            path,
            mode: WriteMode::Add,
            autorename: true,
            mute: false,
            strict_conflict: true,
        }
    }

    /// Upload that replaces the file at `path`.
    pub fn overwrite(path: &'a str) -> Self {
        Self {
            path,
            mode: WriteMode::Overwrite,
            autorename: false,
            mute: false,
            strict_conflict: true,
        }
    }
}

/// File metadata returned by upload and list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub server_modified: Option<DateTime<Utc>>,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum ListEntry {
    File(FileMetadata),
    Folder { name: String },
    Deleted { name: String },
}

impl ListEntry {
    pub fn name(&self) -> &str {
        match self {
            ListEntry::File(file) => &file.name,
            ListEntry::Folder { name } | ListEntry::Deleted { name } => name,
        }
    }
}

#[derive(Debug, Serialize)]
struct ListFolderArg<'a> {
    path: &'a str,
    recursive: bool,
    include_media_info: bool,
    include_deleted: bool,
    include_has_explicit_shared_members: bool,
    include_mounted_folders: bool,
    include_non_downloadable_files: bool,
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<ListEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Serialize)]
struct SharedLinkSettings {
    requested_visibility: &'static str,
    audience: &'static str,
    access: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateSharedLinkArg<'a> {
    path: &'a str,
    settings: SharedLinkSettings,
}

#[derive(Debug, Deserialize)]
struct SharedLinkMetadata {
    url: String,
}

#[derive(Debug, Serialize)]
struct DownloadArg<'a> {
    path: &'a str,
}

/// Error body returned with HTTP 409 by every v2 endpoint.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_summary: String,
    #[serde(default)]
    error: serde_json::Value,
}

impl ApiErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn is_not_found(&self) -> bool {
        self.error_summary.starts_with("path/not_found")
            || self.error_summary.starts_with("path_lookup/not_found")
            || ["/path/.tag", "/path_lookup/.tag"]
                .iter()
                .any(|ptr| self.error.pointer(ptr).and_then(|v| v.as_str()) == Some("not_found"))
    }

    fn existing_shared_link(&self) -> Option<&str> {
        self.error
            .pointer("/shared_link_already_exists/metadata/url")
            .and_then(|v| v.as_str())
    }
}

/// Map a non-success response to the error taxonomy.
///
/// This is the only place that decides what "not found" looks like on the
/// wire, so every operation classifies it the same way.
pub(crate) fn classify_api_error(status: StatusCode, body: &str, context: &str) -> Error {
    if status == StatusCode::UNAUTHORIZED {
        return Error::Authentication(format!("{}: invalid or expired token", context));
    }

    let parsed = ApiErrorBody::parse(body);
    if parsed.is_not_found() || status == StatusCode::NOT_FOUND {
        let summary = if parsed.error_summary.is_empty() {
            status.to_string()
        } else {
            parsed.error_summary
        };
        return Error::NotFound(format!("{}: {}", context, summary));
    }

    Error::Network(format!("{}: {} - {}", context, status, body))
}

/// Serialize an API argument for the `Dropbox-API-Arg` header.
///
/// Header values must be ASCII, so every non-ASCII character is written as
/// a JSON `\u` escape.
pub(crate) fn api_arg_header<T: Serialize>(arg: &T) -> Result<String> {
    let json = serde_json::to_string(arg)?;
    let mut escaped = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() && ch != '\u{7f}' {
            escaped.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(escaped)
}

/// Dropbox API client.
///
/// Every call takes the credential explicitly and is attempted once.
pub struct DropboxClient {
    http: Client,
    api_base: String,
    content_base: String,
}

impl DropboxClient {
    /// Create a client against the given hosts.
    pub fn new(api_base: impl Into<String>, content_base: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("mdstore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            content_base: content_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Upload `data` according to `arg`.
    pub async fn upload(
        &self,
        token: &Credential,
        arg: &UploadArg<'_>,
        data: Vec<u8>,
    ) -> Result<FileMetadata> {
        let url = format!("{}/2/files/upload", self.content_base);
        debug!(path = arg.path, mode = ?arg.mode, bytes = data.len(), "Uploading file");

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(API_ARG_HEADER, api_arg_header(arg)?)
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        self.handle_response(response, "Upload failed").await
    }

    /// Create a public shared link for `path` and return its URL.
    ///
    /// If a link already exists, the existing URL is returned.
    pub async fn create_shared_link(&self, token: &Credential, path: &str) -> Result<String> {
        let url = format!("{}/2/sharing/create_shared_link_with_settings", self.api_base);
        let arg = CreateSharedLinkArg {
            path,
            settings: SharedLinkSettings {
                requested_visibility: "public",
                audience: "public",
                access: "viewer",
            },
        };
        debug!(path, "Creating shared link");

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .json(&arg)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create shared link: {}", e)))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            let parsed = ApiErrorBody::parse(&body);
            if let Some(existing) = parsed.existing_shared_link() {
                debug!(path, "Shared link already exists, reusing it");
                return Ok(existing.to_string());
            }
            return Err(classify_api_error(status, &body, "Create shared link failed"));
        }

        let link: SharedLinkMetadata = self
            .handle_response(response, "Create shared link failed")
            .await?;
        Ok(link.url)
    }

    /// List the direct children of a folder, following pagination.
    pub async fn list_folder(&self, token: &Credential, path: &str) -> Result<Vec<ListEntry>> {
        let url = format!("{}/2/files/list_folder", self.api_base);
        let arg = ListFolderArg {
            path,
            recursive: false,
            include_media_info: false,
            include_deleted: false,
            include_has_explicit_shared_members: false,
            include_mounted_folders: false,
            include_non_downloadable_files: true,
        };
        debug!(path, "Listing folder");

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .json(&arg)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list folder: {}", e)))?;

        let mut page: ListFolderResponse = self.handle_response(response, "List folder failed").await?;
        let mut entries = std::mem::take(&mut page.entries);

        while page.has_more {
            page = self.list_folder_continue(token, &page.cursor).await?;
            entries.append(&mut page.entries);
        }

        Ok(entries)
    }

    async fn list_folder_continue(
        &self,
        token: &Credential,
        cursor: &str,
    ) -> Result<ListFolderResponse> {
        let url = format!("{}/2/files/list_folder/continue", self.api_base);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .json(&serde_json::json!({ "cursor": cursor }))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to continue listing: {}", e)))?;

        self.handle_response(response, "List folder continue failed")
            .await
    }

    /// Download a file as text.
    pub async fn download(&self, token: &Credential, path: &str) -> Result<String> {
        let url = format!("{}/2/files/download", self.content_base);
        debug!(path, "Downloading file");

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .header(API_ARG_HEADER, api_arg_header(&DownloadArg { path })?)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body, "Download failed"));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read download response: {}", e)))
    }

    /// Handle API response with error checking.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_api_error(status, &body, context))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_arg_serialization() {
        let json = serde_json::to_value(UploadArg::overwrite("/documents/a")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "path": "/documents/a",
                "mode": "overwrite",
                "autorename": false,
                "mute": false,
                "strict_conflict": true
            })
        );

        let json = serde_json::to_value(UploadArg::add("/image/1.png")).unwrap();
        assert_eq!(json["mode"], "add");
        assert_eq!(json["autorename"], true);
    }

    #[test]
    fn test_api_arg_header_escapes_non_ascii() {
        let header = api_arg_header(&DownloadArg { path: "/documents/café 😀" }).unwrap();
        assert!(header.is_ascii());
        assert!(header.contains("caf\\u00e9"));
        assert!(header.contains("\\ud83d\\ude00"));

        let back: serde_json::Value = serde_json::from_str(&header).unwrap();
        assert_eq!(back["path"], "/documents/café 😀");
    }

    #[test]
    fn test_classify_not_found_by_summary() {
        let body = r#"{"error_summary": "path/not_found/..", "error": {".tag": "path"}}"#;
        let err = classify_api_error(StatusCode::CONFLICT, body, "List");
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_classify_not_found_by_tag() {
        let body = r#"{"error_summary": "", "error": {".tag": "path", "path": {".tag": "not_found"}}}"#;
        let err = classify_api_error(StatusCode::CONFLICT, body, "List");
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_classify_other_conflict_is_network() {
        let body = r#"{"error_summary": "path/malformed_path/..", "error": {".tag": "path", "path": {".tag": "malformed_path"}}}"#;
        let err = classify_api_error(StatusCode::CONFLICT, body, "List");
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_classify_unauthorized() {
        let err = classify_api_error(StatusCode::UNAUTHORIZED, "{}", "List");
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_classify_non_json_body() {
        let err = classify_api_error(StatusCode::INTERNAL_SERVER_ERROR, "oops", "List");
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_list_entry_tags() {
        let json = r#"[
            {".tag": "file", "name": "a.md", "path_display": "/documents/a.md", "server_modified": "2024-01-02T03:04:05Z"},
            {".tag": "folder", "name": "sub"}
        ]"#;
        let entries: Vec<ListEntry> = serde_json::from_str(json).unwrap();
        assert!(matches!(&entries[0], ListEntry::File(f) if f.name == "a.md" && f.server_modified.is_some()));
        assert!(matches!(&entries[1], ListEntry::Folder { .. }));
        assert_eq!(entries[1].name(), "sub");
    }
}
