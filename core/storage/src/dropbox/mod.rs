//! Dropbox storage adapter for mdstore.
//!
//! This module provides a storage backend using the Dropbox HTTP API v2 with:
//! - OAuth2 authorization-code exchange
//! - Documents and stylesheets stored as plain files
//! - Images shared through public direct-display links

pub mod adapter;
pub mod auth;
pub mod client;

pub use adapter::{create_dropbox_adapter, raw_link, DropboxAdapter, DropboxConfig};
pub use auth::{AuthConfig, AuthManager};
pub use client::DropboxClient;
