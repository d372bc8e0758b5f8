//! Caller-owned session holding the bearer credential.
//!
//! Adapters never keep the credential themselves. `auth` writes it into the
//! session the caller passes in, and every remote call reads it from the
//! session passed to that call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use mdstore_common::{Error, Result};

/// Opaque bearer token. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building an `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// `Bearer <token>` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Per-caller authentication context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credential: Option<Credential>,
}

impl Session {
    /// Create an unauthenticated session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Credential for an authenticated call.
    ///
    /// # Errors
    /// - `Authentication` if `auth` has not been completed for this session
    pub fn require_credential(&self) -> Result<&Credential> {
        self.credential.as_ref().ok_or_else(|| {
            Error::Authentication("Session has no credential; run auth first".to_string())
        })
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Load a session from a JSON file. A missing file yields an empty session.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                debug!("Loaded session from {}", path.display());
                Ok(serde_json::from_slice(&bytes)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the session to a JSON file, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        debug!("Saved session to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_require_credential_without_auth() {
        let session = Session::new();
        let err = session.require_credential().unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_credential_debug_redacted() {
        let session = Session::with_credential(Credential::new("sl.secret-token"));
        let debug = format!("{:?}", session);
        assert!(!debug.contains("secret-token"));
        assert_eq!(session.require_credential().unwrap().bearer(), "Bearer sl.secret-token");
    }

    #[tokio::test]
    async fn test_session_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("session.json");

        let mut session = Session::new();
        session.set_credential(Credential::new("abc"));
        session.save(&path).await.unwrap();

        let loaded = Session::load(&path).await.unwrap();
        assert_eq!(loaded.credential().unwrap().secret(), "abc");
    }

    #[tokio::test]
    async fn test_load_missing_session_is_empty() {
        let temp = TempDir::new().unwrap();
        let loaded = Session::load(temp.path().join("absent.json")).await.unwrap();
        assert!(!loaded.is_authenticated());
    }
}
