//! Record types shared by every storage adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two disjoint record namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Documents,
    Stylesheets,
}

impl Collection {
    /// All collections, in a stable order.
    pub const ALL: [Collection; 2] = [Collection::Documents, Collection::Stylesheets];

    /// Name used for remote folders and metadata tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Documents => "documents",
            Collection::Stylesheets => "stylesheets",
        }
    }

    /// Remote folder holding this collection, e.g. `/documents`.
    pub fn folder(&self) -> String {
        format!("/{}", self.as_str())
    }

    /// Table holding the body text paired with each metadata row.
    pub fn content_table(&self) -> &'static str {
        match self {
            Collection::Documents => "document_contents",
            Collection::Stylesheets => "stylesheet_contents",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity key of a record within its collection.
///
/// The remote backend turns names into path segments, so a name must be a
/// single non-empty segment.
///
/// Names compare case-sensitively here and in the local backend, but Dropbox
/// paths are case-insensitive: `Notes` and `notes` are two records locally and
/// one record remotely. Callers that switch backends should not rely on case
/// alone to tell records apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordName(String);

impl RecordName {
    /// Create a new RecordName.
    ///
    /// # Errors
    /// - Name is empty, `.` or `..`
    /// - Name contains a path separator
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Record name cannot be empty".to_string(),
            ));
        }
        if name == "." || name == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "Record name cannot be '{}'",
                name
            )));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(crate::Error::InvalidInput(
                "Record name cannot contain separators".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Remote path of this record inside `collection`.
    pub fn path_in(&self, collection: Collection) -> String {
        format!("{}/{}", collection.folder(), self.0)
    }
}

impl TryFrom<String> for RecordName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<RecordName> for String {
    fn from(name: RecordName) -> Self {
        name.0
    }
}

impl fmt::Display for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata entry for a document or stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRecord {
    pub name: String,
    pub datetime: DateTime<Utc>,
}

/// Body text paired with a [`NamedRecord`] by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub name: String,
    pub text: String,
}
