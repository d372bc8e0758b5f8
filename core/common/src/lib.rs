//! Common utilities and types shared across mdstore crates.
//!
//! This module provides the error taxonomy and the record types that every
//! storage adapter speaks, so callers can swap backends without touching
//! their own types.

pub mod error;
pub mod image;
pub mod types;

pub use error::{Error, Result};
pub use image::{ImageBlob, ImageRef};
pub use types::{Collection, ContentRecord, NamedRecord, RecordName};
