//! Image payloads and the references adapters hand back for them.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fallback content type when sniffing finds nothing recognizable.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Binary image payload with its content type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    data: Vec<u8>,
    content_type: String,
}

impl ImageBlob {
    /// Create a blob with an explicit content type.
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }

    /// Create a blob, guessing the content type from magic bytes.
    pub fn sniff(data: Vec<u8>) -> Self {
        let content_type = sniff_content_type(&data).unwrap_or(DEFAULT_CONTENT_TYPE);
        Self::new(data, content_type)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// File extension for remote uploads. Unknown types are stored as `png`.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            "image/bmp" => "bmp",
            _ => "png",
        }
    }

    /// Encode as a self-contained `data:` URL.
    pub fn to_data_url(&self) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{};base64,{}", self.content_type, payload)
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else if data.starts_with(b"<svg") || data.starts_with(b"<?xml") {
        Some("image/svg+xml")
    } else {
        None
    }
}

/// Displayable reference to a stored image.
///
/// Either a remote URL or an inline `data:` URL depending on the adapter;
/// callers treat it opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the image is embedded rather than hosted.
    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
