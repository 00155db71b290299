//! MIME types attached to stored payloads.
//!
//! The MIME type decides two things: the file extension a payload is stored
//! under, and whether a thumbnail may be derived from it (`image/*` only).

use serde::{Deserialize, Serialize};

/// A MIME type string such as `image/jpeg`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MimeType(String);

impl MimeType {
    /// Wrap a MIME type string. The value is lowercased and trimmed.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_ascii_lowercase())
    }

    /// Return the MIME type as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether payloads of this type are eligible for thumbnails.
    pub fn is_image(&self) -> bool {
        self.0.starts_with("image/")
    }

    /// File extension used when storing a payload of this type.
    pub fn extension(&self) -> String {
        let known = match self.0.as_str() {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            "image/heic" => Some("heic"),
            "video/mp4" => Some("mp4"),
            "video/quicktime" => Some("mov"),
            "text/plain" => Some("txt"),
            "application/json" => Some("json"),
            "application/octet-stream" => Some("bin"),
            _ => None,
        };
        if let Some(ext) = known {
            return ext.to_string();
        }
        // Fall back to the subtype, stripped of parameters and suffixes.
        let subtype = self
            .0
            .split('/')
            .nth(1)
            .unwrap_or("bin")
            .split(|c| c == ';' || c == '+')
            .next()
            .unwrap_or("bin");
        let cleaned: String = subtype
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        if cleaned.is_empty() {
            "bin".to_string()
        } else {
            cleaned
        }
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MimeType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
