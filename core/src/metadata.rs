use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// MIME type used when none can be determined
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// File description sent ahead of the payload.
///
/// On the wire the keys are abbreviated to keep the frame short:
/// `{"a": name, "b": mime type, "c": size in bytes}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(rename = "a")]
    pub name: String,
    #[serde(rename = "b")]
    pub mime_type: String,
    #[serde(rename = "c")]
    pub size_bytes: u64,
}

impl FileMetadata {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        let mime_type = mime_type.into();
        let mime_type = if mime_type.trim().is_empty() {
            DEFAULT_MIME_TYPE.to_string()
        } else {
            mime_type
        };
        Self {
            name: name.into(),
            mime_type,
            size_bytes,
        }
    }

    /// Describe a file on disk, guessing its MIME type from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let size_bytes = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, guess_mime_type(path), size_bytes))
    }

    /// UTF-8 JSON frame as transmitted
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse an accumulated frame. Fails until the JSON object is complete.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Best-effort MIME type from a file extension
pub fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        _ => DEFAULT_MIME_TYPE,
    }
}
