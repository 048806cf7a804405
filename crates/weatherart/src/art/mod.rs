//! Frame TV art-mode device layer.
//!
//! [`ArtSession`] is the seam between the pipeline and the device: the real
//! implementation ([`FrameTv`]) speaks the art-app websocket channel, while
//! tests script the trait directly.

mod frame;
pub mod wake;

pub use frame::FrameTv;

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// Errors from device-control operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("TV error: {0}")]
    Device(String),

    #[error("Upload timed out waiting for image_added event")]
    Timeout,

    #[error("No matching catalog entry found")]
    NotFound,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed TV response: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArtError>;

/// One remote catalog record. Only `content_id` is interpreted locally; the
/// remaining fields mirror whatever the TV happened to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtItem {
    pub content_id: String,
    pub fields: serde_json::Map<String, Value>,
}

impl ArtItem {
    /// Build an item from a raw catalog entry. Returns `None` when the entry
    /// is not an object or lacks a string `content_id`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let content_id = object.get("content_id")?.as_str()?.to_string();
        if content_id.is_empty() {
            return None;
        }
        Some(Self {
            content_id,
            fields: object.clone(),
        })
    }

    /// Look up an opaque field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Parse a raw catalog listing, dropping malformed entries entirely.
pub fn parse_catalog(raw: &Value) -> Vec<ArtItem> {
    raw.as_array()
        .map(|entries| entries.iter().filter_map(ArtItem::from_value).collect())
        .unwrap_or_default()
}

/// An open art-mode session with the TV.
#[async_trait]
pub trait ArtSession: Send + Sync {
    /// List the remote catalog, optionally scoped to one category.
    async fn available(&self, category: Option<&str>) -> Result<Vec<ArtItem>>;

    /// Upload an image; resolves with the new content id once the TV
    /// acknowledges it. May hang when the TV never sends the ack.
    async fn upload(&self, path: &Path, matte: &str) -> Result<String>;

    /// Show an artwork on the TV.
    async fn select_image(&self, content_id: &str, category: Option<&str>) -> Result<()>;

    /// Delete one stored artwork.
    async fn delete(&self, content_id: &str) -> Result<()>;

    /// Delete several stored artworks in one request.
    async fn delete_list(&self, content_ids: &[String]) -> Result<()>;

    /// Close the session. Safe to call after a failed upload.
    async fn close(&self) -> Result<()>;
}
