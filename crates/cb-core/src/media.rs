//! # Media metadata
//!
//! Confession media is stored as loosely-typed JSON: depending on the writer
//! it is either a JSON array or a string holding an encoded array. It is
//! decoded once here, at the store boundary, and anything unreadable becomes
//! an empty list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Only `image/*` and `video/*` uploads are accepted.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let top = content_type.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMedia {
    Items(Vec<MediaItem>),
    Encoded(String),
}

/// Decodes a stored media value of either shape.
pub fn decode_media(value: &Value) -> Vec<MediaItem> {
    match serde_json::from_value::<RawMedia>(value.clone()) {
        Ok(RawMedia::Items(items)) => items,
        Ok(RawMedia::Encoded(text)) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Decodes a TEXT column. `NULL`, blank and malformed values yield no media.
pub fn decode_media_column(raw: Option<&str>) -> Vec<MediaItem> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str::<Value>(raw)
        .map(|value| decode_media(&value))
        .unwrap_or_default()
}

pub fn encode_media(items: &[MediaItem]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
