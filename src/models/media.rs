use crate::constants::{IMAGE_EXTENSIONS, PDF_EXTENSIONS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File kind is derived once from the display name at the ingestion
/// boundary and carried on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRef {
    pub content_hash: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub content_hash: String,
    pub display_name: String,
    pub size_bytes: i64,
    pub pinned_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub file_kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailRef>,
    #[serde(default)]
    pub total_downloads: i64,
    #[serde(default)]
    pub unique_downloads: i64,
}

fn default_visible() -> bool {
    true
}

pub fn file_extension(name: &str) -> Option<String> {
    let idx = name.rfind('.')?;
    if idx == 0 || idx + 1 == name.len() {
        return None;
    }
    Some(name[idx + 1..].to_lowercase())
}

pub fn file_kind_for_name(name: &str) -> FileKind {
    let ext = match file_extension(name) {
        Some(ext) => format!(".{}", ext),
        None => return FileKind::Unknown,
    };

    if IMAGE_EXTENSIONS.contains(ext.as_str()) {
        FileKind::Image
    } else if PDF_EXTENSIONS.contains(ext.as_str()) {
        FileKind::Pdf
    } else {
        FileKind::Unknown
    }
}

/// Tags arrive either as a JSON array of strings or as one comma-joined
/// string. Both collapse to an ordered list of trimmed, non-empty strings.
pub fn normalize_tags(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        serde_json::Value::String(joined) => joined
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Visibility arrives as "true"/"false", "visible"/"hidden", or a bool.
/// Anything unrecognized counts as visible.
pub fn normalize_visibility(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => {
            !matches!(s.trim().to_lowercase().as_str(), "false" | "hidden")
        }
        _ => true,
    }
}

/// Structural check only: CIDv0 is "Qm" plus 44 base58 characters, CIDv1
/// is "b" plus lowercase base32. Invalid hashes are rejected before any
/// network call.
pub fn is_valid_content_hash(hash: &str) -> bool {
    if hash.len() == 46 && hash.starts_with("Qm") {
        return hash[2..]
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() && !matches!(b, b'0' | b'O' | b'I' | b'l'));
    }

    if hash.len() >= 59 && hash.starts_with('b') {
        return hash[1..]
            .bytes()
            .all(|b| b.is_ascii_lowercase() || matches!(b, b'2'..=b'7'));
    }

    false
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageListResponse {
    pub success: bool,
    pub images: Vec<MediaRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub success: bool,
    pub image: MediaRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpinResponse {
    pub success: bool,
    pub message: String,
    pub ipfs_hash: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub ipfs_hash: String,
    pub pin_size: i64,
    pub timestamp: DateTime<Utc>,
    pub gateway_url: String,
    pub metadata: MediaRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSourceResponse {
    pub success: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<usize>,
}
