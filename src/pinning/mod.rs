mod pinata;

pub use pinata::PinataClient;

use crate::error::AppResult;
use crate::models::MediaRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Metadata fields attached to a pin at upload time.
#[derive(Debug, Clone)]
pub struct PinMetadata {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    pub location: String,
    pub artist: String,
    pub visible: bool,
}

#[derive(Debug)]
pub struct PinUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub metadata: PinMetadata,
}

#[derive(Debug, Clone)]
pub struct PinReceipt {
    pub ipfs_hash: String,
    pub pin_size: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PinPage {
    pub records: Vec<MediaRecord>,
    pub total: u64,
}

/// Seam to the external pinning service. The production implementation is
/// [`PinataClient`]; tests substitute an in-memory store.
#[async_trait]
pub trait PinStore: Send + Sync {
    async fn pin_file(&self, upload: PinUpload) -> AppResult<PinReceipt>;

    /// One page of pinned records, 1-based, plus the total pin count.
    async fn list_pins(&self, page: u32, limit: u32) -> AppResult<PinPage>;

    async fn find_pin(&self, hash: &str) -> AppResult<Option<MediaRecord>>;

    async fn unpin(&self, hash: &str) -> AppResult<()>;
}
