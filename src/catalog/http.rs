use crate::catalog::{CatalogBackend, ListingPage};
use crate::error::{AppError, AppResult};
use crate::models::{DownloadCounts, MediaRecord};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Catalog backend speaking to the archive's own HTTP surface, for
/// embeddings that run the catalog outside the server process.
pub struct HttpCatalogBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PaginationMeta {
    page: u32,
    limit: u32,
    total: u64,
}

#[derive(Deserialize)]
struct ListingEnvelope {
    images: Vec<MediaRecord>,
    pagination: PaginationMeta,
}

#[derive(Deserialize)]
struct CountsEnvelope {
    downloads: DownloadCounts,
}

impl HttpCatalogBackend {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build catalog client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CatalogBackend for HttpCatalogBackend {
    async fn fetch_page(&self, page: u32, limit: u32) -> AppResult<ListingPage> {
        let envelope: ListingEnvelope = self
            .client
            .get(format!("{}/api/images", self.base_url))
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(ListingPage {
            records: envelope.images,
            page: envelope.pagination.page,
            limit: envelope.pagination.limit,
            total: envelope.pagination.total,
        })
    }

    async fn download_counts(&self, hash: &str) -> AppResult<DownloadCounts> {
        let envelope: CountsEnvelope = self
            .client
            .get(format!("{}/api/images/{}/downloads", self.base_url, hash))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(envelope.downloads)
    }
}
