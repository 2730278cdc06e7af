mod http;
mod view;

pub use http::HttpCatalogBackend;
pub use view::{compute_view, matches_category, SortKey, ViewQuery};

use crate::config::CatalogConfig;
use crate::error::AppResult;
use crate::models::{DownloadCounts, MediaRecord};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// One page of the backend listing, with the server-reported pagination
/// metadata echoed back.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub records: Vec<MediaRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

/// Seam to the listing endpoint and the per-record counter endpoint.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn fetch_page(&self, page: u32, limit: u32) -> AppResult<ListingPage>;

    async fn download_counts(&self, hash: &str) -> AppResult<DownloadCounts>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Replace,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { added: usize },
    /// Another fetch was already in flight.
    Skipped,
    /// The catalog was reset while this fetch was in flight; the response
    /// was discarded.
    Stale,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    /// Last server page applied, 1-based; 0 before the first fetch.
    pub page: u32,
    pub page_size: u32,
    /// Server-reported total at the last fetch; None until known.
    pub total_known: Option<u64>,
}

impl PaginationState {
    fn new(page_size: u32) -> Self {
        Self {
            page: 0,
            page_size,
            total_known: None,
        }
    }

    pub fn has_more(&self) -> bool {
        match self.total_known {
            None => true,
            Some(total) => (self.page as u64) * (self.page_size as u64) < total,
        }
    }
}

struct CatalogInner {
    records: Vec<MediaRecord>,
    pagination: PaginationState,
    /// Epoch of the fetch currently in flight, if any.
    in_flight: Option<u64>,
    /// Bumped on reset; responses from an older epoch are discarded.
    epoch: u64,
    pages_scanned: u32,
    any_page_matched: bool,
    auto_load_armed: bool,
    last_error: Option<String>,
}

/// Owns the deduplicated record list and its pagination state. All
/// mutations go through `fetch_page`/`reset`; the lock is never held
/// across an await point.
pub struct IncrementalCatalog {
    backend: Arc<dyn CatalogBackend>,
    page_size: u32,
    min_visible: u32,
    debounce: Duration,
    filter_scan_pages: u32,
    inner: Mutex<CatalogInner>,
}

impl IncrementalCatalog {
    pub fn new(backend: Arc<dyn CatalogBackend>, config: &CatalogConfig) -> Self {
        Self {
            backend,
            page_size: config.page_size,
            min_visible: config.min_visible,
            debounce: Duration::from_millis(config.auto_load_debounce_ms),
            filter_scan_pages: config.filter_scan_pages,
            inner: Mutex::new(CatalogInner {
                records: Vec::new(),
                pagination: PaginationState::new(config.page_size),
                in_flight: None,
                epoch: 0,
                pages_scanned: 0,
                any_page_matched: false,
                auto_load_armed: true,
                last_error: None,
            }),
        }
    }

    pub fn records(&self) -> Vec<MediaRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn pagination(&self) -> PaginationState {
        self.inner.lock().unwrap().pagination
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().unwrap().last_error.clone()
    }

    /// Server-side pagination says more pages exist. With an active
    /// category filter the answer stays true only while the page scan is
    /// young or some scanned page produced a match, since the listing
    /// endpoint cannot filter by category itself.
    pub fn has_more(&self, category_filtered: bool) -> bool {
        let inner = self.inner.lock().unwrap();
        let base = inner.pagination.has_more();

        if !category_filtered {
            return base;
        }

        base && (inner.pages_scanned < self.filter_scan_pages || inner.any_page_matched)
    }

    pub fn visible_count(&self, category: Option<&str>) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .records
            .iter()
            .filter(|r| category.map_or(true, |c| matches_category(r, c)))
            .count()
    }

    /// Clears the list and re-arms auto-load. A response still in flight
    /// from before the reset will be discarded when it lands.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.epoch += 1;
        inner.records.clear();
        inner.pagination = PaginationState::new(self.page_size);
        inner.in_flight = None;
        inner.pages_scanned = 0;
        inner.any_page_matched = false;
        inner.auto_load_armed = true;
        inner.last_error = None;
    }

    pub async fn fetch_page(
        &self,
        page: u32,
        mode: FetchMode,
        category: Option<&str>,
    ) -> FetchOutcome {
        let epoch = {
            let mut inner = self.inner.lock().unwrap();
            if inner.in_flight.is_some() {
                return FetchOutcome::Skipped;
            }
            inner.in_flight = Some(inner.epoch);
            inner.epoch
        };

        let listing = match self.backend.fetch_page(page, self.page_size).await {
            Ok(listing) => listing,
            Err(err) => {
                let mut inner = self.inner.lock().unwrap();
                if inner.epoch != epoch {
                    return FetchOutcome::Stale;
                }
                inner.in_flight = None;
                warn!("Listing fetch failed: {}", err);
                inner.last_error = Some("Failed to load the archive listing".to_string());
                return FetchOutcome::Failed;
            }
        };

        let records = self.enrich_with_counts(listing.records).await;

        let mut inner = self.inner.lock().unwrap();
        if inner.epoch != epoch {
            return FetchOutcome::Stale;
        }
        inner.in_flight = None;

        let page_matches = records
            .iter()
            .filter(|r| category.map_or(true, |c| matches_category(r, c)))
            .count();

        let added = match mode {
            FetchMode::Replace => {
                inner.records = dedup_by_hash(records);
                inner.records.len()
            }
            FetchMode::Append => {
                let before = inner.records.len();
                let mut merged = std::mem::take(&mut inner.records);
                merged.extend(records);
                inner.records = dedup_by_hash(merged);
                inner.records.len() - before
            }
        };

        inner.pagination = PaginationState {
            page: listing.page,
            page_size: listing.limit,
            total_known: Some(listing.total),
        };
        inner.pages_scanned += 1;
        if page_matches > 0 {
            inner.any_page_matched = true;
        }
        inner.last_error = None;

        FetchOutcome::Applied { added }
    }

    /// Counter fetches for one page run concurrently; an individual
    /// failure leaves that record at zero rather than failing the page.
    async fn enrich_with_counts(&self, records: Vec<MediaRecord>) -> Vec<MediaRecord> {
        let counts = futures::future::join_all(
            records
                .iter()
                .map(|record| self.backend.download_counts(&record.content_hash)),
        )
        .await;

        records
            .into_iter()
            .zip(counts)
            .map(|(mut record, counts)| {
                let counts = counts.unwrap_or_default();
                record.total_downloads = counts.total;
                record.unique_downloads = counts.unique;
                record
            })
            .collect()
    }

    /// Keeps fetching pages until the category-visible count reaches the
    /// configured minimum or pagination runs out. Armed once per reset;
    /// the first call disarms it for good.
    pub async fn ensure_minimum_visible(&self, category: Option<&str>) -> u32 {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.auto_load_armed {
                return 0;
            }
            inner.auto_load_armed = false;
        }

        let mut fetched = 0;
        loop {
            let next_page = {
                let inner = self.inner.lock().unwrap();
                inner.pagination.page + 1
            };

            if self.visible_count(category) >= self.min_visible as usize
                || !self.has_more(category.is_some())
            {
                break;
            }

            tokio::time::sleep(self.debounce).await;

            match self.fetch_page(next_page, FetchMode::Append, category).await {
                FetchOutcome::Applied { .. } => fetched += 1,
                _ => break,
            }
        }

        fetched
    }
}

/// First-seen entry wins on hash collision.
fn dedup_by_hash(records: Vec<MediaRecord>) -> Vec<MediaRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.content_hash.clone()))
        .collect()
}
