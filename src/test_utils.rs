#![cfg(test)]

use crate::app::create_app;
use crate::config::Config;
use crate::database::{init_database, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{file_kind_for_name, FileKind, MediaRecord};
use crate::pinning::{PinPage, PinReceipt, PinStore, PinUpload};
use crate::resolver::{ContentProbe, GatewayResolver};
use async_trait::async_trait;
use axum::Router;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const VALID_HASH: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

static PIN_COUNTER: AtomicI64 = AtomicI64::new(1);

/// Create an in-memory SQLite database pool with the schema applied
pub fn create_test_db() -> DbPool {
    let manager = SqliteConnectionManager::memory().with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(5)
        .build(manager)
        .expect("Failed to create test database pool");

    let conn = pool.get().expect("Failed to get connection from pool");
    init_database(&conn).expect("Failed to initialize test database schema");

    pool
}

/// Test fixture: one media record pinned at a fixed base time
pub fn media_fixture(hash: &str, name: &str) -> MediaRecord {
    media_fixture_at(hash, name, 0)
}

/// Test fixture: pinned `offset_secs` after the base time, so relative
/// recency between fixtures is explicit
pub fn media_fixture_at(hash: &str, name: &str, offset_secs: i64) -> MediaRecord {
    let base = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

    MediaRecord {
        content_hash: hash.to_string(),
        display_name: name.to_string(),
        size_bytes: 1024,
        pinned_at: base + ChronoDuration::seconds(offset_secs),
        description: String::new(),
        tags: Vec::new(),
        category: String::new(),
        location: String::new(),
        artist: String::new(),
        visible: true,
        file_kind: file_kind_for_name(name),
        thumbnail: None,
        total_downloads: 0,
        unique_downloads: 0,
    }
}

/// In-memory stand-in for the pinning service
#[derive(Default)]
pub struct FakePinStore {
    records: Mutex<Vec<MediaRecord>>,
}

impl FakePinStore {
    pub fn with_records(records: Vec<MediaRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl PinStore for FakePinStore {
    async fn pin_file(&self, upload: PinUpload) -> AppResult<PinReceipt> {
        let n = PIN_COUNTER.fetch_add(1, Ordering::SeqCst);
        let hash = format!("QmFakePin{}", n);
        let size = upload.bytes.len() as i64;
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

        let record = MediaRecord {
            content_hash: hash.clone(),
            display_name: upload.metadata.name.clone(),
            size_bytes: size,
            pinned_at: timestamp,
            description: upload.metadata.description.clone(),
            tags: upload.metadata.tags.clone(),
            category: upload.metadata.category.clone(),
            location: upload.metadata.location.clone(),
            artist: upload.metadata.artist.clone(),
            visible: upload.metadata.visible,
            file_kind: file_kind_for_name(&upload.file_name),
            thumbnail: None,
            total_downloads: 0,
            unique_downloads: 0,
        };

        self.records.lock().unwrap().push(record);

        Ok(PinReceipt {
            ipfs_hash: hash,
            pin_size: size,
            timestamp,
        })
    }

    async fn list_pins(&self, page: u32, limit: u32) -> AppResult<PinPage> {
        let records = self.records.lock().unwrap();
        let offset = (page.saturating_sub(1) * limit) as usize;

        Ok(PinPage {
            total: records.len() as u64,
            records: records
                .iter()
                .skip(offset)
                .take(limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn find_pin(&self, hash: &str) -> AppResult<Option<MediaRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().find(|r| r.content_hash == hash).cloned())
    }

    async fn unpin(&self, hash: &str) -> AppResult<()> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.content_hash != hash);

        if records.len() == before {
            return Err(AppError::Upstream(format!("{} is not pinned", hash)));
        }
        Ok(())
    }
}

/// Probe that accepts every URL, so resolution always lands on gateway 0
pub struct AlwaysOkProbe;

#[async_trait]
impl ContentProbe for AlwaysOkProbe {
    async fn probe(&self, _url: &str, _kind: FileKind) -> bool {
        true
    }
}

/// Create a test app over an in-memory database and a fake pin store
/// seeded with the given records
pub fn create_test_app(records: Vec<MediaRecord>) -> (Router, DbPool) {
    let pool = create_test_db();
    let config = Arc::new(Config::default());
    let store: Arc<dyn PinStore> = Arc::new(FakePinStore::with_records(records));
    let resolver = Arc::new(GatewayResolver::new(
        vec!["https://gw.test/ipfs".to_string()],
        Arc::new(AlwaysOkProbe),
        Duration::from_secs(1),
    ));

    let app = create_app(config, pool.clone(), store, resolver);
    (app, pool)
}
