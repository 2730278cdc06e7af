use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::PathBuf;

pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("ARKIV_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/data"))
});

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("config.yaml"));
pub static DATABASE_PATH: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("database.sqlite"));

pub static IMAGE_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg",
    ]
    .into_iter()
    .collect()
});

pub static PDF_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| [".pdf"].into_iter().collect());

/// Fallback order: dedicated gateway first, public gateways after.
pub static DEFAULT_GATEWAYS: Lazy<Vec<String>> = Lazy::new(|| {
    [
        "https://gateway.pinata.cloud/ipfs",
        "https://ipfs.io/ipfs",
        "https://cloudflare-ipfs.com/ipfs",
        "https://dweb.link/ipfs",
        "https://4everland.io/ipfs",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 12;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MIN_VISIBLE: u32 = 3;
pub const DEFAULT_AUTO_LOAD_DEBOUNCE_MS: u64 = 200;
pub const DEFAULT_FILTER_SCAN_PAGES: u32 = 3;
pub const DEFAULT_BY_TAG_SCAN_LIMIT: u32 = 1000;
