use crate::constants::{
    DEFAULT_AUTO_LOAD_DEBOUNCE_MS, DEFAULT_BY_TAG_SCAN_LIMIT, DEFAULT_FILTER_SCAN_PAGES,
    DEFAULT_GATEWAYS, DEFAULT_MIN_VISIBLE, DEFAULT_PAGE_SIZE, DEFAULT_PROBE_TIMEOUT_SECS,
    DEFAULT_UPSTREAM_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinningConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token for the pinning service. Falls back to ARKIV_PINATA_JWT
    /// when left empty in the config file.
    #[serde(default)]
    pub jwt: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_url() -> String {
    "https://api.pinata.cloud".to_string()
}

fn default_gateway_url() -> String {
    "https://gateway.pinata.cloud/ipfs".to_string()
}

fn default_upstream_timeout() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            jwt: String::new(),
            gateway_url: default_gateway_url(),
            timeout_seconds: default_upstream_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bases")]
    pub bases: Vec<String>,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

fn default_gateway_bases() -> Vec<String> {
    DEFAULT_GATEWAYS.clone()
}

fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bases: default_gateway_bases(),
            probe_timeout_seconds: default_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_min_visible")]
    pub min_visible: u32,
    #[serde(default = "default_auto_load_debounce_ms")]
    pub auto_load_debounce_ms: u64,
    #[serde(default = "default_filter_scan_pages")]
    pub filter_scan_pages: u32,
    #[serde(default = "default_by_tag_scan_limit")]
    pub by_tag_scan_limit: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_min_visible() -> u32 {
    DEFAULT_MIN_VISIBLE
}

fn default_auto_load_debounce_ms() -> u64 {
    DEFAULT_AUTO_LOAD_DEBOUNCE_MS
}

fn default_filter_scan_pages() -> u32 {
    DEFAULT_FILTER_SCAN_PAGES
}

fn default_by_tag_scan_limit() -> u32 {
    DEFAULT_BY_TAG_SCAN_LIMIT
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            min_visible: default_min_visible(),
            auto_load_debounce_ms: default_auto_load_debounce_ms(),
            filter_scan_pages: default_filter_scan_pages(),
            by_tag_scan_limit: default_by_tag_scan_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pinning: PinningConfig,
    #[serde(default)]
    pub gateways: GatewayConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

pub fn load_config(config_path: &Path) -> Config {
    let mut config = if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
            Err(_) => Config::default(),
        }
    } else {
        Config::default()
    };

    if config.pinning.jwt.is_empty() {
        if let Ok(jwt) = std::env::var("ARKIV_PINATA_JWT") {
            config.pinning.jwt = jwt;
        }
    }

    config
}

pub fn save_default_config(config_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).map_err(|e| std::io::Error::other(e.to_string()))?;
    fs::write(config_path, yaml)
}
