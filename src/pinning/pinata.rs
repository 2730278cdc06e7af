use crate::config::PinningConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    file_kind_for_name, normalize_tags, normalize_visibility, MediaRecord, ThumbnailRef,
};
use crate::pinning::{PinPage, PinReceipt, PinStore, PinUpload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

pub struct PinataClient {
    client: reqwest::Client,
    api_url: String,
    gateway_url: String,
    jwt: String,
}

impl PinataClient {
    pub fn new(config: &PinningConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
            jwt: config.jwt.clone(),
        })
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    /// Startup credential check against the service's test endpoint.
    pub async fn test_authentication(&self) -> AppResult<()> {
        let response = self
            .client
            .get(format!("{}/data/testAuthentication", self.api_url))
            .bearer_auth(&self.jwt)
            .send()
            .await?;

        read_success(response).await.map(|_| ())
    }

    async fn fetch_pin_list(&self, query: &[(&str, String)]) -> AppResult<Value> {
        let response = self
            .client
            .get(format!("{}/data/pinList", self.api_url))
            .query(query)
            .bearer_auth(&self.jwt)
            .send()
            .await?;

        let body = read_success(response).await?;
        serde_json::from_str(&body).map_err(AppError::Json)
    }

    fn record_from_row(&self, row: &Value) -> Option<MediaRecord> {
        record_from_row(row, &self.gateway_url)
    }
}

async fn read_success(response: reqwest::Response) -> AppResult<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.is_success() {
        Ok(body)
    } else {
        Err(AppError::Upstream(format!("{}: {}", status, body)))
    }
}

/// Ingestion boundary: one pin-list row becomes one canonical record.
/// Rows without a pin hash are skipped.
fn record_from_row(row: &Value, gateway_url: &str) -> Option<MediaRecord> {
    let hash = row.get("ipfs_pin_hash")?.as_str()?.to_string();

    let pinned_at = row
        .get("date_pinned")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let metadata = row.get("metadata").cloned().unwrap_or(Value::Null);
    let keyvalues = metadata.get("keyvalues").cloned().unwrap_or(Value::Null);

    let display_name = metadata
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(&hash)
        .to_string();

    let text_field = |key: &str| {
        keyvalues
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    let thumbnail = keyvalues
        .get("thumbnailHash")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|thumb| ThumbnailRef {
            content_hash: thumb.to_string(),
            url: format!("{}/{}", gateway_url, thumb),
        });

    Some(MediaRecord {
        file_kind: file_kind_for_name(&display_name),
        display_name,
        size_bytes: row.get("size").and_then(|v| v.as_i64()).unwrap_or(0),
        pinned_at,
        description: text_field("description"),
        tags: normalize_tags(keyvalues.get("tags").unwrap_or(&Value::Null)),
        category: text_field("category"),
        location: text_field("location"),
        artist: text_field("artist"),
        visible: normalize_visibility(keyvalues.get("visibility").unwrap_or(&Value::Null)),
        thumbnail,
        total_downloads: 0,
        unique_downloads: 0,
        content_hash: hash,
    })
}

#[async_trait]
impl PinStore for PinataClient {
    async fn pin_file(&self, upload: PinUpload) -> AppResult<PinReceipt> {
        let metadata = json!({
            "name": upload.metadata.name,
            "keyvalues": {
                "description": upload.metadata.description,
                "tags": upload.metadata.tags.join(","),
                "category": upload.metadata.category,
                "location": upload.metadata.location,
                "artist": upload.metadata.artist,
                "visibility": if upload.metadata.visible { "true" } else { "false" },
            }
        });

        let file_part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("pinataMetadata", metadata.to_string());

        let response = self
            .client
            .post(format!("{}/pinning/pinFileToIPFS", self.api_url))
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await?;

        let body = read_success(response).await?;
        let parsed: Value = serde_json::from_str(&body)?;

        let ipfs_hash = parsed
            .get("IpfsHash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Upstream("Pin response missing IpfsHash".to_string()))?
            .to_string();

        let timestamp = parsed
            .get("Timestamp")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(PinReceipt {
            ipfs_hash,
            pin_size: parsed.get("PinSize").and_then(|v| v.as_i64()).unwrap_or(0),
            timestamp,
        })
    }

    async fn list_pins(&self, page: u32, limit: u32) -> AppResult<PinPage> {
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let parsed = self
            .fetch_pin_list(&[
                ("status", "pinned".to_string()),
                ("pageLimit", limit.to_string()),
                ("pageOffset", offset.to_string()),
            ])
            .await?;

        let total = parsed.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
        let records = parsed
            .get("rows")
            .and_then(|v| v.as_array())
            .map(|rows| rows.iter().filter_map(|r| self.record_from_row(r)).collect())
            .unwrap_or_default();

        Ok(PinPage { records, total })
    }

    async fn find_pin(&self, hash: &str) -> AppResult<Option<MediaRecord>> {
        let parsed = self
            .fetch_pin_list(&[
                ("status", "pinned".to_string()),
                ("hashContains", hash.to_string()),
                ("pageLimit", "1".to_string()),
            ])
            .await?;

        let record = parsed
            .get("rows")
            .and_then(|v| v.as_array())
            .and_then(|rows| rows.first())
            .and_then(|r| self.record_from_row(r));

        Ok(record)
    }

    async fn unpin(&self, hash: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(format!("{}/pinning/unpin/{}", self.api_url, hash))
            .bearer_auth(&self.jwt)
            .send()
            .await?;

        read_success(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileKind;

    #[test]
    fn test_record_from_row_with_list_tags() {
        let row = json!({
            "ipfs_pin_hash": "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
            "size": 2048,
            "date_pinned": "2024-03-01T12:00:00Z",
            "metadata": {
                "name": "flyer.png",
                "keyvalues": {
                    "description": "march flyer",
                    "tags": ["poster", "street"],
                    "category": "posters",
                    "location": "Beirut",
                    "artist": "unknown",
                    "visibility": "visible"
                }
            }
        });

        let record = record_from_row(&row, "https://gw.example/ipfs").unwrap();
        assert_eq!(record.display_name, "flyer.png");
        assert_eq!(record.file_kind, FileKind::Image);
        assert_eq!(record.tags, vec!["poster", "street"]);
        assert_eq!(record.location, "Beirut");
        assert!(record.visible);
        assert!(record.thumbnail.is_none());
    }

    #[test]
    fn test_record_from_row_with_joined_tags_and_thumbnail() {
        let row = json!({
            "ipfs_pin_hash": "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
            "size": 9999,
            "date_pinned": "2023-11-20T08:30:00Z",
            "metadata": {
                "name": "report.pdf",
                "keyvalues": {
                    "tags": "archive, document",
                    "visibility": "hidden",
                    "thumbnailHash": "QmbWqxBEKC3P8tqsKc98xmWNzrzDtRLMiMPL8wBuTGsMnR"
                }
            }
        });

        let record = record_from_row(&row, "https://gw.example/ipfs").unwrap();
        assert_eq!(record.file_kind, FileKind::Pdf);
        assert_eq!(record.tags, vec!["archive", "document"]);
        assert!(!record.visible);

        let thumb = record.thumbnail.unwrap();
        assert_eq!(
            thumb.url,
            "https://gw.example/ipfs/QmbWqxBEKC3P8tqsKc98xmWNzrzDtRLMiMPL8wBuTGsMnR"
        );
    }

    #[test]
    fn test_record_from_row_without_hash_is_skipped() {
        let row = json!({ "size": 1, "metadata": { "name": "x.png" } });
        assert!(record_from_row(&row, "https://gw.example/ipfs").is_none());
    }

    #[test]
    fn test_record_from_row_defaults() {
        let row = json!({ "ipfs_pin_hash": "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG" });
        let record = record_from_row(&row, "https://gw.example/ipfs").unwrap();

        // Name falls back to the hash, which has no extension
        assert_eq!(record.display_name, record.content_hash);
        assert_eq!(record.file_kind, FileKind::Unknown);
        assert!(record.tags.is_empty());
        assert!(record.visible);
        assert_eq!(record.size_bytes, 0);
    }
}
