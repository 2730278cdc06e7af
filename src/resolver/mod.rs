use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};
use crate::models::{is_valid_content_hash, FileKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One attempt against one gateway. Implementations must treat their own
/// transport errors as a plain `false`; the resolver decides what happens
/// next.
#[async_trait]
pub trait ContentProbe: Send + Sync {
    async fn probe(&self, url: &str, kind: FileKind) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub url: String,
    pub gateway_index: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    #[error("All {attempts} gateways failed")]
    Exhausted { attempts: usize },
}

/// Walks an ordered gateway list until one serves the content. Attempts are
/// strictly sequential; a timeout counts as a failed attempt.
pub struct GatewayResolver {
    gateways: Vec<String>,
    probe: Arc<dyn ContentProbe>,
    timeout: Duration,
}

impl GatewayResolver {
    pub fn new(gateways: Vec<String>, probe: Arc<dyn ContentProbe>, timeout: Duration) -> Self {
        Self {
            gateways,
            probe,
            timeout,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> AppResult<Self> {
        let timeout = Duration::from_secs(config.probe_timeout_seconds);
        let probe = Arc::new(HttpProbe::new(timeout)?);
        Ok(Self::new(config.bases.clone(), probe, timeout))
    }

    pub async fn resolve(&self, hash: &str, kind: FileKind) -> Result<ResolvedSource, ResolveError> {
        if !is_valid_content_hash(hash) {
            return Err(ResolveError::InvalidHash(hash.to_string()));
        }

        for (gateway_index, base) in self.gateways.iter().enumerate() {
            let url = format!("{}/{}", base.trim_end_matches('/'), hash);

            match tokio::time::timeout(self.timeout, self.probe.probe(&url, kind)).await {
                Ok(true) => return Ok(ResolvedSource { url, gateway_index }),
                Ok(false) => debug!("Gateway {} failed for {}", gateway_index, hash),
                Err(_) => debug!("Gateway {} timed out for {}", gateway_index, hash),
            }
        }

        Err(ResolveError::Exhausted {
            attempts: self.gateways.len(),
        })
    }
}

/// HEAD for PDFs and unknown kinds; full fetch plus decode for images, so a
/// gateway returning an HTML error page with status 200 still counts as a
/// failure.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build probe client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ContentProbe for HttpProbe {
    async fn probe(&self, url: &str, kind: FileKind) -> bool {
        match kind {
            FileKind::Image => {
                let response = match self.client.get(url).send().await {
                    Ok(r) if r.status().is_success() => r,
                    _ => return false,
                };

                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();

                let bytes = match response.bytes().await {
                    Ok(b) => b,
                    Err(_) => return false,
                };

                image::load_from_memory(&bytes).is_ok() || content_type.starts_with("image/svg")
            }
            FileKind::Pdf | FileKind::Unknown => self
                .client
                .head(url)
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false),
        }
    }
}

/// Observable loading state for one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    Loading,
    Loaded(String),
    Failed,
}

/// Handed out when a slot enters `Loading`; completing a probe requires the
/// ticket so a result for a superseded target is discarded instead of
/// overwriting newer state.
#[derive(Debug, Clone)]
pub struct ProbeTicket {
    generation: u64,
    pub hash: String,
    pub kind: FileKind,
}

/// Per-item state machine driving the resolver: Idle -> Loading ->
/// Loaded/Failed, with manual retry from Failed.
#[derive(Debug)]
pub struct SourceSlot {
    state: SourceState,
    hash: Option<String>,
    kind: FileKind,
    generation: u64,
}

impl Default for SourceSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceSlot {
    pub fn new() -> Self {
        Self {
            state: SourceState::Idle,
            hash: None,
            kind: FileKind::Unknown,
            generation: 0,
        }
    }

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    /// Points the slot at new content. An empty hash parks the slot in
    /// `Idle` and returns no ticket.
    pub fn set_target(&mut self, hash: &str, kind: FileKind) -> Option<ProbeTicket> {
        self.generation += 1;

        if hash.is_empty() {
            self.hash = None;
            self.state = SourceState::Idle;
            return None;
        }

        self.hash = Some(hash.to_string());
        self.kind = kind;
        self.state = SourceState::Loading;

        Some(ProbeTicket {
            generation: self.generation,
            hash: hash.to_string(),
            kind,
        })
    }

    /// A server-generated thumbnail URL supplied out-of-band makes probing
    /// unnecessary.
    pub fn use_thumbnail(&mut self, url: &str) {
        self.generation += 1;
        self.hash = None;
        self.state = SourceState::Loaded(url.to_string());
    }

    /// Applies a probe result. Returns false when the ticket is stale, in
    /// which case the state is left untouched.
    pub fn complete(
        &mut self,
        ticket: &ProbeTicket,
        result: Result<ResolvedSource, ResolveError>,
    ) -> bool {
        if ticket.generation != self.generation {
            return false;
        }

        self.state = match result {
            Ok(source) => SourceState::Loaded(source.url),
            Err(_) => SourceState::Failed,
        };

        true
    }

    /// Explicit user retry after exhaustion: restarts from gateway zero.
    pub fn retry(&mut self) -> Option<ProbeTicket> {
        if self.state != SourceState::Failed {
            return None;
        }

        let hash = self.hash.clone()?;
        self.generation += 1;
        self.state = SourceState::Loading;

        Some(ProbeTicket {
            generation: self.generation,
            hash,
            kind: self.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    enum ProbeScript {
        Fail,
        Succeed,
        Hang,
    }

    struct ScriptedProbe {
        script: Vec<ProbeScript>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        fn new(script: Vec<ProbeScript>) -> Self {
            Self {
                script,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentProbe for ScriptedProbe {
        async fn probe(&self, url: &str, _kind: FileKind) -> bool {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(url.to_string());
                calls.len() - 1
            };

            match self.script.get(index) {
                Some(ProbeScript::Succeed) => true,
                Some(ProbeScript::Fail) | None => false,
                Some(ProbeScript::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    true
                }
            }
        }
    }

    const HASH: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    fn gateways() -> Vec<String> {
        vec![
            "https://gw0.example/ipfs".to_string(),
            "https://gw1.example/ipfs".to_string(),
            "https://gw2.example/ipfs".to_string(),
            "https://gw3.example/ipfs".to_string(),
        ]
    }

    fn resolver(probe: Arc<ScriptedProbe>) -> GatewayResolver {
        GatewayResolver::new(gateways(), probe, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_first_gateway_success_stops_there() {
        let probe = Arc::new(ScriptedProbe::new(vec![ProbeScript::Succeed]));
        let result = resolver(probe.clone())
            .resolve(HASH, FileKind::Image)
            .await
            .unwrap();

        assert_eq!(result.gateway_index, 0);
        assert_eq!(result.url, format!("https://gw0.example/ipfs/{}", HASH));
        assert_eq!(probe.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_order_and_early_stop() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            ProbeScript::Fail,
            ProbeScript::Fail,
            ProbeScript::Succeed,
        ]));
        let result = resolver(probe.clone())
            .resolve(HASH, FileKind::Image)
            .await
            .unwrap();

        assert_eq!(result.gateway_index, 2);
        // Gateways 0, 1, 2 attempted in order; gateway 3 never touched
        assert_eq!(
            probe.calls(),
            vec![
                format!("https://gw0.example/ipfs/{}", HASH),
                format!("https://gw1.example/ipfs/{}", HASH),
                format!("https://gw2.example/ipfs/{}", HASH),
            ]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_is_terminal() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            ProbeScript::Fail,
            ProbeScript::Fail,
            ProbeScript::Fail,
            ProbeScript::Fail,
        ]));
        let err = resolver(probe.clone())
            .resolve(HASH, FileKind::Pdf)
            .await
            .unwrap_err();

        assert_eq!(err, ResolveError::Exhausted { attempts: 4 });
        assert_eq!(probe.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_hash_makes_no_network_calls() {
        let probe = Arc::new(ScriptedProbe::new(vec![ProbeScript::Succeed]));
        let err = resolver(probe.clone())
            .resolve("not-a-hash", FileKind::Image)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::InvalidHash(_)));
        assert!(probe.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_advances_to_next_gateway() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            ProbeScript::Hang,
            ProbeScript::Succeed,
        ]));
        let result = resolver(probe.clone())
            .resolve(HASH, FileKind::Image)
            .await
            .unwrap();

        assert_eq!(result.gateway_index, 1);
        assert_eq!(probe.calls().len(), 2);
    }

    #[test]
    fn test_slot_empty_hash_stays_idle() {
        let mut slot = SourceSlot::new();
        assert!(slot.set_target("", FileKind::Image).is_none());
        assert_eq!(*slot.state(), SourceState::Idle);
    }

    #[test]
    fn test_slot_load_and_complete() {
        let mut slot = SourceSlot::new();
        let ticket = slot.set_target(HASH, FileKind::Image).unwrap();
        assert_eq!(*slot.state(), SourceState::Loading);

        let applied = slot.complete(
            &ticket,
            Ok(ResolvedSource {
                url: "https://gw0.example/ipfs/x".to_string(),
                gateway_index: 0,
            }),
        );

        assert!(applied);
        assert_eq!(
            *slot.state(),
            SourceState::Loaded("https://gw0.example/ipfs/x".to_string())
        );
    }

    #[test]
    fn test_slot_stale_completion_is_discarded() {
        let mut slot = SourceSlot::new();
        let stale = slot.set_target(HASH, FileKind::Image).unwrap();

        // Target changes while the first probe is in flight
        let fresh = slot.set_target("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi", FileKind::Image).unwrap();

        let applied = slot.complete(
            &stale,
            Ok(ResolvedSource {
                url: "https://gw0.example/ipfs/old".to_string(),
                gateway_index: 0,
            }),
        );
        assert!(!applied);
        assert_eq!(*slot.state(), SourceState::Loading);

        assert!(slot.complete(&fresh, Err(ResolveError::Exhausted { attempts: 4 })));
        assert_eq!(*slot.state(), SourceState::Failed);
    }

    #[test]
    fn test_slot_retry_only_from_failed() {
        let mut slot = SourceSlot::new();
        assert!(slot.retry().is_none());

        let ticket = slot.set_target(HASH, FileKind::Pdf).unwrap();
        assert!(slot.retry().is_none());

        slot.complete(&ticket, Err(ResolveError::Exhausted { attempts: 4 }));
        let retry = slot.retry().unwrap();
        assert_eq!(retry.hash, HASH);
        assert_eq!(*slot.state(), SourceState::Loading);
    }

    #[test]
    fn test_slot_thumbnail_skips_probing() {
        let mut slot = SourceSlot::new();
        let stale = slot.set_target(HASH, FileKind::Pdf).unwrap();

        slot.use_thumbnail("https://gw.example/ipfs/thumb");
        assert_eq!(
            *slot.state(),
            SourceState::Loaded("https://gw.example/ipfs/thumb".to_string())
        );

        // A late probe result for the superseded target changes nothing
        assert!(!slot.complete(&stale, Err(ResolveError::Exhausted { attempts: 4 })));
        assert_eq!(
            *slot.state(),
            SourceState::Loaded("https://gw.example/ipfs/thumb".to_string())
        );
    }
}
