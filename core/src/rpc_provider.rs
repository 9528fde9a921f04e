use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// ── Configuration constants ───────────────────────────────────────────────────

/// Consecutive failures before an endpoint is taken out of rotation.
const CIRCUIT_BREAKER_THRESHOLD: u64 = 3;

/// How long a tripped endpoint stays out of rotation.
const CIRCUIT_BREAKER_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Timeout for the `eth_blockNumber` probe.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

// ── Types ─────────────────────────────────────────────────────────────────────

/// One EVM JSON-RPC endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcEndpoint {
    /// Label used in logs.
    pub name: String,
    pub url: String,
}

impl RpcEndpoint {
    /// Build an endpoint labelled by its host.
    pub fn from_url(url: &str) -> Self {
        let name = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        Self {
            name,
            url: url.to_string(),
        }
    }
}

#[derive(Debug)]
struct EndpointState {
    endpoint: RpcEndpoint,
    consecutive_failures: AtomicU64,
    tripped_at: RwLock<Option<Instant>>,
    latest_block: AtomicU64,
}

impl EndpointState {
    async fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= CIRCUIT_BREAKER_THRESHOLD {
            let mut tripped = self.tripped_at.write().await;
            if tripped.is_none() {
                tracing::warn!(
                    endpoint = %self.endpoint.name,
                    failures,
                    "Circuit breaker tripped, endpoint excluded for {:?}",
                    CIRCUIT_BREAKER_COOLDOWN
                );
            }
            *tripped = Some(Instant::now());
        }
    }

    async fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.tripped_at.write().await = None;
    }
}

/// Tracks endpoint health and hands out endpoints in priority order.
pub struct ProviderRegistry {
    states: Vec<Arc<EndpointState>>,
    client: Client,
}

impl ProviderRegistry {
    /// The first endpoint is preferred whenever it is healthy.
    pub fn new(endpoints: Vec<RpcEndpoint>) -> Arc<Self> {
        let states = endpoints
            .into_iter()
            .map(|endpoint| {
                Arc::new(EndpointState {
                    endpoint,
                    consecutive_failures: AtomicU64::new(0),
                    tripped_at: RwLock::new(None),
                    latest_block: AtomicU64::new(0),
                })
            })
            .collect();

        Arc::new(Self {
            states,
            client: Client::new(),
        })
    }

    pub fn from_urls(urls: &[String]) -> Arc<Self> {
        Self::new(urls.iter().map(|u| RpcEndpoint::from_url(u)).collect())
    }

    /// Endpoints currently in rotation, in priority order.
    pub async fn healthy_endpoints(&self) -> Vec<&RpcEndpoint> {
        let mut available = Vec::new();
        for state in &self.states {
            if Self::is_available(state).await {
                available.push(&state.endpoint);
            }
        }
        available
    }

    /// URL of the preferred healthy endpoint, if any.
    pub async fn preferred_url(&self) -> Option<String> {
        self.healthy_endpoints()
            .await
            .first()
            .map(|e| e.url.clone())
    }

    pub async fn report_success(&self, url: &str) {
        if let Some(state) = self.find_by_url(url) {
            state.record_success().await;
        }
    }

    pub async fn report_failure(&self, url: &str) {
        if let Some(state) = self.find_by_url(url) {
            state.record_failure().await;
        }
    }

    /// Last block height seen by the health checker for `url`.
    pub fn latest_block(&self, url: &str) -> Option<u64> {
        self.find_by_url(url)
            .map(|s| s.latest_block.load(Ordering::Relaxed))
    }

    // ── Background health checker ─────────────────────────────────────────

    pub fn spawn_health_checker(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.run_health_checks().await;
            }
        })
    }

    async fn run_health_checks(&self) {
        for state in &self.states {
            match self.probe(state).await {
                Ok(block) => {
                    state.latest_block.store(block, Ordering::Relaxed);
                    state.record_success().await;
                    tracing::debug!(endpoint = %state.endpoint.name, block, "Health check OK");
                }
                Err(e) => {
                    tracing::warn!(endpoint = %state.endpoint.name, error = %e, "Health check failed");
                    state.record_failure().await;
                }
            }
        }
    }

    async fn probe(&self, state: &EndpointState) -> Result<u64, String> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_blockNumber",
            "params": []
        });

        let response = tokio::time::timeout(
            HEALTH_CHECK_TIMEOUT,
            self.client.post(&state.endpoint.url).json(&body).send(),
        )
        .await
        .map_err(|_| "timeout".to_string())?
        .map_err(|e| format!("request error: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status().as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("parse error: {e}"))?;

        let hex_height = json["result"]
            .as_str()
            .ok_or_else(|| "missing result in response".to_string())?;
        parse_quantity(hex_height)
    }

    // ── Internal helpers ──────────────────────────────────────────────────

    fn find_by_url(&self, url: &str) -> Option<&Arc<EndpointState>> {
        self.states.iter().find(|s| s.endpoint.url == url)
    }

    async fn is_available(state: &EndpointState) -> bool {
        match *state.tripped_at.read().await {
            None => true,
            Some(when) => when.elapsed() >= CIRCUIT_BREAKER_COOLDOWN,
        }
    }
}

/// Decode a JSON-RPC hex quantity such as `0x1b4`.
fn parse_quantity(value: &str) -> Result<u64, String> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| format!("quantity without 0x prefix: {value}"))?;
    u64::from_str_radix(digits, 16).map_err(|e| format!("bad quantity {value}: {e}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
