use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use x402::{FacilitatorClient, TtlCache};

use crate::config::GatewayConfig;
use crate::policy::PolicyRegistry;

/// Idempotency receipts live for 10 minutes.
pub const IDEMPOTENCY_TTL: Duration = Duration::from_secs(600);

/// Consumed nonces live for 5 minutes.
pub const NONCE_TTL: Duration = Duration::from_secs(300);

/// A captured 2xx response, replayed verbatim on an idempotency hit.
#[derive(Debug, Clone)]
pub struct IdempotencyEntry {
    pub status: u16,
    pub content_type: Option<String>,
    pub payment_response: Option<String>,
    pub body: Bytes,
}

/// Shared application state. The two caches are the only mutable state
/// that crosses request boundaries; the registry is read-only after boot.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub policies: Arc<PolicyRegistry>,
    pub idempotency: Arc<TtlCache<String, IdempotencyEntry>>,
    pub nonces: Arc<TtlCache<String, ()>>,
    pub facilitator: FacilitatorClient,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatewayConfig, policies: PolicyRegistry) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none()) // Prevent SSRF via redirects
            .build()
            .expect("failed to create HTTP client");

        let facilitator = FacilitatorClient::new(&config.facilitator_url, http_client.clone());

        Self {
            config: Arc::new(config),
            policies: Arc::new(policies),
            idempotency: Arc::new(TtlCache::new(IDEMPOTENCY_TTL)),
            nonces: Arc::new(TtlCache::new(NONCE_TTL)),
            facilitator,
            http_client,
        }
    }

    /// Start the once-per-minute background sweepers for both caches.
    pub fn start_sweepers(&self) {
        TtlCache::start_sweeper(&self.idempotency);
        TtlCache::start_sweeper(&self.nonces);
    }
}
