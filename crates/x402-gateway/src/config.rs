use std::env;

use thiserror::Error;
use url::Url;

use x402::constants::{DEFAULT_FACILITATOR_URL, DEFAULT_NETWORK};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPSTREAM_URL: &str = "http://localhost:4000";
const DEFAULT_SERVICE_NAME: &str = "x402 Gateway";
const DEFAULT_SERVICE_DESCRIPTION: &str =
    "Reverse-proxy payment gateway enforcing x402 v2 on upstream HTTP APIs";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// CAIP-2 chain identifier used in offers.
    pub network: String,
    /// Base URL for the facilitator's verify/settle RPCs.
    pub facilitator_url: String,
    /// Recipient address for all default routes.
    pub pay_to: String,
    /// Default route amount in microSTX, decimal integer string.
    pub default_amount: String,
    /// Bypass the facilitator and synthesize receipts.
    pub mock_payments: bool,
    pub port: u16,
    /// Proxy target base URL.
    pub upstream_url: String,
    /// Canonical base used in `resource` URLs of 402 offers.
    pub base_url: String,
    /// HTTPS base for discovery `resource` fields.
    pub public_base_url: String,
    /// CORS allowed origins. Empty = localhost-only dev default.
    pub allowed_origins: Vec<String>,
    pub service_name: String,
    pub service_description: String,
    pub service_image: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let network = env::var("NETWORK").unwrap_or_else(|_| DEFAULT_NETWORK.to_string());

        let facilitator_url =
            env::var("FACILITATOR_URL").unwrap_or_else(|_| DEFAULT_FACILITATOR_URL.to_string());
        Url::parse(&facilitator_url)
            .map_err(|_| ConfigError::InvalidUrl("FACILITATOR_URL", facilitator_url.clone()))?;

        let mock_payments = env::var("MOCK_PAYMENTS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        // PAY_TO and AMOUNT_MICROSTX are required in live mode; mock mode
        // falls back to placeholder values.
        let pay_to = match env::var("PAY_TO") {
            Ok(v) if !v.is_empty() => v,
            _ if mock_payments => "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
            _ => return Err(ConfigError::MissingRequired("PAY_TO")),
        };

        let default_amount = match env::var("AMOUNT_MICROSTX") {
            Ok(v) if !v.is_empty() => v,
            _ if mock_payments => "100000".to_string(),
            _ => return Err(ConfigError::MissingRequired("AMOUNT_MICROSTX")),
        };
        x402::parse_amount(&default_amount)
            .map_err(|_| ConfigError::InvalidAmount(default_amount.clone()))?;

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let upstream_url =
            env::var("UPSTREAM_URL").unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.to_string());
        Url::parse(&upstream_url)
            .map_err(|_| ConfigError::InvalidUrl("UPSTREAM_URL", upstream_url.clone()))?;

        let base_url = env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));
        Url::parse(&base_url).map_err(|_| ConfigError::InvalidUrl("BASE_URL", base_url.clone()))?;

        let public_base_url = env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| base_url.clone());
        Url::parse(&public_base_url)
            .map_err(|_| ConfigError::InvalidUrl("PUBLIC_BASE_URL", public_base_url.clone()))?;

        let allowed_origins: Vec<String> = env::var("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string());
        let service_description = env::var("SERVICE_DESCRIPTION")
            .unwrap_or_else(|_| DEFAULT_SERVICE_DESCRIPTION.to_string());
        let service_image = env::var("SERVICE_IMAGE").unwrap_or_default();

        Ok(Self {
            network,
            facilitator_url,
            pay_to,
            default_amount,
            mock_payments,
            port,
            upstream_url,
            base_url,
            public_base_url,
            allowed_origins,
            service_name,
            service_description,
            service_image,
        })
    }

    /// A localhost mock-mode configuration, used by the test suites.
    pub fn mock(base_url: &str, upstream_url: &str) -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            pay_to: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
            default_amount: "100000".to_string(),
            mock_payments: true,
            port: DEFAULT_PORT,
            upstream_url: upstream_url.to_string(),
            base_url: base_url.to_string(),
            public_base_url: base_url.to_string(),
            allowed_origins: vec![],
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_description: DEFAULT_SERVICE_DESCRIPTION.to_string(),
            service_image: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, String),

    #[error("invalid AMOUNT_MICROSTX: {0}")]
    InvalidAmount(String),
}
