//! Route policy registry.
//!
//! Policies are registered once at startup and are immutable thereafter;
//! the match path runs on every request, so the registry deliberately has
//! no runtime add/remove API.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use x402::constants::{DEFAULT_SCHEME, X402_VERSION};
use x402::{PaymentAccept, PaymentRequirements};

const DEFAULT_MIME_TYPE: &str = "application/json";
const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 60;

/// Where an input parameter travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Query,
    Body,
}

/// One named input parameter in a route's I/O schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputParam {
    pub location: ParamLocation,
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    pub required: bool,
}

impl InputParam {
    pub fn query(param_type: &str, description: &str, required: bool) -> Self {
        Self {
            location: ParamLocation::Query,
            param_type: param_type.to_string(),
            description: description.to_string(),
            required,
        }
    }

    pub fn body(param_type: &str, description: &str, required: bool) -> Self {
        Self {
            location: ParamLocation::Body,
            param_type: param_type.to_string(),
            description: description.to_string(),
            required,
        }
    }
}

/// Optional I/O schema surfaced through the discovery document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSchema {
    /// Input parameters keyed by name.
    pub input: BTreeMap<String, InputParam>,
    /// Output field descriptions, free-form JSON.
    pub output: Value,
}

/// One paid route: price, recipient, and discovery metadata.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub path: String,
    /// Upper-cased at build time.
    pub method: String,
    pub scheme: String,
    pub network: String,
    pub asset: String,
    /// Minimum amount in smallest units, decimal integer string.
    pub amount: String,
    pub pay_to: String,
    pub description: String,
    pub mime_type: String,
    /// Maximum seconds to await settlement.
    pub max_timeout_seconds: u64,
    /// Extra metadata forwarded to the facilitator inside the offer.
    pub extra: Option<BTreeMap<String, String>>,
    pub schema: Option<RouteSchema>,
}

impl RoutePolicy {
    pub fn builder(path: impl Into<String>) -> RoutePolicyBuilder {
        RoutePolicyBuilder::new(path)
    }

    /// Render this policy as the wire offer, with an absolute resource URL.
    pub fn to_accept(&self, base_url: &str) -> PaymentAccept {
        PaymentAccept {
            scheme: self.scheme.clone(),
            network: self.network.clone(),
            max_amount_required: self.amount.clone(),
            resource: format!("{}{}", base_url.trim_end_matches('/'), self.path),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
            extra: self.extra.clone(),
            output_schema: None,
        }
    }

    /// The full 402 body for this route.
    pub fn requirements(&self, base_url: &str) -> PaymentRequirements {
        PaymentRequirements {
            x402_version: X402_VERSION,
            accepts: vec![self.to_accept(base_url)],
        }
    }
}

#[derive(Debug, Default)]
pub struct RoutePolicyBuilder {
    path: String,
    method: Option<String>,
    scheme: Option<String>,
    network: Option<String>,
    asset: Option<String>,
    amount: Option<String>,
    pay_to: Option<String>,
    description: Option<String>,
    mime_type: Option<String>,
    max_timeout_seconds: Option<u64>,
    extra: Option<BTreeMap<String, String>>,
    schema: Option<RouteSchema>,
}

impl RoutePolicyBuilder {
    fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_string());
        self
    }

    pub fn network(mut self, network: &str) -> Self {
        self.network = Some(network.to_string());
        self
    }

    pub fn asset(mut self, asset: &str) -> Self {
        self.asset = Some(asset.to_string());
        self
    }

    pub fn amount(mut self, amount: &str) -> Self {
        self.amount = Some(amount.to_string());
        self
    }

    pub fn pay_to(mut self, pay_to: &str) -> Self {
        self.pay_to = Some(pay_to.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    pub fn max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = Some(seconds);
        self
    }

    pub fn extra(mut self, extra: BTreeMap<String, String>) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn schema(mut self, schema: RouteSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn build(self) -> Result<RoutePolicy, PolicyError> {
        let method = self
            .method
            .filter(|m| !m.is_empty())
            .ok_or(PolicyError::MissingField("method"))?
            .to_uppercase();
        let network = self
            .network
            .filter(|n| !n.is_empty())
            .ok_or(PolicyError::MissingField("network"))?;
        let amount = self
            .amount
            .filter(|a| !a.is_empty())
            .ok_or(PolicyError::MissingField("amount"))?;
        x402::parse_amount(&amount).map_err(|_| PolicyError::InvalidAmount(amount.clone()))?;
        let asset = self
            .asset
            .filter(|a| !a.is_empty())
            .ok_or(PolicyError::MissingField("asset"))?;
        let pay_to = self
            .pay_to
            .filter(|p| !p.is_empty())
            .ok_or(PolicyError::MissingField("payTo"))?;
        let description = self
            .description
            .filter(|d| !d.is_empty())
            .ok_or(PolicyError::MissingField("description"))?;

        Ok(RoutePolicy {
            path: self.path,
            method,
            scheme: self.scheme.unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
            network,
            asset,
            amount,
            pay_to,
            description,
            mime_type: self
                .mime_type
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            max_timeout_seconds: self
                .max_timeout_seconds
                .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
            extra: self.extra,
            schema: self.schema,
        })
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("route policy is missing required field: {0}")]
    MissingField(&'static str),

    #[error("route policy amount is not a decimal integer: {0}")]
    InvalidAmount(String),

    #[error("duplicate route policy for {0}")]
    Duplicate(String),
}

/// Route-keyed catalogue of policies. Paths are compared literally; methods
/// case-insensitively after upper-casing.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    routes: HashMap<String, RoutePolicy>,
    proxy_prefix: String,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            proxy_prefix: "/proxy/".to_string(),
        }
    }

    fn key(method: &str, path: &str) -> String {
        format!("{} {}", method.to_uppercase(), path)
    }

    /// Register a policy. At most one policy per (path, method) pair.
    pub fn register(&mut self, policy: RoutePolicy) -> Result<(), PolicyError> {
        let key = Self::key(&policy.method, &policy.path);
        if self.routes.contains_key(&key) {
            return Err(PolicyError::Duplicate(key));
        }
        self.routes.insert(key, policy);
        Ok(())
    }

    /// Exact (path, method) match.
    pub fn get(&self, method: &str, path: &str) -> Option<&RoutePolicy> {
        self.routes.get(&Self::key(method, path))
    }

    /// All registered policies, ordered by route key for stable listings.
    pub fn all(&self) -> Vec<&RoutePolicy> {
        let mut entries: Vec<(&String, &RoutePolicy)> = self.routes.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, p)| p).collect()
    }

    /// Does this path belong to the reserved proxy subtree?
    pub fn is_proxy_path(&self, path: &str) -> bool {
        path.starts_with(&self.proxy_prefix)
    }

    pub fn proxy_prefix(&self) -> &str {
        &self.proxy_prefix
    }
}
