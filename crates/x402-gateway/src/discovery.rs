//! Machine-readable discovery document, x402scan-compatible.
//!
//! Assembled from the policy registry on every request; the response is
//! client-cacheable for five minutes instead of being cached server-side.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use x402::constants::{short_network_token, X402_VERSION};
use x402::PaymentAccept;

use crate::config::GatewayConfig;
use crate::policy::{ParamLocation, PolicyRegistry, RoutePolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDocument {
    pub x402_version: u32,
    pub name: String,
    pub description: String,
    pub image: String,
    pub url: String,
    pub accepts: Vec<PaymentAccept>,
}

/// Build the discovery document, listing every registered route.
pub fn build_document(config: &GatewayConfig, registry: &PolicyRegistry) -> DiscoveryDocument {
    let accepts = registry
        .all()
        .into_iter()
        .map(|policy| discovery_accept(policy, &config.public_base_url))
        .collect();

    DiscoveryDocument {
        x402_version: X402_VERSION,
        name: config.service_name.clone(),
        description: config.service_description.clone(),
        image: config.service_image.clone(),
        url: config.public_base_url.clone(),
        accepts,
    }
}

/// Render one policy as a discovery accept entry.
///
/// Unlike the 402 offer, the network is normalized to its short token form
/// and every entry carries an `outputSchema`.
fn discovery_accept(policy: &RoutePolicy, public_base_url: &str) -> PaymentAccept {
    let mut accept = policy.to_accept(public_base_url);
    accept.network = short_network_token(&policy.network).to_string();
    accept.output_schema = Some(output_schema(policy));
    accept
}

fn output_schema(policy: &RoutePolicy) -> Value {
    let Some(schema) = &policy.schema else {
        // Fallback for routes registered without an explicit schema.
        return json!({
            "input": { "type": "http", "method": policy.method },
            "output": { "data": { "type": "object" } },
        });
    };

    let mut query_params = Map::new();
    let mut body_fields = Map::new();
    for (name, param) in &schema.input {
        let entry = json!({
            "type": param.param_type,
            "description": param.description,
            "required": param.required,
        });
        match param.location {
            ParamLocation::Query => query_params.insert(name.clone(), entry),
            ParamLocation::Body => body_fields.insert(name.clone(), entry),
        };
    }

    let mut input = Map::new();
    input.insert("type".to_string(), json!("http"));
    input.insert("method".to_string(), json!(policy.method));
    if !query_params.is_empty() {
        input.insert("queryParams".to_string(), Value::Object(query_params));
    }
    if !body_fields.is_empty() {
        input.insert("bodyFields".to_string(), Value::Object(body_fields));
    }

    json!({
        "input": Value::Object(input),
        "output": schema.output,
    })
}
