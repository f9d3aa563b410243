use serde::{Deserialize, Serialize};
use serde_json::Value;

use x402::PaymentReceipt;

/// JSON response wrapper applied to paid responses.
///
/// Only JSON bodies are wrapped; non-JSON bodies pass through with the
/// receipt carried in the `payment-response` header alone. The decision is
/// made from the response content type, not the route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEnvelope {
    pub success: bool,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<PaymentReceipt>,
}

impl GatewayEnvelope {
    pub fn ok(data: Value, receipt: Option<PaymentReceipt>) -> Self {
        Self {
            success: true,
            data,
            receipt,
        }
    }
}
