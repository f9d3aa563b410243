//! Wire-format types for the x402 v2 payment protocol.
//!
//! Every type here crosses an HTTP boundary as base64-encoded JSON:
//! [`PaymentRequirements`] in the `payment-required` header (and 402 body),
//! [`PaymentPayload`] in the `payment-signature` header, and
//! [`PaymentReceipt`] in the `payment-response` header.

use std::collections::BTreeMap;

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::X402Error;

/// A single priced payment option advertised in a 402 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAccept {
    pub scheme: String,
    pub network: String,
    /// Minimum amount in the asset's smallest unit, as a decimal integer
    /// string. May exceed 64-bit precision.
    pub max_amount_required: String,
    /// Absolute URL of the priced resource.
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// The full 402 response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub x402_version: u32,
    pub accepts: Vec<PaymentAccept>,
}

/// Decoded contents of the `payment-signature` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[serde(default)]
    pub x402_version: u32,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub pay_to: String,
    /// Offered amount in smallest units, decimal integer string.
    #[serde(default)]
    pub amount: String,
    /// Per-payment uniqueness token. Opaque to the gateway.
    #[serde(default)]
    pub nonce: String,
    /// Opaque signature blob, verified only by the facilitator.
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl PaymentPayload {
    /// Report every required field that is missing or empty.
    ///
    /// `x402Version` is checked separately so the caller can distinguish a
    /// wrong version from an absent field.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.scheme.is_empty() {
            missing.push("scheme");
        }
        if self.network.is_empty() {
            missing.push("network");
        }
        if self.asset.is_empty() {
            missing.push("asset");
        }
        if self.pay_to.is_empty() {
            missing.push("payTo");
        }
        if self.amount.is_empty() {
            missing.push("amount");
        }
        if self.nonce.is_empty() {
            missing.push("nonce");
        }
        if self.signature.is_empty() {
            missing.push("signature");
        }
        if self.resource.is_empty() {
            missing.push("resource");
        }
        missing
    }

    /// Replay-cache key: the nonce, or `nonce:memo` when a memo is present.
    /// The two-part key lets a caller reuse a nonce for a distinct memo.
    pub fn nonce_key(&self) -> String {
        match self.memo.as_deref() {
            Some(memo) if !memo.is_empty() => format!("{}:{}", self.nonce, memo),
            _ => self.nonce.clone(),
        }
    }
}

/// Settlement receipt emitted on a paid 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub network: String,
    pub payer: String,
    pub amount: String,
    /// Unix milliseconds.
    pub timestamp: u64,
    pub settled: bool,
}

/// Encode a value as base64(JSON) for an x402 header.
pub fn encode_header<T: Serialize>(value: &T) -> Result<String, X402Error> {
    let json = serde_json::to_vec(value)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Decode an x402 header value from base64(JSON).
pub fn decode_header<T: DeserializeOwned>(value: &str) -> Result<T, X402Error> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| {
            X402Error::InvalidPayment("not valid base64-encoded JSON".to_string())
        })?;
    serde_json::from_slice(&bytes)
        .map_err(|_| X402Error::InvalidPayment("not valid base64-encoded JSON".to_string()))
}
