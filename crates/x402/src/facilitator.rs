//! HTTP client for the external facilitator's `/verify` and `/settle` RPCs.
//!
//! The facilitator is treated as authoritative and idempotent at its own
//! layer, so neither call is retried. Non-2xx responses are fatal for the
//! request and surface the status code plus body text.

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::X402Error;
use crate::payment::PaymentAccept;
use crate::response::{SettleResponse, VerifyResponse};

#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    base_url: String,
    http: reqwest::Client,
}

impl FacilitatorClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the facilitator to verify a signed payment against an offer.
    ///
    /// `payment_signature` is the raw base64 header value as received from
    /// the client; the facilitator decodes and checks the signature itself.
    pub async fn verify(
        &self,
        payment_signature: &str,
        requirements: &PaymentAccept,
    ) -> Result<VerifyResponse, X402Error> {
        self.post("verify", payment_signature, requirements).await
    }

    /// Ask the facilitator to settle a verified payment on-chain.
    pub async fn settle(
        &self,
        payment_signature: &str,
        requirements: &PaymentAccept,
    ) -> Result<SettleResponse, X402Error> {
        self.post("settle", payment_signature, requirements).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        op: &str,
        payment_signature: &str,
        requirements: &PaymentAccept,
    ) -> Result<T, X402Error> {
        let url = format!("{}/{op}", self.base_url);
        let body = json!({
            "paymentSignature": payment_signature,
            "requirements": requirements,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| X402Error::HttpError(format!("facilitator {op} request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| X402Error::HttpError(format!("facilitator {op} response unreadable: {e}")))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %text, "facilitator {op} returned non-success");
            return Err(X402Error::Facilitator {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| X402Error::HttpError(format!("invalid facilitator {op} response: {e}")))
    }
}
