use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Gateway-facing errors. Each variant maps to exactly one client status.
///
/// Clients receive only the short message, never internal detail or stack
/// traces; internal failures are logged server-side and collapsed to a
/// generic body.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed signature header: bad base64, bad JSON, missing fields,
    /// wrong protocol version, or a non-numeric amount string.
    #[error("invalid payment: {0}")]
    InvalidPayment(String),

    /// Payload disagrees with the route's offer on scheme, network, asset,
    /// or recipient. Carries every mismatch at once.
    #[error("payment does not match offer: {0}")]
    OfferMismatch(String),

    #[error("insufficient amount: required {required}, provided {provided}")]
    InsufficientAmount { required: String, provided: String },

    #[error("replay detected: nonce already consumed")]
    Replay,

    #[error("payment signature verification failed")]
    VerificationFailed,

    #[error("facilitator error: {0}")]
    Facilitator(String),

    #[error("proxy error: {0}")]
    Proxy(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::InvalidPayment(msg) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "invalid_payment",
                    "message": msg
                }))
            }
            GatewayError::OfferMismatch(msg) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "offer_mismatch",
                    "message": format!("payment does not match offer: {msg}")
                }))
            }
            GatewayError::InsufficientAmount { .. } => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "insufficient_amount",
                    "message": self.to_string()
                }))
            }
            GatewayError::Replay => HttpResponse::Conflict().json(serde_json::json!({
                "error": "replay_detected",
                "message": self.to_string()
            })),
            GatewayError::VerificationFailed => {
                HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "verification_failed",
                    "message": self.to_string()
                }))
            }
            GatewayError::Facilitator(msg) => {
                tracing::error!("facilitator error: {}", msg);
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "facilitator_error",
                    "message": msg
                }))
            }
            GatewayError::Proxy(msg) => {
                tracing::error!("proxy error: {}", msg);
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "proxy_error",
                    "message": msg
                }))
            }
            GatewayError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "internal_error",
                    "message": "an internal error occurred"
                }))
            }
        }
    }
}
