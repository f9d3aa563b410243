//! The request pipeline, composed in fixed order:
//! idempotency → signature validation → replay guard → payment gate →
//! handler (local route or upstream proxy).
//!
//! Stages communicate through the request extensions: signature validation
//! attaches a [`ValidatedPayment`], the payment gate attaches a
//! [`x402::PaymentReceipt`]. Nothing else crosses stage boundaries.

pub mod idempotency;
pub mod payment;
pub mod replay;
pub mod signature;

pub use idempotency::idempotency;
pub use payment::payment_gate;
pub use replay::replay_guard;
pub use signature::validate_signature;

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::Error;

use x402::PaymentPayload;

use crate::error::GatewayError;

/// Decoded, structurally valid payment attached by signature validation.
#[derive(Debug, Clone)]
pub struct ValidatedPayment {
    pub payload: PaymentPayload,
    /// The raw base64 header value, forwarded verbatim to the facilitator.
    pub raw_header: String,
}

/// Short-circuit the pipeline with a rendered gateway error.
pub(crate) fn reject(
    req: ServiceRequest,
    err: GatewayError,
) -> Result<ServiceResponse<BoxBody>, Error> {
    use actix_web::ResponseError;
    Ok(req.into_response(err.error_response()))
}
