//! Nonce replay guard.
//!
//! The nonce key is recorded before settlement runs, so a concurrent retry
//! cannot slip through while the facilitator call is in flight. The flip
//! side is accepted deliberately: if settlement later fails, the nonce
//! stays consumed until its TTL lapses and the client must re-sign.

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage};

use x402::constants::PAYMENT_SIGNATURE_HEADER;

use crate::error::GatewayError;
use crate::metrics;
use crate::state::AppState;

use super::{reject, ValidatedPayment};

pub async fn replay_guard(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    if req.headers().get(PAYMENT_SIGNATURE_HEADER).is_none() {
        return next.call(req).await;
    }

    // Absent payload means signature validation already rejected upstream
    // of us, or the route carries no payment at all.
    let nonce_key = req
        .extensions()
        .get::<ValidatedPayment>()
        .map(|v| v.payload.nonce_key());
    let Some(nonce_key) = nonce_key else {
        return next.call(req).await;
    };

    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return next.call(req).await;
    };

    // Atomic insert-if-absent is the linearization point: of N concurrent
    // requests with the same (nonce, memo), exactly one claims the key.
    if !state.nonces.insert_if_absent(nonce_key.clone(), ()) {
        tracing::warn!(nonce_key = %nonce_key, "replay detected");
        metrics::REPLAYS_BLOCKED.inc();
        return reject(req, GatewayError::Replay);
    }

    next.call(req).await
}
