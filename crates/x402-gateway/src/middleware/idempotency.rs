//! Idempotent replay of successful responses.
//!
//! Keyed by `method|path|token` from the client's `idempotency-key`
//! header. Only 2xx responses are captured: storing a 402 here would lock
//! a client out of ever paying under that key.

use actix_web::body::{self, BoxBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::CONTENT_TYPE;
use actix_web::http::StatusCode;
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};

use x402::constants::{IDEMPOTENCY_KEY_HEADER, PAYMENT_RESPONSE_HEADER};

use crate::metrics;
use crate::state::{AppState, IdempotencyEntry};

pub async fn idempotency(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let token = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let Some(token) = token else {
        return observe(next.call(req).await);
    };
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return observe(next.call(req).await);
    };

    let cache_key = format!("{}|{}|{}", req.method(), req.path(), token);

    if let Some(entry) = state.idempotency.get(&cache_key) {
        tracing::debug!(key = %cache_key, "idempotency cache hit");
        metrics::IDEMPOTENCY_HITS.inc();
        return Ok(req.into_response(replay(&entry)));
    }

    let res = observe(next.call(req).await)?;
    if !res.status().is_success() {
        return Ok(res);
    }

    // Buffer the response so it can be stored and flushed verbatim.
    let (http_req, http_res) = res.into_parts();
    let status = http_res.status();
    let headers = http_res.headers().clone();
    let bytes = body::to_bytes(http_res.into_body())
        .await
        .map_err(|_| actix_web::error::ErrorInternalServerError("response buffering failed"))?;

    let entry = IdempotencyEntry {
        status: status.as_u16(),
        content_type: header_string(&headers, CONTENT_TYPE.as_str()),
        payment_response: header_string(&headers, PAYMENT_RESPONSE_HEADER),
        body: bytes.clone(),
    };
    state.idempotency.set(cache_key, entry);

    let mut builder = HttpResponse::build(status);
    for (name, value) in headers.iter() {
        builder.append_header((name.clone(), value.clone()));
    }
    Ok(ServiceResponse::new(http_req, builder.body(bytes)))
}

/// Rebuild the stored response: status, selected headers, body verbatim.
fn replay(entry: &IdempotencyEntry) -> HttpResponse {
    let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
    let mut builder = HttpResponse::build(status);
    if let Some(content_type) = &entry.content_type {
        builder.insert_header((CONTENT_TYPE, content_type.clone()));
    }
    if let Some(payment_response) = &entry.payment_response {
        builder.insert_header((PAYMENT_RESPONSE_HEADER, payment_response.clone()));
    }
    builder.body(entry.body.clone())
}

fn header_string(headers: &actix_web::http::header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Count every completed request against the matched route pattern.
fn observe(
    result: Result<ServiceResponse<BoxBody>, Error>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    if let Ok(res) = &result {
        let pattern = res
            .request()
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());
        metrics::REQUESTS_TOTAL
            .with_label_values(&[
                res.request().method().as_str(),
                pattern.as_str(),
                res.status().as_str(),
            ])
            .inc();
    }
    result
}
