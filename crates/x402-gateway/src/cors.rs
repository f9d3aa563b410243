//! CORS configuration for the gateway binary.

use actix_cors::Cors;

/// Build the gateway CORS middleware from allowed origins.
///
/// An empty origin list falls back to a localhost-only dev policy. The
/// payment headers must be explicitly allowed and exposed or browser-based
/// buyers cannot complete the 402 handshake.
pub fn build_cors(allowed_origins: &[String]) -> Cors {
    let cors = if allowed_origins.is_empty() {
        Cors::default().allowed_origin_fn(|origin, _req_head| {
            origin
                .to_str()
                .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                .unwrap_or(false)
        })
    } else {
        let allowed = allowed_origins.to_vec();
        Cors::default().allowed_origin_fn(move |origin, _req_head| {
            let origin_str = origin.to_str().unwrap_or("");
            allowed.iter().any(|a| a == "*" || a == origin_str)
        })
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::ACCEPT,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::HeaderName::from_static("payment-signature"),
            actix_web::http::header::HeaderName::from_static("idempotency-key"),
        ])
        .expose_headers(vec![
            actix_web::http::header::HeaderName::from_static("payment-required"),
            actix_web::http::header::HeaderName::from_static("payment-response"),
        ])
        .max_age(3600)
}
