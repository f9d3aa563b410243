//! Upstream proxying for paid (and unpriced) routes under `/proxy/`.
//!
//! The upstream sees an ordinary HTTP request: every x402 header is
//! stripped here, which is the enforcement point for the "upstream sees no
//! x402" invariant.

use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use bytes::Bytes;

use x402::constants::{
    IDEMPOTENCY_KEY_HEADER, PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER,
    PAYMENT_SIGNATURE_HEADER,
};
use x402::PaymentReceipt;

use crate::envelope::GatewayEnvelope;
use crate::error::GatewayError;

/// Hop-by-hop headers, never forwarded in either direction.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Additionally stripped from the upstream-bound request.
const REQUEST_STRIP: &[&str] = &[
    "host",
    "content-length", // Will be recalculated
    PAYMENT_REQUIRED_HEADER,
    PAYMENT_SIGNATURE_HEADER,
    PAYMENT_RESPONSE_HEADER,
    IDEMPOTENCY_KEY_HEADER,
];

/// Additionally stripped from the client-bound response. The gateway's own
/// `payment-response` is re-applied by the payment gate; an
/// upstream-supplied one must never leak through.
const RESPONSE_STRIP: &[&str] = &[
    "content-length",
    PAYMENT_REQUIRED_HEADER,
    PAYMENT_SIGNATURE_HEADER,
    PAYMENT_RESPONSE_HEADER,
];

/// Forward a request to `upstream_base + rest` and splice the response
/// back, wrapping JSON bodies in the gateway envelope when a receipt
/// exists.
pub async fn forward(
    client: &reqwest::Client,
    req: &HttpRequest,
    upstream_base: &str,
    rest: &str,
    body: Bytes,
    receipt: Option<&PaymentReceipt>,
) -> Result<HttpResponse, GatewayError> {
    let rest = sanitize_path(rest)?;
    let mut target_url = format!("{}/{}", upstream_base.trim_end_matches('/'), rest);
    if let Some(query) = req.uri().query() {
        let query = sanitize_query(query)?;
        if !query.is_empty() {
            target_url = format!("{target_url}?{query}");
        }
    }

    let method = match req.method().as_str() {
        "GET" => reqwest::Method::GET,
        "POST" => reqwest::Method::POST,
        "PUT" => reqwest::Method::PUT,
        "DELETE" => reqwest::Method::DELETE,
        "PATCH" => reqwest::Method::PATCH,
        "HEAD" => reqwest::Method::HEAD,
        "OPTIONS" => reqwest::Method::OPTIONS,
        other => {
            return Err(GatewayError::Proxy(format!(
                "unsupported HTTP method: {other}"
            )));
        }
    };

    let mut request_builder = client.request(method, &target_url);

    // Forward remaining request headers, multi-value joined with ", ".
    let mut has_content_type = false;
    for (name, values) in collect_headers(req) {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) || REQUEST_STRIP.contains(&name.as_str()) {
            continue;
        }
        if name == "content-type" {
            has_content_type = true;
        }
        request_builder = request_builder.header(name.as_str(), values.join(", "));
    }

    if !body.is_empty() {
        if !has_content_type {
            request_builder = request_builder.header("content-type", "application/json");
        }
        request_builder = request_builder.body(body.to_vec());
    }

    let response = request_builder
        .send()
        .await
        .map_err(|e| GatewayError::Proxy(format!("upstream request failed: {e}")))?;

    let status = response.status();
    let headers = response.headers().clone();
    let upstream_body = response
        .bytes()
        .await
        .map_err(|e| GatewayError::Proxy(format!("failed to read upstream response: {e}")))?;

    let mut builder =
        HttpResponse::build(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK));

    for (name, value) in headers.iter() {
        let name_lower = name.as_str().to_lowercase();
        if HOP_BY_HOP_HEADERS.contains(&name_lower.as_str())
            || RESPONSE_STRIP.contains(&name_lower.as_str())
        {
            continue;
        }
        if let Ok(value_str) = value.to_str() {
            builder.append_header((name.as_str(), value_str));
        }
    }

    let is_json = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    // Only JSON bodies are wrapped; everything else passes through with
    // the receipt carried in the header alone.
    if is_json {
        if let Some(receipt) = receipt {
            if let Ok(data) = serde_json::from_slice::<serde_json::Value>(&upstream_body) {
                return Ok(builder.json(GatewayEnvelope::ok(data, Some(receipt.clone()))));
            }
        }
    }

    Ok(builder.body(upstream_body))
}

/// Group request headers by lowercase name, preserving value order.
fn collect_headers(req: &HttpRequest) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in req.headers() {
        if let Ok(value_str) = value.to_str() {
            grouped
                .entry(name.as_str().to_lowercase())
                .or_default()
                .push(value_str.to_string());
        }
    }
    grouped
}

/// Sanitize the proxied path segment against traversal and URL authority
/// injection.
fn sanitize_path(path: &str) -> Result<String, GatewayError> {
    let decoded = urlencoding::decode(path)
        .map_err(|_| GatewayError::Proxy("invalid URL encoding in path".to_string()))?;

    if decoded.contains("..") {
        return Err(GatewayError::Proxy("path traversal not allowed".to_string()));
    }
    if decoded.starts_with('/') {
        return Err(GatewayError::Proxy("path must not start with /".to_string()));
    }
    if decoded.contains('@') {
        return Err(GatewayError::Proxy("path must not contain @".to_string()));
    }

    Ok(decoded.into_owned())
}

/// Sanitize a query string against CRLF injection and fragment smuggling.
fn sanitize_query(query: &str) -> Result<String, GatewayError> {
    if query.contains('\r') || query.contains('\n') {
        return Err(GatewayError::Proxy(
            "query string must not contain newlines".to_string(),
        ));
    }

    let sanitized = match query.find('#') {
        Some(idx) => &query[..idx],
        None => query,
    };

    if sanitized.contains('\0') {
        return Err(GatewayError::Proxy(
            "query string must not contain null bytes".to_string(),
        ));
    }

    Ok(sanitized.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_strip_covers_payment_and_host_headers() {
        assert!(REQUEST_STRIP.contains(&"host"));
        assert!(REQUEST_STRIP.contains(&"content-length"));
        assert!(REQUEST_STRIP.contains(&"payment-signature"));
        assert!(REQUEST_STRIP.contains(&"payment-required"));
        assert!(REQUEST_STRIP.contains(&"payment-response"));
        assert!(!REQUEST_STRIP.contains(&"content-type"));
    }

    #[test]
    fn test_hop_by_hop_set() {
        assert!(HOP_BY_HOP_HEADERS.contains(&"connection"));
        assert!(HOP_BY_HOP_HEADERS.contains(&"transfer-encoding"));
        assert!(!HOP_BY_HOP_HEADERS.contains(&"cache-control"));
    }

    #[test]
    fn test_sanitize_path_rejects_traversal() {
        assert!(sanitize_path("api/weather").is_ok());
        assert!(sanitize_path("../etc/passwd").is_err());
        assert!(sanitize_path("%2e%2e/secret").is_err());
        assert!(sanitize_path("/absolute").is_err());
        assert!(sanitize_path("user@evil.example").is_err());
    }

    #[test]
    fn test_sanitize_query() {
        assert_eq!(sanitize_query("city=Tokyo").unwrap(), "city=Tokyo");
        assert_eq!(sanitize_query("a=1#frag").unwrap(), "a=1");
        assert!(sanitize_query("a=1\r\nInjected: x").is_err());
        assert!(sanitize_query("a=\0").is_err());
    }
}
