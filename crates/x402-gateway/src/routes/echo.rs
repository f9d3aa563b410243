use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use serde::Deserialize;

use x402::PaymentReceipt;

use crate::envelope::GatewayEnvelope;

#[derive(Debug, Deserialize)]
pub struct EchoQuery {
    #[serde(default)]
    pub msg: String,
}

/// GET /v1/premium/echo: local paid route. The payment gate has already
/// run; the receipt (if any) sits in the request extensions.
pub async fn echo(req: HttpRequest, query: web::Query<EchoQuery>) -> HttpResponse {
    let receipt = req.extensions().get::<PaymentReceipt>().cloned();
    let data = serde_json::json!({
        "echo": query.msg,
        "ts": chrono::Utc::now().to_rfc3339(),
    });
    HttpResponse::Ok().json(GatewayEnvelope::ok(data, receipt))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/premium/echo", web::get().to(echo));
}
