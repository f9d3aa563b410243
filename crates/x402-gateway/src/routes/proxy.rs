use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bytes::Bytes;

use x402::PaymentReceipt;

use crate::error::GatewayError;
use crate::metrics;
use crate::proxy::forward;
use crate::state::AppState;

/// ANY /proxy/{path}: forward to the upstream after the payment pipeline
/// has run. Paths with no registered policy arrive here unpaid; that is
/// intentional and lets unpriced upstream routes coexist.
pub async fn proxy_entry(
    req: HttpRequest,
    path: web::Path<String>,
    body: Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let rest = path.into_inner();
    let receipt = req.extensions().get::<PaymentReceipt>().cloned();

    metrics::PROXY_REQUESTS_TOTAL.inc();
    let timer = metrics::PROXY_LATENCY.start_timer();
    let result = forward(
        &state.http_client,
        &req,
        &state.config.upstream_url,
        &rest,
        body,
        receipt.as_ref(),
    )
    .await;
    timer.observe_duration();
    result
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/proxy/{path:.*}").route(web::route().to(proxy_entry)));
}
