use actix_web::http::header::CACHE_CONTROL;
use actix_web::{web, HttpResponse};

use crate::discovery::build_document;
use crate::state::AppState;

/// GET /.well-known/x402: the machine-readable discovery document.
/// Regenerated per request (cheap) and client-cacheable for five minutes.
pub async fn discovery(state: web::Data<AppState>) -> HttpResponse {
    let document = build_document(&state.config, &state.policies);
    HttpResponse::Ok()
        .insert_header((CACHE_CONTROL, "public, max-age=300"))
        .json(document)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/.well-known/x402", web::get().to(discovery));
}
