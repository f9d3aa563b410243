pub mod discovery;
pub mod echo;
pub mod health;
pub mod metrics;
pub mod proxy;

use actix_web::web;

/// Bind every gateway route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    health::configure(cfg);
    metrics::configure(cfg);
    discovery::configure(cfg);
    echo::configure(cfg);
    proxy::configure(cfg);
}
