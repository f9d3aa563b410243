use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("gateway_requests_total", "Total number of requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static PAYMENTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gateway_payments_total",
        "Total number of successful payments",
    )
    .unwrap()
});

pub static PAYMENTS_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("gateway_payments_failed", "Total number of failed payments").unwrap()
});

pub static PAYMENTS_REQUIRED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gateway_payments_required_total",
        "Total number of 402 challenges issued",
    )
    .unwrap()
});

pub static IDEMPOTENCY_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gateway_idempotency_hits_total",
        "Responses replayed from the idempotency cache",
    )
    .unwrap()
});

pub static REPLAYS_BLOCKED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gateway_replays_blocked_total",
        "Requests rejected by the nonce replay guard",
    )
    .unwrap()
});

pub static PROXY_REQUESTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gateway_proxy_requests_total",
        "Total number of proxied requests",
    )
    .unwrap()
});

pub static PROXY_LATENCY: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("gateway_proxy_latency_seconds", "Proxy request latency")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

/// Register all metrics with the registry
pub fn register_metrics() {
    REGISTRY.register(Box::new(REQUESTS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(PAYMENTS_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(PAYMENTS_FAILED.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(PAYMENTS_REQUIRED.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(IDEMPOTENCY_HITS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(REPLAYS_BLOCKED.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(PROXY_REQUESTS_TOTAL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(PROXY_LATENCY.clone())).unwrap();
}

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
