use std::collections::BTreeMap;

use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use x402_gateway::config::GatewayConfig;
use x402_gateway::cors::build_cors;
use x402_gateway::metrics::register_metrics;
use x402_gateway::middleware::{idempotency, payment_gate, replay_guard, validate_signature};
use x402_gateway::policy::{InputParam, PolicyRegistry, RoutePolicy, RouteSchema};
use x402_gateway::{routes, AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();

    tracing::info!("Starting x402-gateway on port {}", port);
    tracing::info!("Network: {}", config.network);
    tracing::info!("Upstream: {}", config.upstream_url);
    tracing::info!(
        "Payments: {}",
        if config.mock_payments {
            "MOCK (facilitator bypassed)".to_string()
        } else {
            format!("live via {}", config.facilitator_url)
        }
    );

    // Register route policies. The registry is immutable after this point.
    let policies = build_registry(&config).expect("failed to build route policies");
    tracing::info!("Registered {} route policies", policies.all().len());

    // Register Prometheus metrics
    register_metrics();

    // Create shared state and start the cache sweepers
    let state = AppState::new(config, policies);
    state.start_sweepers();
    let state_data = web::Data::new(state);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(10 * 1024 * 1024)) // 10MB body limit
            // Pipeline order is fixed: idempotency runs first, then
            // signature validation, the replay guard, the payment gate,
            // and finally the route handler. Later .wrap() = outer.
            .wrap(from_fn(payment_gate))
            .wrap(from_fn(replay_guard))
            .wrap(from_fn(validate_signature))
            .wrap(from_fn(idempotency))
            .wrap(build_cors(&allowed_origins))
            .wrap(Logger::default())
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

/// The default route catalogue: a local premium echo plus the two priced
/// demo routes on the upstream. Everything else under /proxy/ forwards
/// unpaid.
fn build_registry(
    config: &GatewayConfig,
) -> Result<PolicyRegistry, x402_gateway::policy::PolicyError> {
    let mut registry = PolicyRegistry::new();

    let mut echo_input = BTreeMap::new();
    echo_input.insert(
        "msg".to_string(),
        InputParam::query("string", "Message to echo back", false),
    );
    registry.register(
        RoutePolicy::builder("/v1/premium/echo")
            .method("GET")
            .network(&config.network)
            .asset("STX")
            .amount(&config.default_amount)
            .pay_to(&config.pay_to)
            .description("Premium echo endpoint")
            .max_timeout_seconds(30)
            .schema(RouteSchema {
                input: echo_input,
                output: serde_json::json!({
                    "echo": { "type": "string" },
                    "ts": { "type": "string" },
                }),
            })
            .build()?,
    )?;

    let mut weather_input = BTreeMap::new();
    weather_input.insert(
        "city".to_string(),
        InputParam::query("string", "City to fetch weather for", true),
    );
    registry.register(
        RoutePolicy::builder("/proxy/api/weather")
            .method("GET")
            .network(&config.network)
            .asset("STX")
            .amount(&config.default_amount)
            .pay_to(&config.pay_to)
            .description("Current weather for a city")
            .max_timeout_seconds(30)
            .schema(RouteSchema {
                input: weather_input,
                output: serde_json::json!({
                    "city": { "type": "string" },
                    "tempC": { "type": "number" },
                }),
            })
            .build()?,
    )?;

    let mut summarize_input = BTreeMap::new();
    summarize_input.insert(
        "text".to_string(),
        InputParam::body("string", "Text to summarize", true),
    );
    registry.register(
        RoutePolicy::builder("/proxy/api/summarize")
            .method("POST")
            .network(&config.network)
            .asset("STX")
            .amount("50")
            .pay_to(&config.pay_to)
            .description("Summarize a block of text")
            .max_timeout_seconds(30)
            .schema(RouteSchema {
                input: summarize_input,
                output: serde_json::json!({
                    "summary": { "type": "string" },
                }),
            })
            .build()?,
    )?;

    Ok(registry)
}
