//! Live-mode tests against a mock facilitator: verify/settle orchestration,
//! receipt merging, and failure surfacing.

use actix_web::middleware::from_fn;
use actix_web::{test, web, App, HttpResponse, HttpServer};

use x402::{decode_header, encode_header, PaymentPayload, PaymentReceipt};
use x402_gateway::middleware::{idempotency, payment_gate, replay_guard, validate_signature};
use x402_gateway::policy::{PolicyRegistry, RoutePolicy};
use x402_gateway::{routes, AppState, GatewayConfig};

const PAY_TO: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
const NETWORK: &str = "stacks:2147483648";

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .wrap(from_fn(payment_gate))
                .wrap(from_fn(replay_guard))
                .wrap(from_fn(validate_signature))
                .wrap(from_fn(idempotency))
                .configure(routes::configure),
        )
        .await
    };
}

#[derive(Clone, Copy)]
struct FacilitatorBehavior {
    valid: bool,
    settle_ok: bool,
}

async fn facilitator_verify(behavior: web::Data<FacilitatorBehavior>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "valid": behavior.valid,
        "payer": "ST1REALPAYERADDRESS00000000000000000000",
        "amount": "100000",
        // Deliberately different from the settle network: settle must win.
        "network": "stacks:1",
    }))
}

async fn facilitator_settle(behavior: web::Data<FacilitatorBehavior>) -> HttpResponse {
    if !behavior.settle_ok {
        return HttpResponse::InternalServerError().body("settlement executor offline");
    }
    HttpResponse::Ok().json(serde_json::json!({
        "settled": true,
        "txHash": "0xabc123",
        "network": NETWORK,
        "timestamp": 1_700_000_000_000u64,
    }))
}

fn start_facilitator(behavior: FacilitatorBehavior) -> u16 {
    let data = web::Data::new(behavior);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/verify", web::post().to(facilitator_verify))
            .route("/settle", web::post().to(facilitator_settle))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("failed to bind facilitator");
    let port = server.addrs()[0].port();
    actix_rt::spawn(server.run());
    port
}

fn live_state(facilitator_port: u16) -> web::Data<AppState> {
    let mut config = GatewayConfig::mock("http://localhost:3000", "http://localhost:4000");
    config.mock_payments = false;
    config.facilitator_url = format!("http://127.0.0.1:{facilitator_port}");

    let mut registry = PolicyRegistry::new();
    registry
        .register(
            RoutePolicy::builder("/v1/premium/echo")
                .method("GET")
                .network(&config.network)
                .asset("STX")
                .amount("100000")
                .pay_to(&config.pay_to)
                .description("Premium echo endpoint")
                .max_timeout_seconds(5)
                .build()
                .unwrap(),
        )
        .unwrap();

    web::Data::new(AppState::new(config, registry))
}

fn paid_header(nonce: &str) -> String {
    let payload = PaymentPayload {
        x402_version: 2,
        scheme: "exact".to_string(),
        network: NETWORK.to_string(),
        asset: "STX".to_string(),
        pay_to: PAY_TO.to_string(),
        amount: "100000".to_string(),
        nonce: nonce.to_string(),
        signature: "signed-by-wallet".to_string(),
        resource: "http://localhost:3000/v1/premium/echo".to_string(),
        memo: None,
    };
    encode_header(&payload).unwrap()
}

#[actix_rt::test]
async fn live_settlement_merges_verify_and_settle_into_receipt() {
    let port = start_facilitator(FacilitatorBehavior {
        valid: true,
        settle_ok: true,
    });
    let state = live_state(port);
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/v1/premium/echo?msg=live")
        .insert_header(("payment-signature", paid_header("live-1")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let receipt: PaymentReceipt = decode_header(
        resp.headers()
            .get("payment-response")
            .and_then(|v| v.to_str().ok())
            .expect("missing payment-response header"),
    )
    .unwrap();

    // payer and amount come from verify; txHash, timestamp, network and
    // settled from settle. The networks disagree here: settle wins.
    assert_eq!(receipt.payer, "ST1REALPAYERADDRESS00000000000000000000");
    assert_eq!(receipt.amount, "100000");
    assert_eq!(receipt.tx_hash.as_deref(), Some("0xabc123"));
    assert_eq!(receipt.network, NETWORK);
    assert_eq!(receipt.timestamp, 1_700_000_000_000);
    assert!(receipt.settled);
}

#[actix_rt::test]
async fn facilitator_rejection_is_401() {
    let port = start_facilitator(FacilitatorBehavior {
        valid: false,
        settle_ok: true,
    });
    let state = live_state(port);
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/v1/premium/echo")
        .insert_header(("payment-signature", paid_header("live-2")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "verification_failed");
}

#[actix_rt::test]
async fn facilitator_failure_surfaces_as_502_with_body_text() {
    let port = start_facilitator(FacilitatorBehavior {
        valid: true,
        settle_ok: false,
    });
    let state = live_state(port);
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/v1/premium/echo")
        .insert_header(("payment-signature", paid_header("live-3")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "facilitator_error");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("500"));
    assert!(message.contains("settlement executor offline"));
}

#[actix_rt::test]
async fn nonce_stays_consumed_when_settlement_fails() {
    let port = start_facilitator(FacilitatorBehavior {
        valid: true,
        settle_ok: false,
    });
    let state = live_state(port);
    let app = test_app!(state);

    let header = paid_header("live-4");
    let req = test::TestRequest::get()
        .uri("/v1/premium/echo")
        .insert_header(("payment-signature", header.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);

    // The nonce was recorded before settlement: a verbatim retry is a
    // replay, not a second settlement attempt.
    let req = test::TestRequest::get()
        .uri("/v1/premium/echo")
        .insert_header(("payment-signature", header))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}

#[actix_rt::test]
async fn unreachable_facilitator_is_502() {
    let state = live_state(1); // nothing listens on port 1
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/v1/premium/echo")
        .insert_header(("payment-signature", paid_header("live-5")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "facilitator_error");
}
