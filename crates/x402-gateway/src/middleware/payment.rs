//! The payment gate: issues 402 challenges, settles payments through the
//! facilitator (or synthesizes a receipt in mock mode), and stamps the
//! `payment-response` header on the final response.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage, HttpResponse};

use x402::constants::{PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER};
use x402::{encode_header, PaymentAccept, PaymentReceipt};

use crate::error::GatewayError;
use crate::metrics;
use crate::policy::RoutePolicy;
use crate::state::AppState;

use super::{reject, ValidatedPayment};

const MOCK_TX_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";
const MOCK_PAYER: &str = "ST1MOCKPAYER0000000000000000000000000000";

pub async fn payment_gate(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return next.call(req).await;
    };

    // No policy on this path: unpaid route, pass through. This is what
    // lets unpriced upstream routes coexist under the proxy prefix.
    let Some(policy) = state
        .policies
        .get(req.method().as_str(), req.path())
        .cloned()
    else {
        return next.call(req).await;
    };

    let validated = req.extensions().get::<ValidatedPayment>().cloned();
    let Some(validated) = validated else {
        return challenge(req, &policy, &state);
    };

    let accept = policy.to_accept(&state.config.base_url);
    let receipt = if state.config.mock_payments {
        mock_receipt(&policy, &validated)
    } else {
        match settle_live(&state, &policy, &accept, &validated).await {
            Ok(receipt) => receipt,
            Err(err) => {
                metrics::PAYMENTS_FAILED.inc();
                return reject(req, err);
            }
        }
    };

    let header_value = match encode_header(&receipt) {
        Ok(v) => v,
        Err(e) => return reject(req, GatewayError::Internal(e.to_string())),
    };

    metrics::PAYMENTS_TOTAL.inc();
    req.extensions_mut().insert(receipt);

    let mut res = next.call(req).await?;
    if let Ok(value) = HeaderValue::from_str(&header_value) {
        res.headers_mut()
            .insert(HeaderName::from_static(PAYMENT_RESPONSE_HEADER), value);
    }
    Ok(res)
}

/// Respond 402 with the offer in both the header and the body.
fn challenge(
    req: ServiceRequest,
    policy: &RoutePolicy,
    state: &web::Data<AppState>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let requirements = policy.requirements(&state.config.base_url);
    let header_value = match encode_header(&requirements) {
        Ok(v) => v,
        Err(e) => return reject(req, GatewayError::Internal(e.to_string())),
    };
    metrics::PAYMENTS_REQUIRED.inc();
    let res = HttpResponse::PaymentRequired()
        .insert_header((PAYMENT_REQUIRED_HEADER, header_value))
        .json(requirements);
    Ok(req.into_response(res))
}

fn mock_receipt(policy: &RoutePolicy, validated: &ValidatedPayment) -> PaymentReceipt {
    PaymentReceipt {
        tx_hash: Some(MOCK_TX_HASH.to_string()),
        network: policy.network.clone(),
        payer: MOCK_PAYER.to_string(),
        amount: validated.payload.amount.clone(),
        timestamp: now_millis(),
        settled: true,
    }
}

/// Verify then settle through the facilitator, both bounded by the
/// policy's settlement deadline.
///
/// The receipt merges both responses: `payer` and `amount` come from
/// verify, `txHash`, `timestamp`, `network`, and `settled` from settle.
/// If the two disagree on network, settle wins.
async fn settle_live(
    state: &web::Data<AppState>,
    policy: &RoutePolicy,
    accept: &PaymentAccept,
    validated: &ValidatedPayment,
) -> Result<PaymentReceipt, GatewayError> {
    let deadline = Duration::from_secs(policy.max_timeout_seconds);

    let verification = tokio::time::timeout(
        deadline,
        state.facilitator.verify(&validated.raw_header, accept),
    )
    .await
    .map_err(|_| {
        GatewayError::Facilitator(format!(
            "facilitator verify timed out after {}s",
            policy.max_timeout_seconds
        ))
    })?
    .map_err(|e| GatewayError::Facilitator(e.to_string()))?;

    if !verification.valid {
        return Err(GatewayError::VerificationFailed);
    }

    let settlement = tokio::time::timeout(
        deadline,
        state.facilitator.settle(&validated.raw_header, accept),
    )
    .await
    .map_err(|_| {
        GatewayError::Facilitator(format!(
            "facilitator settle timed out after {}s",
            policy.max_timeout_seconds
        ))
    })?
    .map_err(|e| GatewayError::Facilitator(e.to_string()))?;

    Ok(PaymentReceipt {
        tx_hash: settlement.tx_hash,
        network: settlement.network,
        payer: verification.payer,
        amount: verification.amount,
        timestamp: settlement.timestamp,
        settled: settlement.settled,
    })
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402::PaymentPayload;

    #[test]
    fn test_mock_receipt_echoes_submitted_amount() {
        let policy = RoutePolicy::builder("/v1/premium/echo")
            .method("GET")
            .network("stacks:2147483648")
            .asset("STX")
            .amount("100000")
            .pay_to("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM")
            .description("echo")
            .build()
            .unwrap();
        let validated = ValidatedPayment {
            payload: PaymentPayload {
                x402_version: 2,
                scheme: "exact".to_string(),
                network: "stacks:2147483648".to_string(),
                asset: "STX".to_string(),
                pay_to: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
                amount: "120000".to_string(),
                nonce: "n".to_string(),
                signature: "s".to_string(),
                resource: "r".to_string(),
                memo: None,
            },
            raw_header: "ignored".to_string(),
        };
        let receipt = mock_receipt(&policy, &validated);
        assert!(receipt.settled);
        assert_eq!(receipt.amount, "120000");
        assert_eq!(receipt.network, "stacks:2147483648");
        assert!(receipt.tx_hash.is_some());
        assert!(receipt.timestamp > 0);
    }
}
