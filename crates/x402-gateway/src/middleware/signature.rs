//! Structural and policy-level validation of the `payment-signature`
//! header. Fails fast so ill-formed requests never reach the facilitator;
//! this stage performs no network I/O.

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage};

use x402::constants::{PAYMENT_SIGNATURE_HEADER, X402_VERSION};
use x402::{decode_header, parse_amount, PaymentPayload};

use crate::error::GatewayError;
use crate::policy::RoutePolicy;
use crate::state::AppState;

use super::{reject, ValidatedPayment};

pub async fn validate_signature(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    // No header: the payment gate issues the 402.
    let Some(header) = req.headers().get(PAYMENT_SIGNATURE_HEADER) else {
        return next.call(req).await;
    };
    let Ok(raw) = header.to_str().map(str::to_owned) else {
        return reject(
            req,
            GatewayError::InvalidPayment(
                "payment-signature header is not valid base64-encoded JSON".to_string(),
            ),
        );
    };

    let payload: PaymentPayload = match decode_header(&raw) {
        Ok(p) => p,
        Err(_) => {
            return reject(
                req,
                GatewayError::InvalidPayment(
                    "payment-signature header is not valid base64-encoded JSON".to_string(),
                ),
            );
        }
    };

    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return reject(
            req,
            GatewayError::InvalidPayment(format!(
                "missing required fields: {}",
                missing.join(", ")
            )),
        );
    }

    if payload.x402_version != X402_VERSION {
        return reject(
            req,
            GatewayError::InvalidPayment(format!(
                "unsupported x402Version: {}",
                payload.x402_version
            )),
        );
    }

    // Cross-reference against the route's offer when one exists. Routes
    // without a policy still get structural validation above.
    let policy_check = req
        .app_data::<web::Data<AppState>>()
        .and_then(|state| state.policies.get(req.method().as_str(), req.path()))
        .map(|policy| check_against_policy(&payload, policy));
    if let Some(Err(err)) = policy_check {
        return reject(req, err);
    }

    req.extensions_mut().insert(ValidatedPayment {
        payload,
        raw_header: raw,
    });
    next.call(req).await
}

fn check_against_policy(
    payload: &PaymentPayload,
    policy: &RoutePolicy,
) -> Result<(), GatewayError> {
    let mut mismatches = Vec::new();
    if payload.scheme != policy.scheme {
        mismatches.push(format!(
            "scheme: expected '{}', got '{}'",
            policy.scheme, payload.scheme
        ));
    }
    if payload.network != policy.network {
        mismatches.push(format!(
            "network: expected '{}', got '{}'",
            policy.network, payload.network
        ));
    }
    if payload.asset != policy.asset {
        mismatches.push(format!(
            "asset: expected '{}', got '{}'",
            policy.asset, payload.asset
        ));
    }
    if payload.pay_to != policy.pay_to {
        mismatches.push(format!(
            "payTo: expected '{}', got '{}'",
            policy.pay_to, payload.pay_to
        ));
    }
    if !mismatches.is_empty() {
        return Err(GatewayError::OfferMismatch(mismatches.join("; ")));
    }

    let provided = parse_amount(&payload.amount)
        .map_err(|e| GatewayError::InvalidPayment(e.to_string()))?;
    let required = parse_amount(&policy.amount)
        .map_err(|e| GatewayError::Internal(format!("policy amount unparseable: {e}")))?;
    // Overpayment is permitted, never refunded.
    if provided < required {
        return Err(GatewayError::InsufficientAmount {
            required: policy.amount.clone(),
            provided: payload.amount.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RoutePolicy {
        RoutePolicy::builder("/v1/premium/echo")
            .method("GET")
            .network("stacks:2147483648")
            .asset("STX")
            .amount("100000")
            .pay_to("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM")
            .description("echo")
            .build()
            .unwrap()
    }

    fn payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: 2,
            scheme: "exact".to_string(),
            network: "stacks:2147483648".to_string(),
            asset: "STX".to_string(),
            pay_to: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
            amount: "100000".to_string(),
            nonce: "n-1".to_string(),
            signature: "sig".to_string(),
            resource: "https://gw.example/v1/premium/echo".to_string(),
            memo: None,
        }
    }

    #[test]
    fn test_matching_payload_passes() {
        assert!(check_against_policy(&payload(), &policy()).is_ok());
    }

    #[test]
    fn test_all_mismatches_collected() {
        let mut p = payload();
        p.scheme = "lightning".to_string();
        p.asset = "sBTC".to_string();
        let err = check_against_policy(&p, &policy()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("scheme"));
        assert!(msg.contains("asset"));
        assert!(!msg.contains("network:"));
    }

    #[test]
    fn test_underpayment_rejected_overpayment_accepted() {
        let mut p = payload();
        p.amount = "99999".to_string();
        assert!(matches!(
            check_against_policy(&p, &policy()).unwrap_err(),
            GatewayError::InsufficientAmount { .. }
        ));
        p.amount = "100001".to_string();
        assert!(check_against_policy(&p, &policy()).is_ok());
        p.amount = "100000".to_string();
        assert!(check_against_policy(&p, &policy()).is_ok());
    }

    #[test]
    fn test_amount_beyond_u64_compares_exactly() {
        let mut wide = policy();
        wide.amount = "18446744073709551616".to_string(); // 2^64
        let mut p = payload();
        p.amount = "18446744073709551615".to_string(); // 2^64 - 1
        assert!(matches!(
            check_against_policy(&p, &wide).unwrap_err(),
            GatewayError::InsufficientAmount { .. }
        ));
        p.amount = "18446744073709551616".to_string();
        assert!(check_against_policy(&p, &wide).is_ok());
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let mut p = payload();
        p.amount = "1e5".to_string();
        assert!(matches!(
            check_against_policy(&p, &policy()).unwrap_err(),
            GatewayError::InvalidPayment(_)
        ));
    }
}
