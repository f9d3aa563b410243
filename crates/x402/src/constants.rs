//! Protocol constants shared by the gateway, clients, and tests.

/// x402 protocol version carried in every payload and 402 body.
pub const X402_VERSION: u32 = 2;

/// Header the gateway sets on a 402 response: base64(JSON PaymentRequirements).
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";

/// Header a client sends with a signed payment: base64(JSON PaymentPayload).
pub const PAYMENT_SIGNATURE_HEADER: &str = "payment-signature";

/// Header the gateway sets on a paid response: base64(JSON PaymentReceipt).
pub const PAYMENT_RESPONSE_HEADER: &str = "payment-response";

/// Client-supplied replay-safe retry token.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// CAIP-2 chain identifier for Stacks mainnet.
pub const DEFAULT_NETWORK: &str = "stacks:2147483648";

/// Default settlement scheme. Opaque to the gateway beyond equality checks.
pub const DEFAULT_SCHEME: &str = "exact";

/// Default asset symbol.
pub const DEFAULT_ASSET: &str = "STX";

/// Public facilitator used when FACILITATOR_URL is not set.
pub const DEFAULT_FACILITATOR_URL: &str = "https://facilitator.stacksx402.com";

/// Normalize a CAIP-2 chain identifier to its short namespace token.
///
/// Discovery documents list `"stacks"` where 402 offers carry the full
/// `"stacks:2147483648"` identifier.
pub fn short_network_token(network: &str) -> &str {
    match network.split_once(':') {
        Some((namespace, _)) => namespace,
        None => network,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_network_token_strips_reference() {
        assert_eq!(short_network_token("stacks:2147483648"), "stacks");
        assert_eq!(short_network_token("eip155:8453"), "eip155");
    }

    #[test]
    fn test_short_network_token_passthrough() {
        assert_eq!(short_network_token("stacks"), "stacks");
    }
}
