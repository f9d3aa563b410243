// Core types and helpers for the x402 v2 payment protocol.
pub mod amount;
pub mod cache;
pub mod constants;
pub mod error;
pub mod facilitator;
pub mod payment;
pub mod response;

// Re-exports
pub use amount::parse_amount;
pub use cache::TtlCache;
pub use constants::*;
pub use error::X402Error;
pub use facilitator::FacilitatorClient;
pub use payment::{
    decode_header, encode_header, PaymentAccept, PaymentPayload, PaymentReceipt,
    PaymentRequirements,
};
pub use response::{SettleResponse, VerifyResponse};
