//! Arbitrary-precision amount handling.
//!
//! Amounts travel as decimal integer strings and may exceed 2^53, so they
//! are never parsed into floating point.

use num_bigint::BigUint;

use crate::error::X402Error;

/// Parse a decimal integer string into a [`BigUint`].
///
/// Rejects empty strings, signs, separators, and any non-digit character.
pub fn parse_amount(s: &str) -> Result<BigUint, X402Error> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(X402Error::InvalidAmount(format!(
            "'{s}' is not a decimal integer"
        )));
    }
    BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| X402Error::InvalidAmount(format!("'{s}' is not a decimal integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        assert_eq!(parse_amount("100000").unwrap(), BigUint::from(100_000u32));
        assert_eq!(parse_amount("0").unwrap(), BigUint::from(0u32));
    }

    #[test]
    fn test_parse_beyond_u64() {
        // 2^64 = 18446744073709551616; one above u64::MAX.
        let big = parse_amount("18446744073709551616").unwrap();
        assert!(big > BigUint::from(u64::MAX));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("+5").is_err());
        assert!(parse_amount("1.5").is_err());
        assert!(parse_amount("1e9").is_err());
        assert!(parse_amount("1_000").is_err());
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_comparison_has_no_precision_loss() {
        // Adjacent values near 2^63 that an f64 round-trip would conflate.
        let a = parse_amount("9223372036854775807").unwrap();
        let b = parse_amount("9223372036854775806").unwrap();
        assert!(a > b);
    }
}
