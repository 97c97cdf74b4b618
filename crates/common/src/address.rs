//! Address canonicalization.
//!
//! Addresses are case-insensitive on chain (EIP-55 only adds a checksum via
//! casing), so every internal lookup keys on the lowercase `0x`-prefixed form.

use std::str::FromStr;

use alloy::primitives::Address;

use crate::error::AppError;

/// Validate an address and return its canonical lowercase form.
///
/// Rejects anything that is not `0x` followed by 40 hex digits.
pub fn canonicalize(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with("0x") || trimmed.starts_with("0X")) {
        return Err(AppError::Validation(format!(
            "Address must start with 0x: {trimmed}"
        )));
    }

    let address = Address::from_str(&trimmed[2..])
        .map_err(|e| AppError::Validation(format!("Invalid address {trimmed}: {e}")))?;

    Ok(format!("{:#x}", address))
}

/// Lowercase an address already known to be well-formed (e.g. from upstream data).
pub fn normalize(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_lowercases_checksummed_address() {
        let canonical = canonicalize("0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B").unwrap();
        assert_eq!(canonical, "0xab5801a7d398351b8be11c439e05c5b3259aec9b");
    }

    #[test]
    fn test_canonicalize_trims_whitespace() {
        let canonical = canonicalize("  0x0000000000000000000000000000000000001234 ").unwrap();
        assert_eq!(canonical, "0x0000000000000000000000000000000000001234");
    }

    #[test]
    fn test_canonicalize_rejects_missing_prefix() {
        let err = canonicalize("ab5801a7d398351b8be11c439e05c5b3259aec9b").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_canonicalize_rejects_wrong_length() {
        assert!(canonicalize("0x1234").is_err());
        assert!(canonicalize("0xab5801a7d398351b8be11c439e05c5b3259aec9b00").is_err());
    }

    #[test]
    fn test_canonicalize_rejects_non_hex() {
        assert!(canonicalize("0xzz5801a7d398351b8be11c439e05c5b3259aec9b").is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(" 0xABCdef "), "0xabcdef");
    }
}
