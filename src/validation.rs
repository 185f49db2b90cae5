use std::fmt;

use bigdecimal::BigDecimal;

pub const WALLET_ADDRESS_MIN_LEN: usize = 20;
pub const WALLET_ADDRESS_MAX_LEN: usize = 128;
pub const BANK_ACCOUNT_MAX_LEN: usize = 34;
pub const ROUTING_NUMBER_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Strips control characters and collapses whitespace runs. Whitespace
/// control characters (tab, newline) count as separators, not as characters
/// to drop, so adjacent tokens are never glued together.
pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control() || ch.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_wallet_address(address: &str) -> ValidationResult {
    let address = sanitize_string(address);
    validate_required("wallet_address", &address)?;

    if address.len() < WALLET_ADDRESS_MIN_LEN || address.len() > WALLET_ADDRESS_MAX_LEN {
        return Err(ValidationError::new(
            "wallet_address",
            format!(
                "must be between {} and {} characters",
                WALLET_ADDRESS_MIN_LEN, WALLET_ADDRESS_MAX_LEN
            ),
        ));
    }

    if !address.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "wallet_address",
            "must contain only letters and digits",
        ));
    }

    Ok(())
}

pub fn validate_bank_details(account_number: &str, routing_number: &str) -> ValidationResult {
    let account_number = sanitize_string(account_number);
    validate_required("account_number", &account_number)?;

    if account_number.len() > BANK_ACCOUNT_MAX_LEN
        || !account_number.chars().all(|ch| ch.is_ascii_alphanumeric())
    {
        return Err(ValidationError::new(
            "account_number",
            format!("must be alphanumeric, at most {} characters", BANK_ACCOUNT_MAX_LEN),
        ));
    }

    let routing_number = sanitize_string(routing_number);
    if routing_number.len() != ROUTING_NUMBER_LEN
        || !routing_number.chars().all(|ch| ch.is_ascii_digit())
    {
        return Err(ValidationError::new(
            "routing_number",
            format!("must be exactly {} digits", ROUTING_NUMBER_LEN),
        ));
    }

    Ok(())
}

pub fn validate_non_negative_amount(amount: &BigDecimal) -> ValidationResult {
    if amount < &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must not be negative"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn valid_wallet() -> String {
        "9f8e7d6c5b4a3f2e1d0c9b8a7f6e5d4c".to_string()
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("hello\nworld"), "hello world");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
        assert_eq!(sanitize_string(" \n "), "");
    }

    #[test]
    fn wallet_address_with_embedded_whitespace_is_rejected() {
        // A tab inside the address must not be silently dropped; that would
        // turn two tokens into a different, valid-looking address.
        let split = format!("{}\t{}", "a".repeat(12), "b".repeat(12));
        assert!(validate_wallet_address(&split).is_err());
    }

    #[test]
    fn validates_wallet_address() {
        assert!(validate_wallet_address(&valid_wallet()).is_ok());
        assert!(validate_wallet_address(&format!(" {} ", valid_wallet())).is_ok());
        assert!(validate_wallet_address("short").is_err());
        assert!(validate_wallet_address(&"a".repeat(129)).is_err());
        assert!(validate_wallet_address("9f8e7d6c5b4a3f2e1d0c-b8a").is_err());
        assert!(validate_wallet_address("").is_err());
    }

    #[test]
    fn validates_bank_details() {
        assert!(validate_bank_details("000123456789", "021000021").is_ok());
        assert!(validate_bank_details("", "021000021").is_err());
        assert!(validate_bank_details("000123456789", "12345").is_err());
        assert!(validate_bank_details("000123456789", "02100002a").is_err());
        assert!(validate_bank_details(&"1".repeat(35), "021000021").is_err());
    }

    #[test]
    fn validates_non_negative_amount() {
        assert!(validate_non_negative_amount(&BigDecimal::from(0)).is_ok());
        assert!(validate_non_negative_amount(&BigDecimal::from_str("10.25").unwrap()).is_ok());
        assert!(validate_non_negative_amount(&BigDecimal::from(-1)).is_err());
    }
}
