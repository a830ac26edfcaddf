//! Input validation for API requests.
//!
//! Validators return `Err(message)` so handlers can collect several of them
//! with `ValidationErrorBuilder::check` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email shape check: local@domain.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();
}

/// Minimum password length for new accounts
pub const MIN_PASSWORD_LEN: usize = 6;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PRODUCT_NAME_LEN: usize = 200;
pub const MAX_SKU_LEN: usize = 64;
pub const MAX_STATUS_LEN: usize = 32;
pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_NOTES_LEN: usize = 1000;
pub const MAX_ITEM_NOTES_LEN: usize = 500;
pub const MAX_INVOICE_NUMBER_LEN: usize = 60;

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

/// Validate a required text field: non-blank and at most `max` characters
pub fn validate_text(value: &str, field_name: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if value.chars().count() > max {
        return Err(format!(
            "{} is too long (max {} characters)",
            field_name, max
        ));
    }

    Ok(())
}

/// Validate an optional text field (length only)
pub fn validate_optional_text(
    value: Option<&str>,
    field_name: &str,
    max: usize,
) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => Err(format!(
            "{} is too long (max {} characters)",
            field_name, max
        )),
        _ => Ok(()),
    }
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Money amounts: finite and not negative
pub fn validate_amount(value: f64, field_name: &str) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must be a non-negative number", field_name));
    }
    Ok(())
}

/// Stock levels may be zero
pub fn validate_stock_quantity(quantity: i64) -> Result<(), String> {
    if quantity < 0 {
        return Err("Quantity must be a non-negative integer".to_string());
    }
    Ok(())
}

/// Ordered or invoiced quantities must be at least one
pub fn validate_positive_quantity(quantity: i64) -> Result<(), String> {
    if quantity <= 0 {
        return Err("Quantity must be a positive integer".to_string());
    }
    Ok(())
}

/// Validate an RFC 3339 timestamp
pub fn validate_timestamp(value: &str, field_name: &str) -> Result<(), String> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| format!("{} must be an RFC 3339 timestamp", field_name))
}
