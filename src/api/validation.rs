//! Input validation for API and form requests.
//!
//! Each validator returns the message to show the user. Handlers gather them
//! with `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::RegisterRequest;
use crate::engine::units::Amount;

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 200;

lazy_static! {
    /// Loose email shape: something@domain.tld
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Validate a display name; `what` names the thing in the message
pub fn validate_name(name: &str, what: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("{} name is required", what));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "{} name is too long (max {} characters)",
            what, MAX_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_price(price: f64) -> Result<(), String> {
    if !price.is_finite() || price <= 0.0 {
        return Err("Price must be greater than zero".to_string());
    }
    Ok(())
}

/// Package prices may be zero (free samples) but not negative
pub fn validate_package_price(price: f64) -> Result<(), String> {
    if !price.is_finite() || price < 0.0 {
        return Err("Price cannot be negative".to_string());
    }
    Ok(())
}

pub fn validate_amount(amount: &Amount) -> Result<(), String> {
    if !amount.quantity.is_finite() || amount.quantity <= 0.0 {
        return Err("Amount must be greater than zero".to_string());
    }
    Ok(())
}

pub fn validate_proof(proof: Option<f64>) -> Result<(), String> {
    match proof {
        Some(p) if !p.is_finite() || !(0.0..=200.0).contains(&p) => {
            Err("Proof must be between 0 and 200".to_string())
        }
        _ => Ok(()),
    }
}

/// Registration checks in the order their messages are reported
pub fn validate_registration(req: &RegisterRequest) -> Result<(), String> {
    if req.name.trim().is_empty()
        || req.email.trim().is_empty()
        || req.password.is_empty()
        || req.confirm_password.is_empty()
    {
        return Err("All fields are required".to_string());
    }
    validate_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    if req.password != req.confirm_password {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::units::Unit;

    fn registration(name: &str, email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("owner@bar.com").is_ok());
        assert!(validate_email("  owner@bar.co.uk ").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("owner").is_err());
        assert!(validate_email("owner@bar").is_err());
        assert!(validate_email("own er@bar.com").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Negroni", "Recipe").is_ok());
        assert_eq!(validate_name("  ", "Recipe").unwrap_err(), "Recipe name is required");
        assert!(validate_name(&"x".repeat(201), "Menu").is_err());
    }

    #[test]
    fn test_validate_prices() {
        assert!(validate_price(12.5).is_ok());
        assert!(validate_price(0.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_package_price(0.0).is_ok());
        assert!(validate_package_price(-1.0).is_err());
    }

    #[test]
    fn test_validate_amount_and_proof() {
        assert!(validate_amount(&Amount::oz(1.5)).is_ok());
        assert!(validate_amount(&Amount::new(Unit::Ml, 0.0)).is_err());
        assert!(validate_proof(None).is_ok());
        assert!(validate_proof(Some(80.0)).is_ok());
        assert!(validate_proof(Some(250.0)).is_err());
    }

    #[test]
    fn test_validate_registration_messages() {
        assert_eq!(
            validate_registration(&registration("", "a@b.co", "password1", "password1")).unwrap_err(),
            "All fields are required"
        );
        assert_eq!(
            validate_registration(&registration("Al", "a@b.co", "short", "short")).unwrap_err(),
            "Password must be at least 8 characters long"
        );
        assert_eq!(
            validate_registration(&registration("Al", "a@b.co", "password1", "password2")).unwrap_err(),
            "Passwords do not match"
        );
        assert_eq!(
            validate_registration(&registration("Al", "nope", "password1", "password1")).unwrap_err(),
            "Invalid email format"
        );
        assert!(validate_registration(&registration("Al", "a@b.co", "password1", "password1")).is_ok());
    }
}
