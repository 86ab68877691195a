use std::sync::LazyLock;

use regex_lite::Regex;

use crate::server::response::ApiError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| panic!("invalid email regex: {e}"))
});

/// Trims and checks `local@domain.tld`. Returns the trimmed address.
pub fn validate_email(email: Option<&str>) -> Result<&str, ApiError> {
    let email = email.map(str::trim).unwrap_or_default();
    if email.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    Ok(email)
}

pub fn validate_password<'a>(password: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    match password {
        Some(p) if !p.trim().is_empty() => Ok(p),
        _ => Err(ApiError::bad_request(format!("{field} is required"))),
    }
}
