use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};
use chrono::Utc;

use crate::auth::generate_reset_code;
use crate::server::AppState;
use crate::server::dto::ResetCodeRequest;
use crate::server::response::{ApiError, ApiJson, MessageResponse, StoreResultExt};
use crate::server::validation::{validate_email, validate_password};
use crate::types::ResetCode;

const INVALID_CODE: &str = "Invalid or expired code";

/// Checks the presented code against the live one for `email`. Does not consume it.
fn verify_code(state: &AppState, email: &str, code: Option<&str>) -> Result<(), ApiError> {
    let code = code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Code is required"))?;

    let stored = state
        .store
        .get_reset_code(email)
        .api_err("Failed to look up reset code")?;

    match stored {
        Some(stored) if stored.is_valid_at(code, Utc::now()) => Ok(()),
        _ => Err(ApiError::bad_request(INVALID_CODE)),
    }
}

pub async fn send_reset_code(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetCodeRequest>,
) -> impl IntoResponse {
    let email = validate_email(req.email.as_deref())?;

    let user = state
        .store
        .get_user_by_email(email)
        .api_err("Failed to look up user")?;
    if user.is_none() {
        return Err(ApiError::conflict("No account found with that email"));
    }

    let reset = ResetCode::issue(email, generate_reset_code(), Utc::now());
    state
        .store
        .replace_reset_code(&reset)
        .api_err("Failed to store reset code")?;

    state
        .mail
        .send_reset_code(email, &reset.code, reset.expires_at)
        .await
        .api_err("Failed to send reset code")?;

    Ok::<_, ApiError>(MessageResponse::new("Reset code sent"))
}

pub async fn check_reset_code(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetCodeRequest>,
) -> impl IntoResponse {
    let email = validate_email(req.email.as_deref())?;
    verify_code(&state, email, req.code.as_deref())?;

    Ok::<_, ApiError>(MessageResponse::new("Code verified"))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetCodeRequest>,
) -> impl IntoResponse {
    let email = validate_email(req.email.as_deref())?;
    verify_code(&state, email, req.code.as_deref())?;
    let password = validate_password(req.password.as_deref(), "Password")?;

    let user = state
        .store
        .get_user_by_email(email)
        .api_err("Failed to look up user")?
        .ok_or_else(|| ApiError::bad_request(INVALID_CODE))?;

    let password_hash = state
        .passwords
        .hash(password)
        .api_err("Failed to hash password")?;

    state
        .store
        .update_user_password(&user.id, &password_hash)
        .api_err("Failed to update password")?;

    state
        .store
        .delete_reset_code(email)
        .api_err("Failed to consume reset code")?;

    tracing::info!(user_id = %user.id, "Password reset");

    Ok::<_, ApiError>(MessageResponse::new("Password reset successfully"))
}
