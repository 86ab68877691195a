use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireAuth;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{ChangePasswordRequest, CredentialsRequest, SignupResponse};
use crate::server::response::{
    ApiError, ApiJson, MessageResponse, StoreOptionExt, StoreResultExt,
};
use crate::server::validation::{validate_email, validate_password};
use crate::types::User;

const EMAIL_TAKEN: &str = "Email already taken";

pub async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> impl IntoResponse {
    let email = validate_email(req.email.as_deref())?;

    let existing = state
        .store
        .get_user_by_email(email)
        .api_err("Failed to check email")?;
    if existing.is_some() {
        return Err(ApiError::conflict(EMAIL_TAKEN));
    }

    let password = validate_password(req.password.as_deref(), "Password")?;
    let password_hash = state
        .passwords
        .hash(password)
        .api_err("Failed to hash password")?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash,
        created_at: now,
        updated_at: now,
    };

    match state.store.create_user(&user) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => return Err(ApiError::conflict(EMAIL_TAKEN)),
        Err(e) => {
            tracing::error!("Failed to create user: {e}");
            return Err(ApiError::internal("Failed to create user"));
        }
    }

    tracing::info!(user_id = %user.id, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created",
            user,
        }),
    ))
}

pub async fn change_password(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user(&auth.user_id)
        .api_err("Failed to load user")?
        .or_not_found("User not found")?;

    let current = req.current_password.as_deref().unwrap_or_default();
    let matches = state
        .passwords
        .verify(current, &user.password_hash)
        .api_err("Failed to verify password")?;
    if !matches {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let new_password = validate_password(req.new_password.as_deref(), "New password")?;
    let password_hash = state
        .passwords
        .hash(new_password)
        .api_err("Failed to hash password")?;

    state
        .store
        .update_user_password(&user.id, &password_hash)
        .api_err("Failed to update password")?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok::<_, ApiError>(MessageResponse::new("Password changed successfully"))
}
