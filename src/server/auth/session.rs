use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{RequireAuth, TokenDelivery, TokenPair, hash_refresh_token};
use crate::server::AppState;
use crate::server::dto::{CredentialsRequest, LoginResponse, RefreshResponse, UserResponse};
use crate::server::response::{ApiError, ApiJson, StoreOptionExt, StoreResultExt};
use crate::types::RefreshToken;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

fn refresh_record(user_id: &str, pair: &TokenPair) -> RefreshToken {
    RefreshToken {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        token_hash: hash_refresh_token(&pair.refresh_token),
        created_at: Utc::now(),
        expires_at: pair.refresh_expires_at,
    }
}

/// The refresh token to put in the JSON body. Cookie clients never see it there.
fn body_token(delivery: TokenDelivery, pair: &TokenPair) -> Option<String> {
    match delivery {
        TokenDelivery::Cookie => None,
        TokenDelivery::Body => Some(pair.refresh_token.clone()),
    }
}

fn deliver<T: Serialize>(
    delivery: TokenDelivery,
    state: &AppState,
    pair: &TokenPair,
    body: T,
) -> Response {
    match delivery {
        TokenDelivery::Cookie => {
            let cookie = TokenDelivery::set_cookie(&pair.refresh_token, state.secure_cookies);
            (AppendHeaders([(SET_COOKIE, cookie)]), Json(body)).into_response()
        }
        TokenDelivery::Body => Json(body).into_response(),
    }
}

pub async fn login(
    delivery: TokenDelivery,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (req.email.as_deref(), req.password.as_deref()) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let user = state
        .store
        .get_user_by_email(email.trim())
        .api_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let matches = state
        .passwords
        .verify(password, &user.password_hash)
        .api_err("Failed to verify password")?;
    if !matches {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let pair = state
        .tokens
        .issue_pair(&user.id)
        .api_err("Failed to issue tokens")?;

    state
        .store
        .create_refresh_token(&refresh_record(&user.id, &pair))
        .api_err("Failed to store refresh token")?;

    let purged = state
        .store
        .delete_expired_refresh_tokens(Utc::now())
        .api_err("Failed to purge expired refresh tokens")?;
    if purged > 0 {
        tracing::debug!(purged, "Purged expired refresh tokens");
    }

    tracing::info!(user_id = %user.id, ?delivery, "User logged in");

    let body = LoginResponse {
        access_token: pair.access_token.clone(),
        refresh_token: body_token(delivery, &pair),
        user,
    };
    Ok(deliver(delivery, &state, &pair, body))
}

pub async fn refresh(
    delivery: TokenDelivery,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let presented = delivery
        .presented_token(&headers, &body)
        .ok_or_else(|| ApiError::unauthorized("No refresh token provided"))?;
    let old_hash = hash_refresh_token(&presented);

    let stored = state
        .store
        .get_refresh_token(&old_hash)
        .api_err("Failed to look up refresh token")?
        .ok_or_else(|| {
            tracing::warn!("Refresh rejected: token not on record");
            ApiError::forbidden(INVALID_REFRESH_TOKEN)
        })?;

    let claims = match state.tokens.verify_refresh(&presented) {
        Ok(claims) if claims.sub == stored.user_id => claims,
        Ok(_) => {
            tracing::warn!(user_id = %stored.user_id, "Refresh rejected: subject mismatch");
            return Err(ApiError::forbidden(INVALID_REFRESH_TOKEN));
        }
        Err(e) => {
            tracing::debug!(user_id = %stored.user_id, "Refresh rejected: {e}");
            if let Err(e) = state.store.delete_refresh_token(&old_hash) {
                tracing::error!("Failed to discard unusable refresh token: {e}");
            }
            return Err(ApiError::forbidden(INVALID_REFRESH_TOKEN));
        }
    };

    let pair = state
        .tokens
        .issue_pair(&claims.sub)
        .api_err("Failed to issue tokens")?;

    let rotated = state
        .store
        .rotate_refresh_token(&old_hash, &refresh_record(&claims.sub, &pair))
        .api_err("Failed to rotate refresh token")?;
    if !rotated {
        tracing::warn!(user_id = %claims.sub, "Refresh rejected: token already redeemed");
        return Err(ApiError::forbidden(INVALID_REFRESH_TOKEN));
    }

    let body = RefreshResponse {
        access_token: pair.access_token.clone(),
        refresh_token: body_token(delivery, &pair),
    };
    Ok(deliver(delivery, &state, &pair, body))
}

pub async fn userdata(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .store
        .get_user(&auth.user_id)
        .api_err("Failed to load user")?
        .or_not_found("User not found")?;

    Ok(Json(UserResponse { user }))
}

/// 204 whether or not the presented token was on record. A failed delete is a 500,
/// since the session would otherwise outlive the logout.
pub async fn logout(
    delivery: TokenDelivery,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if let Some(token) = delivery.presented_token(&headers, &body) {
        let deleted = state
            .store
            .delete_refresh_token(&hash_refresh_token(&token))
            .api_err("Failed to end session")?;
        if deleted {
            tracing::info!("Session ended");
        } else {
            tracing::debug!("Logout with unknown refresh token");
        }
    }

    Ok(match delivery {
        TokenDelivery::Cookie => (
            StatusCode::NO_CONTENT,
            AppendHeaders([(SET_COOKIE, TokenDelivery::clear_cookie(state.secure_cookies))]),
        )
            .into_response(),
        TokenDelivery::Body => StatusCode::NO_CONTENT.into_response(),
    })
}
