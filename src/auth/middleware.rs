use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::extract_bearer_token;
use crate::error::Error;
use crate::server::AppState;

/// Extractor that requires a valid access token. Holds the caller's user ID.
///
/// The user record itself is not loaded here; handlers that need it fetch it and decide
/// how a vanished account is reported.
pub struct RequireAuth {
    pub user_id: String,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuth => "No token provided",
            AuthError::InvalidScheme => "Invalid authorization scheme",
            AuthError::InvalidToken => "Invalid token",
            AuthError::TokenExpired => "Token expired",
        };

        let body = json!({ "error": message });

        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        response.headers_mut().insert(
            WWW_AUTHENTICATE,
            axum::http::HeaderValue::from_static("Bearer realm=\"studyhub\""),
        );

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingAuth)?;

        let token = extract_bearer_token(header).ok_or(AuthError::InvalidScheme)?;

        let claims = state.tokens.verify_access(token).map_err(|e| {
            tracing::debug!("Rejected access token: {e}");
            match e {
                Error::TokenExpired => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        Ok(RequireAuth {
            user_id: claims.sub,
        })
    }
}
