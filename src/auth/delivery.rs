use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::{HeaderMap, request::Parts};
use serde::Deserialize;

use super::REFRESH_TOKEN_TTL_SECS;

/// Header the client sets to `web` when it wants the refresh token in a cookie.
pub const PLATFORM_HEADER: &str = "x-client-platform";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// How refresh tokens travel between client and server. Chosen once per request from
/// the platform header and used for login, refresh, and logout alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDelivery {
    /// Web clients: refresh token lives in an HTTP-only, same-site-strict cookie.
    Cookie,
    /// Native clients: both tokens are returned in the JSON body.
    Body,
}

#[derive(Deserialize)]
struct RefreshTokenBody {
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

impl TokenDelivery {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let is_web = headers
            .get(PLATFORM_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "web");

        if is_web {
            TokenDelivery::Cookie
        } else {
            TokenDelivery::Body
        }
    }

    /// The refresh token the client presented on this channel, if any.
    #[must_use]
    pub fn presented_token(self, headers: &HeaderMap, body: &[u8]) -> Option<String> {
        let token = match self {
            TokenDelivery::Cookie => cookie_value(headers, REFRESH_COOKIE),
            TokenDelivery::Body => serde_json::from_slice::<RefreshTokenBody>(body)
                .ok()
                .and_then(|b| b.refresh_token),
        };
        token.filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn set_cookie(token: &str, secure: bool) -> String {
        let mut cookie = format!(
            "{REFRESH_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={REFRESH_TOKEN_TTL_SECS}"
        );
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    #[must_use]
    pub fn clear_cookie(secure: bool) -> String {
        let mut cookie = format!("{REFRESH_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0");
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

impl<S: Send + Sync> FromRequestParts<S> for TokenDelivery {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(TokenDelivery::from_headers(&parts.headers))
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}
