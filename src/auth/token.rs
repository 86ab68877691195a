use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Random per-token ID, so two tokens minted in the same second still differ.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

struct Signer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Signer {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    fn sign(&self, user_id: &str, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, expires_at))
    }
}

/// Mints and verifies HS256 tokens. Access and refresh tokens use independent secrets,
/// so neither kind can be forged from the other.
pub struct TokenManager {
    access: Signer,
    refresh: Signer,
    validation: Validation,
}

impl TokenManager {
    #[must_use]
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: Signer::new(access_secret, ACCESS_TOKEN_TTL_SECS),
            refresh: Signer::new(refresh_secret, REFRESH_TOKEN_TTL_SECS),
            validation,
        }
    }

    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair> {
        let now = Utc::now();
        let (access_token, _) = self.access.sign(user_id, now)?;
        let (refresh_token, refresh_expires_at) = self.refresh.sign(user_id, now)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_expires_at,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.refresh)
    }

    fn verify(&self, token: &str, signer: &Signer) -> Result<Claims> {
        decode::<Claims>(token, &signer.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::TokenExpired,
                _ => Error::Jwt(e),
            })
    }
}
