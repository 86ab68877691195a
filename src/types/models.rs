use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of an e-mailed password-reset code.
pub const RESET_CODE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// One outstanding refresh token. Only the SHA-256 of the token string is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    #[serde(skip)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCode {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetCode {
    #[must_use]
    pub fn issue(email: &str, code: String, now: DateTime<Utc>) -> Self {
        Self {
            email: email.to_string(),
            code,
            expires_at: now + Duration::minutes(RESET_CODE_TTL_MINUTES),
        }
    }

    /// A code matches only by exact string equality and only until `expires_at` inclusive.
    #[must_use]
    pub fn is_valid_at(&self, code: &str, now: DateTime<Utc>) -> bool {
        self.code == code && now <= self.expires_at
    }
}
