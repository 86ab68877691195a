use rand::Rng;
use sha2::{Digest, Sha256};

/// Extracts the token from a `Bearer <token>` authorization header.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Refresh tokens are stored by digest only; a leaked table cannot be replayed.
#[must_use]
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Six-digit numeric reset code, uniform over 000000..=999999.
#[must_use]
pub fn generate_reset_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}
