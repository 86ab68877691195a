mod delivery;
mod helpers;
mod middleware;
mod password;
mod token;

pub use delivery::{PLATFORM_HEADER, REFRESH_COOKIE, TokenDelivery};
pub use helpers::{extract_bearer_token, generate_reset_code, hash_refresh_token};
pub use middleware::{AuthError, RequireAuth};
pub use password::PasswordManager;
pub use token::{
    ACCESS_TOKEN_TTL_SECS, Claims, REFRESH_TOKEN_TTL_SECS, TokenManager, TokenPair,
};
