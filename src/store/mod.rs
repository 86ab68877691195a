mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    /// Fails with `Error::AlreadyExists` when the email is taken.
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn update_user_password(&self, id: &str, password_hash: &str) -> Result<()>;

    // Refresh token operations
    fn create_refresh_token(&self, token: &RefreshToken) -> Result<()>;
    fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>>;
    fn delete_refresh_token(&self, token_hash: &str) -> Result<bool>;
    /// Deletes `old_hash` and inserts `new` atomically. Returns false without inserting
    /// when `old_hash` no longer exists, so a token can be redeemed at most once.
    fn rotate_refresh_token(&self, old_hash: &str, new: &RefreshToken) -> Result<bool>;
    /// Purges tokens that expired before `now`. Returns how many were removed.
    fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<usize>;

    // Reset code operations
    /// Stores `code`, replacing any earlier code for the same email.
    fn replace_reset_code(&self, code: &ResetCode) -> Result<()>;
    fn get_reset_code(&self, email: &str) -> Result<Option<ResetCode>>;
    fn delete_reset_code(&self, email: &str) -> Result<bool>;

    // Study plan operations
    fn create_study_plan(&self, plan: &StudyPlan) -> Result<()>;
    fn get_study_plan(&self, id: &str) -> Result<Option<StudyPlan>>;
    fn latest_study_plan(&self, user_id: &str) -> Result<Option<StudyPlan>>;
    fn list_study_plans(&self, user_id: &str, limit: i64) -> Result<Vec<StudyPlan>>;

    /// Flushes pending writes. Called once on shutdown.
    fn close(&self) -> Result<()>;
}
