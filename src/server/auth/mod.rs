mod account;
mod reset;
mod session;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        // Sessions
        .route("/login", post(session::login))
        .route("/refresh", post(session::refresh))
        .route("/logout", post(session::logout))
        .route("/userdata", get(session::userdata))
        // Accounts
        .route("/signup", post(account::signup))
        .route("/change-password", post(account::change_password))
        // Password reset
        .route("/send-reset-code", post(reset::send_reset_code))
        .route("/check-reset-code", post(reset::check_reset_code))
        .route("/reset-password", post(reset::reset_password))
}
