use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::auth::auth_router;
use super::study_plans::study_plan_router;
use super::uploads::upload_router;
use crate::auth::{PLATFORM_HEADER, PasswordManager, TokenManager};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::jobs::{Forwarder, JobStore, MemoryJobStore};
use crate::mail::MailManager;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jobs: Arc<dyn JobStore>,
    pub tokens: TokenManager,
    pub passwords: PasswordManager,
    pub mail: MailManager,
    pub forwarder: Arc<Forwarder>,
    /// Adds `Secure` to the refresh cookie.
    pub secure_cookies: bool,
    pub allowed_origins: Vec<HeaderValue>,
}

impl AppState {
    /// Builds the shared state with an in-memory job table.
    pub fn new(store: Arc<dyn Store>, config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let allowed_origins = config
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .map_err(|_| Error::Config(format!("invalid allowed origin '{origin}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            store,
            jobs: Arc::new(MemoryJobStore::new()),
            tokens: TokenManager::new(&config.access_secret, &config.refresh_secret),
            passwords: PasswordManager::new(),
            mail: MailManager::new(config.mail_relay_url.clone())?,
            forwarder: Arc::new(Forwarder::new(
                config.webhook.clone(),
                config.simulated_delay,
            )?),
            secure_cookies: config.secure_cookies,
            allowed_origins,
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

/// Credentialed CORS for the web client, so the refresh cookie survives cross-origin calls.
fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins.iter().cloned()))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(PLATFORM_HEADER),
        ])
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/auth", auth_router())
        .nest("/uploads", upload_router())
        .nest("/studyplans", study_plan_router());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(middleware::from_fn(log_request))
        .layer(cors_layer(&state.allowed_origins))
        .with_state(state)
}
