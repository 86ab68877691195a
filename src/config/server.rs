use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default delay before a simulated job completes when no workflow webhook is configured.
const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_secs(2);

/// Expo web dev server.
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:8081";

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Workflow endpoint that receives uploaded files.
    pub url: String,
    /// Await the workflow's response and complete the job from it, instead of
    /// waiting for the workflow to call back on `/api/uploads/webhook`.
    pub sync: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// HMAC secret for access tokens.
    pub access_secret: String,
    /// HMAC secret for refresh tokens. Must differ from `access_secret`.
    pub refresh_secret: String,
    pub webhook: Option<WebhookConfig>,
    /// Mail relay receiving password-reset events. When unset, codes are only logged.
    pub mail_relay_url: Option<String>,
    /// Marks the refresh cookie `Secure`. Enable when served over HTTPS.
    pub secure_cookies: bool,
    /// Jobs still processing after this long are failed by the sweeper.
    pub job_timeout: Option<Duration>,
    pub simulated_delay: Duration,
    /// Browser origins allowed to make credentialed cross-origin requests.
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("studyhub.db")
    }

    pub fn validate(&self) -> Result<()> {
        if self.access_secret.trim().is_empty() || self.refresh_secret.trim().is_empty() {
            return Err(Error::Config(
                "access and refresh token secrets are required".to_string(),
            ));
        }
        if let Some(origin) = self.allowed_origins.iter().find(|o| o.trim() == "*") {
            return Err(Error::Config(format!(
                "allowed origin '{origin}' is not valid with credentialed requests"
            )));
        }
        if self.access_secret == self.refresh_secret {
            return Err(Error::Config(
                "access and refresh token secrets must differ".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            access_secret: String::new(),
            refresh_secret: String::new(),
            webhook: None,
            mail_relay_url: None,
            secure_cookies: false,
            job_timeout: None,
            simulated_delay: DEFAULT_SIMULATED_DELAY,
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        }
    }
}
