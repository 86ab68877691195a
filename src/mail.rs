//! Out-of-band delivery of password-reset codes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Mail templates the relay knows how to render.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    PasswordReset,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MailEvent<'a> {
    template: Template,
    to: &'a str,
    code: &'a str,
    expires_at: DateTime<Utc>,
}

/// Hands mail events to an HTTP relay. Without a relay, events are only logged.
#[derive(Debug, Clone, Default)]
pub struct MailManager {
    client: reqwest::Client,
    relay_url: Option<String>,
}

impl MailManager {
    pub fn new(relay_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(RELAY_TIMEOUT).build()?;
        Ok(Self { client, relay_url })
    }

    pub async fn send_reset_code(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let Some(url) = &self.relay_url else {
            tracing::info!(to, %expires_at, "No mail relay configured; reset code not delivered");
            tracing::debug!(to, code, "Reset code");
            return Ok(());
        };

        let event = MailEvent {
            template: Template::PasswordReset,
            to,
            code,
            expires_at,
        };

        let response = self.client.post(url).json(&event).send().await?;
        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "mail relay responded with {}",
                response.status()
            )));
        }

        tracing::info!(to, "Reset code handed to mail relay");
        Ok(())
    }
}
