use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{Value, json};

use super::JobStore;
use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::types::FileMeta;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(300);

/// An accepted file waiting to be handed to the workflow.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub meta: FileMeta,
    pub content: Bytes,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    upload_id: String,
    received_at: DateTime<Utc>,
    file_count: usize,
    total_bytes: u64,
    content_types: Vec<String>,
}

impl Envelope {
    fn new(upload_id: &str, files: &[UploadedFile]) -> Self {
        let content_types: BTreeSet<&str> =
            files.iter().map(|f| f.meta.mimetype.as_str()).collect();
        Self {
            upload_id: upload_id.to_string(),
            received_at: Utc::now(),
            file_count: files.len(),
            total_bytes: files.iter().map(|f| f.meta.size).sum(),
            content_types: content_types.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Hands accepted uploads to the syllabus workflow after the HTTP response is sent.
pub struct Forwarder {
    client: reqwest::Client,
    webhook: Option<WebhookConfig>,
    simulated_delay: Duration,
}

impl Forwarder {
    pub fn new(webhook: Option<WebhookConfig>, simulated_delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            webhook,
            simulated_delay,
        })
    }

    /// Runs the hand-off in the background. The job leaves `processing` when the
    /// workflow answers (sync mode), when it calls back (callback mode), or when the
    /// hand-off fails.
    pub fn spawn(
        self: &Arc<Self>,
        jobs: Arc<dyn JobStore>,
        job_id: String,
        files: Vec<UploadedFile>,
    ) {
        let forwarder = Arc::clone(self);
        tokio::spawn(async move {
            forwarder.hand_off(jobs.as_ref(), &job_id, files).await;
        });
    }

    async fn hand_off(&self, jobs: &dyn JobStore, job_id: &str, files: Vec<UploadedFile>) {
        let outcome = match &self.webhook {
            Some(webhook) => self.forward(webhook, job_id, files).await,
            None => self.simulate(&files).await.map(Some),
        };

        let transition = match outcome {
            Ok(Some(result)) => jobs.complete(job_id, result),
            Ok(None) => {
                tracing::info!(job_id, "Upload forwarded; awaiting workflow callback");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, "Upload hand-off failed: {e}");
                jobs.fail(job_id, &format!("Failed to process upload: {e}"))
            }
        };

        match transition {
            Ok(true) => tracing::info!(job_id, "Upload job finished"),
            Ok(false) => tracing::warn!(job_id, "Upload job already finished; result dropped"),
            Err(e) => tracing::error!(job_id, "Failed to record upload job outcome: {e}"),
        }
    }

    async fn forward(
        &self,
        webhook: &WebhookConfig,
        job_id: &str,
        files: Vec<UploadedFile>,
    ) -> Result<Option<Value>> {
        let envelope = Envelope::new(job_id, &files);
        let mut form = Form::new().text("metadata", serde_json::to_string(&envelope)?);

        for file in files {
            let part = Part::bytes(file.content.to_vec())
                .file_name(file.meta.original_name.clone())
                .mime_str(&file.meta.mimetype)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(&webhook.url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("workflow responded with {status}")));
        }

        if !webhook.sync {
            return Ok(None);
        }

        let result = response
            .json::<Value>()
            .await
            .map_err(|e| Error::Upstream(format!("workflow returned an invalid body: {e}")))?;
        Ok(Some(result))
    }

    async fn simulate(&self, files: &[UploadedFile]) -> Result<Value> {
        tokio::time::sleep(self.simulated_delay).await;
        let metadata: Vec<&FileMeta> = files.iter().map(|f| &f.meta).collect();
        Ok(json!({ "files": metadata }))
    }
}
