use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of an upload job. `Processing` moves exactly once to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// Metadata kept for each accepted file. File contents are never retained by the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub original_name: String,
    pub size: u64,
    pub mimetype: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: String,
    pub status: JobStatus,
    pub files: Vec<FileMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadJob {
    #[must_use]
    pub fn processing(id: String, files: Vec<FileMeta>) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            files,
            result: None,
            message: None,
            created_at: Utc::now(),
        }
    }
}
