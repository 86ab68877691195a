use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::error::Error;
use crate::jobs::UploadedFile;
use crate::server::AppState;
use crate::server::dto::{JobSnapshot, UploadAccepted, WebhookCallback};
use crate::server::response::{
    ApiError, ApiJson, MessageResponse, StoreOptionExt, StoreResultExt,
};
use crate::types::{FileMeta, UploadJob};

pub const MAX_FILES: usize = 10;
pub const MAX_FILE_SIZE: usize = 20 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// A full batch of maximum-size files plus room for multipart framing.
const MAX_BODY_BYTES: usize = MAX_FILES * MAX_FILE_SIZE + 1024 * 1024;

const FILES_FIELD: &str = "files";

pub fn upload_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(submit).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route("/webhook", post(webhook))
        .route("/{id}", get(status))
}

fn multipart_error(e: &MultipartError) -> ApiError {
    ApiError {
        status: e.status(),
        message: e.body_text(),
    }
}

/// Reason a file is left out of the batch, if any.
fn rejection(meta: &FileMeta) -> Option<&'static str> {
    if !ALLOWED_CONTENT_TYPES.contains(&meta.mimetype.as_str()) {
        Some("unsupported content type")
    } else if meta.size as usize > MAX_FILE_SIZE {
        Some("file too large")
    } else {
        None
    }
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadAccepted>, ApiError> {
    let mut accepted = Vec::new();
    let mut received = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        received += 1;
        if received > MAX_FILES {
            return Err(ApiError::bad_request(format!(
                "At most {MAX_FILES} files can be uploaded at once"
            )));
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let content = field.bytes().await.map_err(|e| multipart_error(&e))?;

        let meta = FileMeta {
            original_name,
            size: content.len() as u64,
            mimetype,
        };

        if let Some(reason) = rejection(&meta) {
            tracing::warn!(
                file = %meta.original_name,
                mimetype = %meta.mimetype,
                size = meta.size,
                "Skipping uploaded file: {reason}"
            );
            continue;
        }

        accepted.push(UploadedFile { meta, content });
    }

    if accepted.is_empty() {
        return Err(ApiError::bad_request(
            "No valid files uploaded. Only PDF and DOCX files up to 20MB are accepted",
        ));
    }

    let upload_id = Uuid::new_v4().to_string();
    let files = accepted.iter().map(|f| f.meta.clone()).collect();

    state
        .jobs
        .create(UploadJob::processing(upload_id.clone(), files))
        .api_err("Failed to create upload job")?;

    tracing::info!(
        upload_id = %upload_id,
        files = accepted.len(),
        skipped = received - accepted.len(),
        "Upload accepted"
    );

    let file_count = accepted.len();
    state
        .forwarder
        .spawn(Arc::clone(&state.jobs), upload_id.clone(), accepted);

    Ok(Json(UploadAccepted {
        upload_id,
        file_count,
    }))
}

/// Completion callback from the syllabus workflow.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<WebhookCallback>,
) -> impl IntoResponse {
    let upload_id = req
        .upload_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("uploadId is required"))?;

    match state.jobs.complete(&upload_id, req.result) {
        Ok(true) => {
            tracing::info!(upload_id = %upload_id, "Upload completed by workflow callback");
            Ok(MessageResponse::new("ok"))
        }
        Ok(false) => Err(ApiError::conflict("Upload already finished")),
        Err(Error::NotFound) => {
            tracing::warn!(upload_id = %upload_id, "Workflow callback for unknown upload");
            Err(ApiError::bad_request("Unknown uploadId"))
        }
        Err(e) => {
            tracing::error!("Failed to complete upload job: {e}");
            Err(ApiError::internal("Failed to complete upload"))
        }
    }
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    let job = state
        .jobs
        .get(&id)
        .api_err("Failed to load upload job")?
        .or_not_found("Upload not found")?;

    Ok(Json(job.into()))
}
