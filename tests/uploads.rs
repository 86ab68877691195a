//! HTTP integration tests for the upload relay and job polling.

mod common;

use std::time::Duration;

use axum::{
    Json, Router,
    extract::Multipart,
    http::StatusCode as AxumStatus,
    routing::post,
};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use common::TestServer;
use studyhub::config::WebhookConfig;
use studyhub::jobs::JobStore;

const PDF: &str = "application/pdf";

fn file_part(name: &str, mimetype: &str) -> Part {
    Part::bytes(b"%PDF-1.4 test".to_vec())
        .file_name(name.to_string())
        .mime_str(mimetype)
        .unwrap()
}

fn form(files: &[(&str, &str)]) -> Form {
    files.iter().fold(Form::new(), |form, (name, mimetype)| {
        form.part("files", file_part(name, mimetype))
    })
}

async fn submit(server: &TestServer, form: Form) -> reqwest::Response {
    server
        .client
        .post(server.url("/api/uploads"))
        .multipart(form)
        .send()
        .await
        .expect("upload request")
}

async fn poll(server: &TestServer, id: &str) -> (StatusCode, Value) {
    let resp = server
        .client
        .get(server.url(&format!("/api/uploads/{id}")))
        .send()
        .await
        .expect("poll request");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

async fn poll_until_finished(server: &TestServer, id: &str) -> Value {
    for _ in 0..100 {
        let (_, body) = poll(server, id).await;
        if body["status"] != "processing" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("upload {id} never finished");
}

async fn callback(server: &TestServer, body: Value) -> StatusCode {
    server
        .client
        .post(server.url("/api/uploads/webhook"))
        .json(&body)
        .send()
        .await
        .expect("webhook request")
        .status()
}

/// Stands in for the syllabus workflow. Answers with the number of `files` parts
/// and the metadata it received, or with `status` if that is not a success.
async fn start_workflow(status: AxumStatus) -> String {
    let app = Router::new().route(
        "/hook",
        post(move |mut multipart: Multipart| async move {
            let mut files = 0;
            let mut metadata = Value::Null;
            while let Some(field) = multipart.next_field().await.unwrap() {
                match field.name() {
                    Some("files") => files += 1,
                    Some("metadata") => {
                        metadata = serde_json::from_str(&field.text().await.unwrap()).unwrap();
                    }
                    _ => {}
                }
            }
            (status, Json(json!({"files": files, "metadata": metadata})))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/hook")
}

#[tokio::test]
async fn test_callback_completes_job() {
    let server = TestServer::start().await;

    let resp = submit(&server, form(&[("a.pdf", PDF), ("b.pdf", PDF)])).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let id = body["uploadId"].as_str().unwrap().to_string();
    assert_eq!(body["fileCount"], 2);

    let (status, snapshot) = poll(&server, &id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["status"], "processing");

    let status = callback(&server, json!({"uploadId": id, "result": {"ok": true}})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, snapshot) = poll(&server, &id).await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["result"], json!({"ok": true}));

    // The first completion signal wins.
    let status = callback(&server, json!({"uploadId": id, "result": {"ok": false}})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, snapshot) = poll(&server, &id).await;
    assert_eq!(snapshot["result"], json!({"ok": true}));
}

#[tokio::test]
async fn test_disallowed_files_are_filtered() {
    let server = TestServer::start().await;

    let resp = submit(
        &server,
        form(&[("notes.pdf", PDF), ("setup.exe", "application/x-msdownload")]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["fileCount"], 1);

    let id = body["uploadId"].as_str().unwrap();
    let job = server.state.jobs.get(id).unwrap().expect("job recorded");
    assert_eq!(job.files.len(), 1);
    assert_eq!(job.files[0].original_name, "notes.pdf");
}

#[tokio::test]
async fn test_batch_without_valid_files_is_rejected() {
    let server = TestServer::start().await;

    let resp = submit(&server, form(&[("setup.exe", "application/x-msdownload")])).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("No valid files"));

    let resp = submit(&server, Form::new().text("note", "no files here")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_over_file_limit_is_rejected() {
    let server = TestServer::start().await;

    let names: Vec<String> = (0..=studyhub::server::MAX_FILES)
        .map(|i| format!("f{i}.pdf"))
        .collect();
    let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), PDF)).collect();

    let resp = submit(&server, form(&files)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_upload() {
    let server = TestServer::start().await;

    let (status, _) = poll(&server, "does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let status = callback(&server, json!({"uploadId": "does-not-exist", "result": {}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = callback(&server, json!({"result": {}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_simulated_processing_without_webhook() {
    let server =
        TestServer::start_with(|config| config.simulated_delay = Duration::from_millis(50)).await;

    let resp = submit(&server, form(&[("a.pdf", PDF)])).await;
    let body: Value = resp.json().await.unwrap();
    let id = body["uploadId"].as_str().unwrap().to_string();

    let snapshot = poll_until_finished(&server, &id).await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["result"]["files"][0]["originalName"], "a.pdf");
    assert_eq!(snapshot["result"]["files"][0]["mimetype"], PDF);
}

#[tokio::test]
async fn test_sync_webhook_completes_from_response() {
    let url = start_workflow(AxumStatus::OK).await;
    let server = TestServer::start_with(|config| {
        config.webhook = Some(WebhookConfig { url, sync: true });
    })
    .await;

    let resp = submit(&server, form(&[("a.pdf", PDF), ("b.pdf", PDF)])).await;
    let body: Value = resp.json().await.unwrap();
    let id = body["uploadId"].as_str().unwrap().to_string();

    let snapshot = poll_until_finished(&server, &id).await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["result"]["files"], 2);
    let metadata = &snapshot["result"]["metadata"];
    assert_eq!(metadata["uploadId"], id);
    assert_eq!(metadata["fileCount"], 2);
    assert_eq!(metadata["contentTypes"], json!([PDF]));
}

#[tokio::test]
async fn test_callback_mode_waits_for_workflow() {
    let url = start_workflow(AxumStatus::OK).await;
    let server = TestServer::start_with(|config| {
        config.webhook = Some(WebhookConfig { url, sync: false });
    })
    .await;

    let resp = submit(&server, form(&[("a.pdf", PDF)])).await;
    let body: Value = resp.json().await.unwrap();
    let id = body["uploadId"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let (_, snapshot) = poll(&server, &id).await;
    assert_eq!(snapshot["status"], "processing");

    let status = callback(&server, json!({"uploadId": id, "result": {"plan": 1}})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, snapshot) = poll(&server, &id).await;
    assert_eq!(snapshot["status"], "completed");
}

#[tokio::test]
async fn test_failing_webhook_marks_job_error() {
    let url = start_workflow(AxumStatus::INTERNAL_SERVER_ERROR).await;
    let server = TestServer::start_with(|config| {
        config.webhook = Some(WebhookConfig { url, sync: true });
    })
    .await;

    let resp = submit(&server, form(&[("a.pdf", PDF)])).await;
    let body: Value = resp.json().await.unwrap();
    let id = body["uploadId"].as_str().unwrap().to_string();

    let snapshot = poll_until_finished(&server, &id).await;
    assert_eq!(snapshot["status"], "error");
    assert!(snapshot["message"].as_str().unwrap().contains("500"));
    assert!(snapshot.get("result").is_none());
}
