//! HTTP integration tests for the study-plan queries.

mod common;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

use common::TestServer;
use studyhub::store::Store;
use studyhub::types::StudyPlan;

fn plan(id: &str, user_id: &str, age_minutes: i64, courses: Value) -> StudyPlan {
    serde_json::from_value(json!({
        "id": id,
        "userId": user_id,
        "courses": courses,
        "savedAt": Utc::now() - Duration::minutes(age_minutes),
    }))
    .expect("valid plan")
}

fn entry(name: &str, due: Option<&str>) -> Value {
    json!({
        "assessmentName": name,
        "assessmentType": "Assignment",
        "dueDate": due,
        "tasks": [{"task": "Read", "description": "Chapter 1", "estimatedTime": "2h"}],
    })
}

async fn get(server: &TestServer, path: &str, token: &str) -> (StatusCode, Value) {
    let resp = server
        .client
        .get(server.url(path))
        .bearer_auth(token)
        .send()
        .await
        .expect("request");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_queries_require_authentication() {
    let server = TestServer::start().await;

    for path in [
        "/api/studyplans/latest",
        "/api/studyplans/history",
        "/api/studyplans/calendar",
        "/api/studyplans/some-id",
    ] {
        let resp = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
async fn test_latest_and_history() {
    let server = TestServer::start().await;
    let (alice, token) = server.register("alice@b.com").await;
    let (bob, _) = server.register("bob@b.com").await;

    let (status, _) = get(&server, "/api/studyplans/latest", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let store = &server.state.store;
    store.create_study_plan(&plan("old", &alice, 60, json!([]))).unwrap();
    store.create_study_plan(&plan("new", &alice, 5, json!([]))).unwrap();
    store.create_study_plan(&plan("bobs", &bob, 1, json!([]))).unwrap();

    let (status, body) = get(&server, "/api/studyplans/latest", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["studyPlan"]["id"], "new");
    assert_eq!(body["studyPlan"]["userId"], alice);

    let (status, body) = get(&server, "/api/studyplans/history", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["studyPlans"][0]["id"], "new");
    assert_eq!(body["studyPlans"][1]["id"], "old");

    let (_, body) = get(&server, "/api/studyplans/history?limit=1", &token).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["studyPlans"][0]["id"], "new");

    let (status, _) = get(&server, "/api/studyplans/history?limit=0", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_by_id_is_owner_scoped() {
    let server = TestServer::start().await;
    let (alice, token) = server.register("alice@b.com").await;
    let (bob, _) = server.register("bob@b.com").await;

    let store = &server.state.store;
    store.create_study_plan(&plan("mine", &alice, 1, json!([]))).unwrap();
    store.create_study_plan(&plan("theirs", &bob, 1, json!([]))).unwrap();

    let (status, body) = get(&server, "/api/studyplans/mine", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["studyPlan"]["id"], "mine");

    let (status, _) = get(&server, "/api/studyplans/theirs", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&server, "/api/studyplans/missing", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_calendar_orders_by_due_date() {
    let server = TestServer::start().await;
    let (alice, token) = server.register("alice@b.com").await;

    let (status, _) = get(&server, "/api/studyplans/calendar", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let courses = json!([
        {"course": "MATH101", "entries": [entry("Midterm", Some("2024-03-01")), entry("Reading log", None)]},
        {"course": "HIST200", "entries": [entry("Essay", Some("2024-01-15"))]},
    ]);
    server
        .state
        .store
        .create_study_plan(&plan("cal", &alice, 1, courses))
        .unwrap();

    let (status, body) = get(&server, "/api/studyplans/calendar", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["studyPlanId"], "cal");
    assert!(body["savedAt"].is_string());

    let entries = body["entries"].as_array().unwrap();
    let due: Vec<&Value> = entries.iter().map(|e| &e["dueDate"]).collect();
    assert_eq!(due, [&json!("2024-01-15"), &json!("2024-03-01"), &Value::Null]);
    assert_eq!(entries[0]["course"], "HIST200");
    assert_eq!(entries[0]["assessmentName"], "Essay");
    assert_eq!(entries[0]["tasks"][0]["estimatedTime"], "2h");
}
