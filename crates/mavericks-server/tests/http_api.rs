use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use mavericks_server::api;
use mavericks_server::config::BusSettings;
use mavericks_server::event_bus::ManualClock;
use mavericks_server::AgentSystem;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

fn app() -> (Router, Arc<AgentSystem>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()));
    let system = Arc::new(AgentSystem::new(&BusSettings::default(), clock));
    (api::router(system.clone()), system)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_status_and_capabilities() {
    let (app, _system) = app();

    let (status, body) = send(&app, Method::GET, "/api/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/api/agents/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent_system_status"], "operational");
    assert_eq!(body["agents"].as_object().unwrap().len(), 6);

    let (status, body) = send(&app, Method::GET, "/api/agents/capabilities", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hackathon"]["agent_name"], "HackathonAgent");
}

#[tokio::test]
async fn test_emit_event_and_read_history() {
    let (app, _system) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/agents/events",
        Some(json!({ "event_type": "user.registered", "user_id": "u1", "payload": { "username": "ada" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["event_id"].as_str().unwrap().starts_with("system_user.registered_"));

    let (status, body) = send(&app, Method::GET, "/api/agents/events/user/u1?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|event| event["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["gamification.initialized", "profile.created", "user.registered"]);

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/agents/events/user/u1?event_types=profile.created,%20user.registered",
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_emit_event_rejects_bad_input() {
    let (app, system) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/agents/events",
        Some(json!({ "event_type": "user.registered", "user_id": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/agents/events",
        Some(json!({ "event_type": "", "user_id": "u1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/agents/events",
        Some(json!({ "event_type": "resume.uploaded", "user_id": "u1", "payload": { "resume_text": 42 } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid payload for resume.uploaded"));
    assert!(system.bus().get_events_for_user("u1", None, 10).is_empty());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/agents/events",
        Some(json!({ "event_type": "mentor.session_booked", "user_id": "u1", "payload": { "slot": 3 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    system.shutdown();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/agents/events",
        Some(json!({ "event_type": "user.registered", "user_id": "u1" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_missing_state_is_not_found() {
    let (app, _system) = app();

    let (status, body) = send(&app, Method::GET, "/api/agents/gamification/profile/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Gamification profile not found");

    let (status, _) = send(&app, Method::GET, "/api/agents/analytics/user/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/agents/hackathon/status/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Hackathon not found");
}

#[tokio::test]
async fn test_leaderboard_and_profile() {
    let (app, system) = app();
    system.process_user_registration("ada", "ada", Map::new());
    system.process_user_registration("grace", "grace", Map::new());
    system.process_daily_login("grace");

    let (status, body) = send(&app, Method::GET, "/api/agents/gamification/leaderboard?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let board = body.as_array().unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0]["user_id"], "grace");
    assert_eq!(board[0]["rank"], 1);

    let (status, body) = send(&app, Method::GET, "/api/agents/gamification/profile/ada", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_points"], 100);
    assert_eq!(body["global_rank"], 2);

    let (status, body) = send(&app, Method::GET, "/api/agents/profile/grace", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["username"], "grace");
    assert_eq!(body["gamification"]["total_points"], 125);
}

#[tokio::test]
async fn test_delete_user() {
    let (app, system) = app();
    system.process_user_registration("u1", "ada", Map::new());

    let (status, body) = send(&app, Method::DELETE, "/api/agents/users/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["events_removed"], 3);
    assert_eq!(body["agents_cleared"], json!(["profile", "gamification", "analytics"]));

    let (_, body) = send(&app, Method::GET, "/api/agents/events/user/u1", None).await;
    assert_eq!(body, json!([]));
    let (status, _) = send(&app, Method::GET, "/api/agents/gamification/profile/u1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
