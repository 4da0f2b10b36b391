use super::*;
use axum::{
    body::{self, Body},
    http::{header, Request, Response},
};
use bridge::BridgeConfig;
use controller::{
    fake::{cue, group, FakeController},
    ChannelError,
};
use serde_json::Value;
use tower::ServiceExt;

fn test_app() -> (Router, Arc<FakeController>) {
    let fake = Arc::new(FakeController::new().with_tree(vec![
        cue("a", "1", "Walk In"),
        group("b", "2", "Act One", vec![cue("b1", "2.1", "Thunder")]),
        cue("c", "3", "Bows"),
    ]));
    fake.select(Some("a"));
    let bridge = Bridge::new(fake.clone(), BridgeConfig::default());
    (build_router(Arc::new(AppState { bridge })), fake)
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn connected_app() -> (Router, Arc<FakeController>) {
    let (app, fake) = test_app();
    let response = app
        .clone()
        .oneshot(post("/api/connect/ws-1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    (app, fake)
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _fake) = test_app();
    let response = app.oneshot(get("/healthz")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn instances_lists_open_workspaces() {
    let (app, _fake) = test_app();
    let response = app.oneshot(get("/api/instances")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["instances"][0]["id"], "ws-1");
    assert_eq!(body["instances"][0]["name"], "Main Show");
    assert!(body.get("message").is_none());
}

#[tokio::test]
async fn refresh_instances_reports_count() {
    let (app, _fake) = test_app();
    let response = app
        .oneshot(post("/api/refresh_instances"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["message"], "Found 1 workspace(s)");
}

#[tokio::test]
async fn instances_unavailable_when_controller_is_down() {
    let (app, fake) = test_app();
    fake.set_running(false);
    let response = app.oneshot(get("/api/instances")).await.expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["code"], "unavailable");
}

#[tokio::test]
async fn connect_returns_workspace_and_cues() {
    let (app, _fake) = test_app();
    let response = app
        .oneshot(post("/api/connect/ws-1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["workspace"]["name"], "Main Show");
    assert_eq!(body["currentCue"]["number"], "1");
    assert_eq!(body["currentCue"]["name"], "Walk In");
    assert_eq!(body["nextCue"]["name"], "Act One");
}

#[tokio::test]
async fn connect_to_unknown_workspace_is_not_found() {
    let (app, _fake) = test_app();
    let response = app
        .oneshot(post("/api/connect/missing"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["message"], "Unknown workspace: missing");
}

#[tokio::test]
async fn commands_require_a_connection() {
    let (app, fake) = test_app();
    let response = app
        .oneshot(post("/api/command/play"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["code"], "not_connected");
    assert_eq!(fake.call_count("transport"), 0);
}

#[tokio::test]
async fn command_without_body_is_dispatched() {
    let (app, fake) = connected_app().await;
    let response = app
        .oneshot(post("/api/command/next"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert!(body["latencyMs"].as_f64().is_some());
    assert!(body.get("error").is_none());
    assert_eq!(fake.selected().as_deref(), Some("b"));
}

#[tokio::test]
async fn unknown_command_is_reported_in_the_result() {
    let (app, _fake) = connected_app().await;
    let response = app
        .oneshot(post("/api/command/dance"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unknown command: dance");
}

#[tokio::test]
async fn skip_selects_the_requested_cue() {
    let (app, fake) = connected_app().await;
    let response = app
        .clone()
        .oneshot(post_json("/api/skip", serde_json::json!({ "cue": "c" })))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(fake.selected().as_deref(), Some("c"));
    assert_eq!(fake.active(), None);

    let response = app
        .oneshot(post_json("/api/skip", serde_json::json!({})))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No cue ID provided");
}

#[tokio::test]
async fn skip_without_body_is_a_counted_failure() {
    let (app, fake) = connected_app().await;
    let response = app
        .clone()
        .oneshot(post("/api/skip"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No cue ID provided");
    assert_eq!(fake.call_count("select_cue"), 0);

    let response = app.oneshot(get("/api/performance")).await.expect("response");
    let body = json_body(response).await;
    assert_eq!(body["commandsSent"], 1);
    assert_eq!(body["errorRatePercent"], 100.0);
}

#[tokio::test]
async fn default_workspace_can_be_connected() {
    let fake = Arc::new(
        FakeController::new()
            .with_workspaces(Vec::new())
            .with_tree(vec![cue("a", "1", "Walk In")]),
    );
    fake.fail_on("front_workspace", ChannelError::Script("no documents".into()));
    fake.select(Some("a"));
    let bridge = Bridge::new(fake.clone(), BridgeConfig::default());
    let app = build_router(Arc::new(AppState { bridge }));

    let response = app
        .clone()
        .oneshot(get("/api/instances"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["instances"][0]["name"], "Default Workspace");
    let id = body["instances"][0]["id"].as_str().expect("id").to_string();
    assert!(!id.is_empty());

    let response = app
        .clone()
        .oneshot(post(&format!("/api/connect/{id}")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["currentCue"]["name"], "Walk In");

    let response = app.oneshot(get("/api/connection")).await.expect("response");
    let body = json_body(response).await;
    assert_eq!(body["connected"], true);
    assert_eq!(body["workspace"]["name"], "Default Workspace");
}

#[tokio::test]
async fn cue_info_is_served_from_cache() {
    let (app, fake) = connected_app().await;
    let calls = fake.calls().len();

    let response = app.oneshot(get("/api/cue_info")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["current"]["name"], "Walk In");
    assert_eq!(body["current"]["type"], "Audio");
    assert_eq!(body["next"]["number"], "2");
    assert_eq!(fake.calls().len(), calls);
}

#[tokio::test]
async fn cue_info_before_connect_is_the_empty_shape() {
    let (app, _fake) = test_app();
    let response = app.oneshot(get("/api/cue_info")).await.expect("response");
    let body = json_body(response).await;
    assert_eq!(body["current"]["number"], "");
    assert_eq!(body["current"]["type"], "unknown");
}

#[tokio::test]
async fn cues_lists_the_flattened_show() {
    let (app, _fake) = connected_app().await;
    let response = app.oneshot(get("/api/cues")).await.expect("response");
    let body = json_body(response).await;
    let cues = body["cues"].as_array().expect("cues");
    assert_eq!(cues.len(), 4);
    assert_eq!(cues[2]["id"], "b1");
    assert_eq!(cues[2]["displayName"], "--> Thunder");
}

#[tokio::test]
async fn performance_tracks_dispatched_commands() {
    let (app, _fake) = connected_app().await;
    app.clone()
        .oneshot(post("/api/command/stop"))
        .await
        .expect("response");
    app.clone()
        .oneshot(post("/api/command/bogus"))
        .await
        .expect("response");

    let response = app.oneshot(get("/api/performance")).await.expect("response");
    let body = json_body(response).await;
    assert_eq!(body["connected"], true);
    assert_eq!(body["commandsSent"], 2);
    assert_eq!(body["errorRatePercent"], 50.0);
}

#[tokio::test]
async fn disconnect_clears_the_connection() {
    let (app, _fake) = connected_app().await;
    let response = app
        .clone()
        .oneshot(get("/api/connection"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["connected"], true);
    assert_eq!(body["workspace"]["id"], "ws-1");
    assert!(body["connectedAt"].is_string());

    let response = app
        .clone()
        .oneshot(post("/api/disconnect"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["connected"], false);
    assert!(body.get("workspace").is_none());

    let response = app.oneshot(get("/api/cue_info")).await.expect("response");
    let body = json_body(response).await;
    assert_eq!(body["current"]["number"], "");
}
