use std::sync::Arc;

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bridge::{spawn_refresher, Bridge, BridgeError};
use controller::AppleScriptChannel;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        CommandRequest, CommandResult, ConnectResponse, ConnectionInfo, CueInfoResponse,
        CuesResponse, InstancesResponse, PerformanceSnapshot,
    },
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

#[derive(Clone)]
struct AppState {
    bridge: Bridge,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (settings, warnings) = load_settings();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    for warning in &warnings {
        warn!(%warning, "settings value ignored");
    }

    let channel = AppleScriptChannel::new(settings.bundle_id.clone())
        .with_osascript(settings.osascript.clone());
    let bridge = Bridge::new(Arc::new(channel), settings.bridge_config());
    match bridge.discover().await {
        Ok(workspaces) => info!(count = workspaces.len(), "initial workspace discovery"),
        Err(error) => warn!(%error, "controller not available at startup"),
    }
    let _refresher = spawn_refresher(bridge.clone(), settings.poll_interval());

    let channel_name = bridge.serializer().channel_name();
    let app = build_router(Arc::new(AppState { bridge }));
    let addr = settings.socket_addr()?;
    info!(
        %addr,
        channel = channel_name,
        bundle_id = %settings.bundle_id,
        "cue bridge listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/instances", get(list_instances))
        .route("/api/refresh_instances", post(refresh_instances))
        .route("/api/connect/:workspace_id", post(connect))
        .route("/api/disconnect", post(disconnect))
        .route("/api/command/:command", post(send_command))
        .route("/api/skip", post(skip))
        .route("/api/cue_info", get(cue_info))
        .route("/api/cues", get(list_cues))
        .route("/api/performance", get(performance))
        .route("/api/connection", get(connection))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotConnected => StatusCode::CONFLICT,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: BridgeError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(err.code());
    (status, Json(ApiError::from(err)))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_instances(State(state): State<Arc<AppState>>) -> ApiResult<InstancesResponse> {
    let instances = state.bridge.discover().await.map_err(api_error)?;
    Ok(Json(InstancesResponse {
        success: true,
        instances,
        message: None,
    }))
}

async fn refresh_instances(State(state): State<Arc<AppState>>) -> ApiResult<InstancesResponse> {
    let instances = state.bridge.discover().await.map_err(api_error)?;
    let message = format!("Found {} workspace(s)", instances.len());
    Ok(Json(InstancesResponse {
        success: true,
        instances,
        message: Some(message),
    }))
}

async fn connect(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
) -> ApiResult<ConnectResponse> {
    let selection = state
        .bridge
        .connect(&workspace_id)
        .await
        .map_err(api_error)?;
    let workspace = state
        .bridge
        .connection()
        .workspace
        .ok_or_else(|| api_error(BridgeError::NotConnected))?;
    Ok(Json(ConnectResponse {
        success: true,
        workspace,
        current_cue: selection.current,
        next_cue: selection.next,
    }))
}

async fn disconnect(State(state): State<Arc<AppState>>) -> Json<ConnectionInfo> {
    state.bridge.disconnect();
    Json(state.bridge.connection())
}

async fn send_command(
    State(state): State<Arc<AppState>>,
    Path(command): Path<String>,
    body: Option<Json<CommandRequest>>,
) -> ApiResult<CommandResult> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let result = state
        .bridge
        .dispatch(&command, request.cue.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(result))
}

async fn skip(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CommandRequest>>,
) -> ApiResult<CommandResult> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let result = state
        .bridge
        .dispatch("skip", request.cue.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(result))
}

async fn cue_info(State(state): State<Arc<AppState>>) -> Json<CueInfoResponse> {
    Json(state.bridge.cue_info().into())
}

async fn list_cues(State(state): State<Arc<AppState>>) -> Json<CuesResponse> {
    Json(CuesResponse {
        cues: state.bridge.list_cues().await,
    })
}

async fn performance(State(state): State<Arc<AppState>>) -> Json<PerformanceSnapshot> {
    Json(state.bridge.performance())
}

async fn connection(State(state): State<Arc<AppState>>) -> Json<ConnectionInfo> {
    Json(state.bridge.connection())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};
    use shared::protocol::ServerEvent;

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.bridge.subscribe();

    // New clients get the cached cues straight away instead of waiting for a change.
    let snapshot = state.bridge.cue_info();
    let greeting = ServerEvent::CueInfoUpdated {
        current: snapshot.current,
        next: snapshot.next,
    };

    let send_task = tokio::spawn(async move {
        let mut pending = Some(greeting);
        loop {
            let event = match pending.take() {
                Some(event) => event,
                None => match events_rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket client lagging, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
