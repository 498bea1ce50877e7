//! Axum-based HTTP gateway exposing the screening pipeline.
//!
//! - `/health` liveness probe, independent of pipeline state
//! - framework-style app, session and `/run` routes
//! - `/api/assess` returning a typed [`Assessment`](crate::guard::Assessment)
//! - request body size limit (64KB) and whole-request timeout

use crate::agents::{Content, Event, InvocationContext};
use crate::config::{Config, GatewayConfig};
use crate::guard::{AgentModel, EthicalGuard, GuardError, APP_NAME};
use crate::providers::{self, Provider};
use crate::session::{CreateOutcome, SessionStore};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB).
pub const MAX_BODY_SIZE: usize = 65_536;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<EthicalGuard>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Wire the pipeline and session store from configuration.
    pub fn from_config(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let settings = AgentModel {
            model: config.model.model.clone(),
            temperature: config.model.temperature,
        };
        let sessions = SessionStore::open(&config.session.location()?)
            .context("Failed to open session store")?;
        Ok(Self {
            guard: Arc::new(EthicalGuard::new(provider, &settings)),
            sessions: Arc::new(sessions),
        })
    }
}

/// Build the CORS layer from the configured allow-list.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o.trim()) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Build the router with middleware.
pub fn router(state: AppState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/list-apps", get(handle_list_apps))
        .route("/apps/{app_name}/agent", get(handle_agent_info))
        .route(
            "/apps/{app_name}/users/{user_id}/sessions",
            get(handle_list_sessions).post(handle_create_session),
        )
        .route(
            "/apps/{app_name}/users/{user_id}/sessions/{session_id}",
            get(handle_get_session)
                .post(handle_create_session_with_id)
                .delete(handle_delete_session),
        )
        .route("/run", post(handle_run))
        .route("/api/assess", post(handle_assess))
        .with_state(state)
        .layer(cors_layer(config))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config, provider: Arc<dyn Provider>) -> Result<()> {
    let state = AppState::from_config(&config, provider)?;
    let app = router(state, &config.gateway);

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        app = APP_NAME,
        model = %config.model.model,
        "Gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn internal_error(context: &str, err: &anyhow::Error) -> Response {
    tracing::error!(error = %format!("{err:#}"), "{context}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
}

/// Map a pipeline failure onto an HTTP response.
fn pipeline_error(err: &GuardError) -> Response {
    if matches!(err, GuardError::EmptyPrompt) {
        return error_response(StatusCode::BAD_REQUEST, "Message text cannot be empty");
    }
    tracing::error!(
        error = %providers::sanitize_api_error(&err.to_string()),
        "Pipeline evaluation failed"
    );
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Pipeline evaluation failed")
}

/// Oversized bodies keep their 413; any other rejection is a 400.
fn json_rejection(route: &str, err: &JsonRejection, expected: &str) -> Response {
    tracing::warn!(route, "JSON body rejected: {err}");
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            &format!("Request body exceeds {MAX_BODY_SIZE} bytes"),
        );
    }
    error_response(StatusCode::BAD_REQUEST, expected)
}

fn check_app(app_name: &str) -> Option<Response> {
    if app_name == APP_NAME {
        None
    } else {
        Some(error_response(
            StatusCode::NOT_FOUND,
            &format!("App not found: {app_name}"),
        ))
    }
}

/// GET /health: always public, never touches the pipeline
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /list-apps
async fn handle_list_apps() -> impl IntoResponse {
    Json(vec![APP_NAME])
}

/// GET /apps/{app_name}/agent: agent tree
async fn handle_agent_info(State(state): State<AppState>, Path(app_name): Path<String>) -> Response {
    if let Some(resp) = check_app(&app_name) {
        return resp;
    }
    Json(state.guard.info()).into_response()
}

async fn handle_list_sessions(
    State(state): State<AppState>,
    Path((app_name, user_id)): Path<(String, String)>,
) -> Response {
    if let Some(resp) = check_app(&app_name) {
        return resp;
    }
    match state.sessions.list_sessions(&app_name, &user_id) {
        Ok(sessions) => Json(sessions).into_response(),
        Err(e) => internal_error("Failed to list sessions", &e),
    }
}

type OptionalState = Option<Json<serde_json::Value>>;

fn create_session(
    state: &AppState,
    app_name: &str,
    user_id: &str,
    session_id: Option<&str>,
    body: OptionalState,
) -> Response {
    if let Some(resp) = check_app(app_name) {
        return resp;
    }
    let initial = body.map(|Json(v)| v).filter(|v| !v.is_null());
    if initial.as_ref().is_some_and(|v| !v.is_object()) {
        return error_response(StatusCode::BAD_REQUEST, "Session state must be a JSON object");
    }

    match state
        .sessions
        .create_session(app_name, user_id, session_id, initial)
    {
        Ok(CreateOutcome::Created(session)) => {
            tracing::info!(app = app_name, user = user_id, session = %session.id, "Session created");
            Json(session).into_response()
        }
        Ok(CreateOutcome::AlreadyExists) => error_response(
            StatusCode::CONFLICT,
            &format!("Session already exists: {}", session_id.unwrap_or_default()),
        ),
        Err(e) => internal_error("Failed to create session", &e),
    }
}

/// POST /apps/{app_name}/users/{user_id}/sessions
async fn handle_create_session(
    State(state): State<AppState>,
    Path((app_name, user_id)): Path<(String, String)>,
    body: OptionalState,
) -> Response {
    create_session(&state, &app_name, &user_id, None, body)
}

/// POST /apps/{app_name}/users/{user_id}/sessions/{session_id}
async fn handle_create_session_with_id(
    State(state): State<AppState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
    body: OptionalState,
) -> Response {
    create_session(&state, &app_name, &user_id, Some(session_id.as_str()), body)
}

/// GET /apps/{app_name}/users/{user_id}/sessions/{session_id}
async fn handle_get_session(
    State(state): State<AppState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Response {
    if let Some(resp) = check_app(&app_name) {
        return resp;
    }
    match state.sessions.get_session(&app_name, &user_id, &session_id) {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Session not found"),
        Err(e) => internal_error("Failed to load session", &e),
    }
}

/// DELETE /apps/{app_name}/users/{user_id}/sessions/{session_id}
async fn handle_delete_session(
    State(state): State<AppState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Response {
    if let Some(resp) = check_app(&app_name) {
        return resp;
    }
    match state.sessions.delete_session(&app_name, &user_id, &session_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Session not found"),
        Err(e) => internal_error("Failed to delete session", &e),
    }
}

/// Body of `POST /run`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: Content,
}

/// POST /run: run the pipeline inside a session and return its events
async fn handle_run(
    State(state): State<AppState>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => {
            return json_rejection(
                "/run",
                &e,
                "Invalid JSON body. Expected: {\"appName\", \"userId\", \"sessionId\", \"newMessage\"}",
            );
        }
    };
    if let Some(resp) = check_app(&req.app_name) {
        return resp;
    }

    match state
        .sessions
        .get_session(&req.app_name, &req.user_id, &req.session_id)
    {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Session not found"),
        Err(e) => return internal_error("Failed to load session", &e),
    }

    let ctx = InvocationContext::new(req.new_message);
    let invocation = match state.guard.invoke(&ctx).await {
        Ok(inv) => inv,
        Err(e) => return pipeline_error(&e),
    };

    let mut to_store: Vec<Event> = Vec::with_capacity(invocation.events.len() + 1);
    to_store.push(Event::new(&ctx.invocation_id, "user", ctx.user_content.clone()));
    to_store.extend(invocation.events.iter().cloned());
    if let Err(e) = state
        .sessions
        .append_events(&req.app_name, &req.user_id, &req.session_id, &to_store)
    {
        return internal_error("Failed to persist session events", &e);
    }

    Json(invocation.events).into_response()
}

/// Body of `POST /api/assess`.
#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    pub prompt: String,
}

/// POST /api/assess: stateless screening with a structured result
async fn handle_assess(
    State(state): State<AppState>,
    body: Result<Json<AssessRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => {
            return json_rejection("/api/assess", &e, "Invalid JSON body. Expected: {\"prompt\": \"...\"}");
        }
    };

    match state.guard.assess(&req.prompt).await {
        Ok(assessment) => Json(assessment).into_response(),
        Err(e) => pipeline_error(&e),
    }
}
