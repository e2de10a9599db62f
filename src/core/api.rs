//! HTTP API for CDE
//!
//! Endpoints:
//! - POST /turn - Process one turn (optional `session_id`, one engine per session)
//! - GET /session/{id}/scopes - Scope-state table of a session
//! - GET /health - Health check

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::core::DeviationEngine;
use crate::error::CdeError;
use crate::types::{ScopeKey, Turn, TurnReport};
use crate::DEFAULT_SESSION_ID;

/// App state: one engine (and scope table) per session
pub struct AppState {
    pub sessions: RwLock<HashMap<String, DeviationEngine>>,
    pub manifests_dir: PathBuf,
}

/// Turn request: the turn fields plus an optional session id
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub turn: Turn,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

/// One row of the scope table
#[derive(Debug, Serialize)]
pub struct ScopeStatus {
    pub scope_key: ScopeKey,
    pub ema: f64,
    pub active: bool,
    pub observations: u64,
}

/// Session scope table response
#[derive(Debug, Serialize)]
pub struct ScopesResponse {
    pub session_id: String,
    pub scopes: Vec<ScopeStatus>,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Maps crate errors onto HTTP status codes
pub struct ApiError(CdeError);

impl From<CdeError> for ApiError {
    fn from(err: CdeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Create the API router
pub fn create_router(manifests_dir: impl Into<PathBuf>) -> Router {
    let state = Arc::new(AppState {
        sessions: RwLock::new(HashMap::new()),
        manifests_dir: manifests_dir.into(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/turn", post(process_turn))
        .route("/session/:id/scopes", get(get_scopes))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.len(),
    })
}

/// Process one turn in its session
async fn process_turn(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<TurnReport>, ApiError> {
    let req: TurnRequest = serde_json::from_value(payload)
        .map_err(|e| CdeError::input_invalid(format!("turn does not match schema: {}", e)))?;
    req.turn.validate()?;

    let session_id = req
        .session_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

    let mut sessions = state.sessions.write().await;
    let engine = sessions
        .entry(session_id)
        .or_insert_with(|| DeviationEngine::from_dir(state.manifests_dir.clone()));

    let outcome = engine.process_turn(&req.turn, None)?;
    Ok(Json(TurnReport::from_outcome(outcome)))
}

/// Scope-state table of a session
async fn get_scopes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScopesResponse>, StatusCode> {
    let sessions = state.sessions.read().await;
    let engine = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;

    let scopes = engine
        .scope_states()
        .into_iter()
        .map(|(scope_key, s)| ScopeStatus {
            scope_key,
            ema: s.ema,
            active: s.active,
            observations: s.observations,
        })
        .collect();

    Ok(Json(ScopesResponse {
        session_id: id,
        scopes,
    }))
}

/// Run the API server
pub async fn run_server(addr: &str, manifests_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(manifests_dir.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, manifests = %manifests_dir.display(), "CDE API listening");
    info!("  POST /turn                - Process a turn");
    info!("  GET  /session/:id/scopes  - Scope states");
    info!("  GET  /health              - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
