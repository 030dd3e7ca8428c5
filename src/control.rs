// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP control plane over the orchestrator.
//!
//! Endpoints:
//! - POST /api/agents/start - Start the three actors
//! - GET  /api/agents/status - Per-actor liveness and addresses
//! - POST /api/agents/stop - Terminate all actors
//! - GET  /health - Control-plane health
//!
//! Already-running and spawn failures surface as `success: false` bodies,
//! not transport errors; everything else the orchestrator absorbs.

use crate::orchestrator::{ActorStatus, Orchestrator, StartedActor};
use crate::types::{AuditIntensity, HealthState, Role};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Control-plane error response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Opaque hint recorded with the run; the exercise itself is
    /// self-contained.
    pub target_address: String,
    #[serde(default = "default_intensity")]
    pub intensity: String,
}

fn default_intensity() -> String {
    "quick".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorStatusBody {
    pub is_running: bool,
    pub port: u16,
    pub address: Option<String>,
    pub last_seen: Option<String>,
    pub health_state: HealthState,
}

impl From<&ActorStatus> for ActorStatusBody {
    fn from(status: &ActorStatus) -> Self {
        Self {
            is_running: status.is_running,
            port: status.port,
            address: status.address.clone(),
            last_seen: status.last_seen.clone(),
            health_state: status.health,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub judge: ActorStatusBody,
    pub target: ActorStatusBody,
    #[serde(rename = "redTeam")]
    pub red_team: ActorStatusBody,
    #[serde(rename = "startedAt")]
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub success: bool,
    pub message: String,
    pub stopped: Vec<String>,
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agents/start", post(start_agents))
        .route("/api/agents/status", get(agents_status))
        .route("/api/agents/stop", post(stop_agents))
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

/// Bind and run the control plane. The orchestrator context lives and
/// dies with this server; dropping it tears down any live actors.
pub async fn serve(orchestrator: Arc<Orchestrator>, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding control plane on port {port}"))?;
    tracing::info!(%port, "control plane listening");
    axum::serve(listener, router(orchestrator))
        .await
        .context("control plane server failed")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn start_agents(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let intensity = AuditIntensity::parse(&request.intensity);
    let hint = request.target_address.clone();

    let result = tokio::task::spawn_blocking(move || orchestrator.start(&hint, intensity))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    match result {
        Ok(started) => Ok(Json(StartResponse {
            success: true,
            message: "All actors started successfully".to_string(),
            agents: Some(agents_body(&started)),
            error: None,
        })),
        Err(err) => Ok(Json(StartResponse {
            success: false,
            message: format!("Failed to start actors: {err}"),
            agents: None,
            error: Some(err.to_string()),
        })),
    }
}

fn agents_body(started: &[StartedActor]) -> serde_json::Value {
    let mut agents = serde_json::Map::new();
    for actor in started {
        agents.insert(
            actor.role.wire_key().to_string(),
            serde_json::json!({
                "address": actor.address,
                "port": actor.port,
                "status": "running",
            }),
        );
    }
    serde_json::Value::Object(agents)
}

async fn agents_status(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let snapshot = tokio::task::spawn_blocking(move || orchestrator.status())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let body_for = |role: Role| -> ActorStatusBody {
        snapshot
            .actors
            .iter()
            .find(|actor| actor.role == role)
            .map(ActorStatusBody::from)
            .unwrap_or(ActorStatusBody {
                is_running: false,
                port: role.port(),
                address: None,
                last_seen: None,
                health_state: HealthState::Down,
            })
    };

    Ok(Json(StatusResponse {
        judge: body_for(Role::Auditor),
        target: body_for(Role::Target),
        red_team: body_for(Role::Attacker),
        started_at: snapshot.started_at,
    }))
}

async fn stop_agents(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<StopResponse>, ApiError> {
    let stopped = tokio::task::spawn_blocking(move || orchestrator.stop())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let names: Vec<String> = stopped
        .iter()
        .map(|role| role.wire_key().to_string())
        .collect();
    let message = if names.is_empty() {
        "Stopped actors: none were running".to_string()
    } else {
        format!("Stopped actors: {}", names.join(", "))
    };

    Ok(Json(StopResponse {
        success: true,
        message,
        stopped: names,
    }))
}
