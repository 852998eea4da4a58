//! JSON handlers of the simulation API.

use crate::{AppState, error::ApiError};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use flowsim::SessionId;
use flowsim_core::wire::{ArchitectureSpec, ConfigUpdate, ToggleNode, TrafficUpdate};
use serde::{Deserialize, Serialize};

/// `{"status": "..."}` acknowledgement of a command.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    fn new(status: &str) -> Json<Self> {
        Json(Self {
            status: status.to_owned(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub session_id: SessionId,
    pub ws_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Sessions {
    pub sessions: Vec<SessionId>,
}

pub async fn health_handler() -> Json<Ack> {
    Ack::new("ok")
}

pub async fn create_handler(
    State(state): State<AppState>,
    Json(spec): Json<ArchitectureSpec>,
) -> Result<Json<Created>, ApiError> {
    let handle = state.registry.create_session(spec).await?;
    let session_id = handle.id().clone();

    Ok(Json(Created {
        ws_url: format!("/api/ws/{session_id}"),
        session_id,
    }))
}

pub async fn sessions_handler(State(state): State<AppState>) -> Json<Sessions> {
    Json(Sessions {
        sessions: state.registry.list().await,
    })
}

/// The latest snapshot, `204 No Content` before the first tick.
pub async fn snapshot_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let snapshot = state.registry.get(&id).await?.snapshot().await?;

    Ok(match snapshot {
        Some(snapshot) => Json(&*snapshot).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

pub async fn stop_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    state.registry.stop(&id).await?;
    Ok(Ack::new("stopped"))
}

/// Absent fields are left as they are. `rps` is applied before `spike`.
pub async fn traffic_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<TrafficUpdate>,
) -> Result<Json<Ack>, ApiError> {
    let handle = state.registry.get(&id).await?;
    if let Some(rps) = update.rps {
        handle.set_traffic_rps(rps).await?;
    }
    if let Some(spike) = update.spike {
        handle.set_traffic_spike(spike).await?;
    }
    Ok(Ack::new("updated"))
}

pub async fn toggle_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(toggle): Json<ToggleNode>,
) -> Result<Json<Ack>, ApiError> {
    state
        .registry
        .get(&id)
        .await?
        .toggle_node(toggle.node_id, toggle.down)
        .await?;
    Ok(Ack::new("toggled"))
}

pub async fn config_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<Ack>, ApiError> {
    let handle = state.registry.get(&id).await?;
    let (node_id, patch) = update.patch()?;
    handle.update_config(node_id, patch).await?;
    Ok(Ack::new("configured"))
}

pub async fn update_graph_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(spec): Json<ArchitectureSpec>,
) -> Result<Json<Ack>, ApiError> {
    state.registry.get(&id).await?.replace_graph(spec).await?;
    Ok(Ack::new("graph_updated"))
}

pub async fn reset_queues_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    state.registry.get(&id).await?.reset_queues().await?;
    Ok(Ack::new("queues_reset"))
}
