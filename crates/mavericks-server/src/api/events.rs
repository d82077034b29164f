use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::ApiError;
use crate::event_bus::{Event, FailedDelivery};
use crate::system::AgentSystem;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1000;

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UserEventParams {
    /// Event types to filter (comma-separated, e.g., "profile.created,points.awarded")
    pub event_types: Option<String>,

    /// Max events to return (default: 50, max: 1000)
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct FailedEventParams {
    pub limit: Option<usize>,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EmitEventRequest {
    pub event_type: String,
    pub user_id: String,
    #[serde(default)]
    pub payload: Value,
    /// Defaults to "system"
    pub source_agent: Option<String>,
    pub target_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmitEventResponse {
    pub event_id: String,
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// GET /api/agents/events/user/:user_id
/// Newest-first event history for one user
pub async fn user_events(
    State(system): State<Arc<AgentSystem>>,
    Path(user_id): Path<String>,
    Query(params): Query<UserEventParams>,
) -> Json<Vec<Event>> {
    let kinds_vec = params.event_types.as_ref().map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .map(String::from)
            .collect::<Vec<_>>()
    });
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    Json(
        system
            .bus()
            .get_events_for_user(&user_id, kinds_vec.as_deref(), limit),
    )
}

/// GET /api/agents/events/failed
/// Newest-first dead-letter listing
pub async fn failed_events(
    State(system): State<Arc<AgentSystem>>,
    Query(params): Query<FailedEventParams>,
) -> Json<Vec<FailedDelivery>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Json(system.bus().failed_events(limit))
}

/// POST /api/agents/events
/// Emit an event into the bus
pub async fn emit_event(
    State(system): State<Arc<AgentSystem>>,
    Json(req): Json<EmitEventRequest>,
) -> Result<Json<EmitEventResponse>, ApiError> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id must not be empty"));
    }
    if let Err(e) = mavericks_protocol::Event::from_parts(&req.event_type, req.payload.clone()) {
        return Err(ApiError::bad_request(format!(
            "Invalid payload for {}: {}",
            req.event_type, e
        )));
    }

    // Fan-out runs every handler synchronously under the bus lock
    let event_id = tokio::task::spawn_blocking(move || {
        system.try_emit_event(
            &req.event_type,
            &req.user_id,
            req.payload,
            req.source_agent.as_deref(),
            req.target_agent.as_deref(),
        )
    })
    .await
    .map_err(|e| ApiError::internal(format!("Event dispatch failed: {}", e)))??;

    Ok(Json(EmitEventResponse { event_id }))
}
