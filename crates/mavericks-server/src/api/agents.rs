use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::agents::gamification::LeaderboardEntry;
use crate::agents::Outcome;
use crate::api::error::ApiError;
use crate::system::{AgentSystem, ErasureReport, SystemStatus};
use crate::MavericksError;

const DEFAULT_LEADERBOARD_LIMIT: usize = 50;
const MAX_LEADERBOARD_LIMIT: usize = 1000;

/// Rejected outcomes become 404 with the agent's message.
fn respond(outcome: Outcome) -> Result<Json<Value>, ApiError> {
    match outcome {
        Outcome::Rejected { error } => Err(MavericksError::NotFound(error).into()),
        other => Ok(Json(other.into_value())),
    }
}

// ============================================================================
// System
// ============================================================================

/// GET /api/agents/status - Health of every agent plus bus statistics
pub async fn get_status(State(system): State<Arc<AgentSystem>>) -> Json<SystemStatus> {
    Json(system.get_system_status())
}

/// GET /api/agents/capabilities - Capability descriptor per agent
pub async fn get_capabilities(
    State(system): State<Arc<AgentSystem>>,
) -> Json<BTreeMap<&'static str, Value>> {
    Json(system.get_capabilities())
}

// ============================================================================
// Analytics
// ============================================================================

/// GET /api/agents/analytics/overview
pub async fn analytics_overview(State(system): State<Arc<AgentSystem>>) -> Json<Value> {
    Json(system.analytics().get_platform_overview())
}

/// GET /api/agents/analytics/user/:user_id
pub async fn user_analytics(
    State(system): State<Arc<AgentSystem>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    respond(system.analytics().get_user_analytics(&user_id))
}

/// GET /api/agents/analytics/learning
pub async fn learning_analytics(State(system): State<Arc<AgentSystem>>) -> Json<Value> {
    Json(system.analytics().get_learning_path_analytics())
}

/// GET /api/agents/analytics/hackathons
pub async fn hackathon_analytics(State(system): State<Arc<AgentSystem>>) -> Json<Value> {
    Json(system.analytics().get_hackathon_analytics())
}

// ============================================================================
// Gamification
// ============================================================================

/// GET /api/agents/gamification/profile/:user_id
pub async fn gamification_profile(
    State(system): State<Arc<AgentSystem>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    respond(system.gamification().get_user_profile(&user_id))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/agents/gamification/leaderboard?category&limit
pub async fn leaderboard(
    State(system): State<Arc<AgentSystem>>,
    Query(params): Query<LeaderboardParams>,
) -> Json<Vec<LeaderboardEntry>> {
    let category = params.category.as_deref().unwrap_or("total_points");
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .min(MAX_LEADERBOARD_LIMIT);
    Json(system.gamification().get_leaderboard(category, limit))
}

// ============================================================================
// Learning & hackathons
// ============================================================================

/// GET /api/agents/learning/dashboard/:user_id
pub async fn learning_dashboard(
    State(system): State<Arc<AgentSystem>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    respond(system.learning_path().get_user_learning_dashboard(&user_id))
}

/// GET /api/agents/hackathon/status/:hackathon_id
pub async fn hackathon_status(
    State(system): State<Arc<AgentSystem>>,
    Path(hackathon_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    respond(system.hackathon().get_hackathon_status(&hackathon_id))
}

// ============================================================================
// Users
// ============================================================================

/// GET /api/agents/profile/:user_id - Aggregate view across agents
pub async fn user_profile(
    State(system): State<Arc<AgentSystem>>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    Json(system.get_user_profile_data(&user_id))
}

/// DELETE /api/agents/users/:user_id - Erase a user everywhere
pub async fn delete_user(
    State(system): State<Arc<AgentSystem>>,
    Path(user_id): Path<String>,
) -> Result<Json<ErasureReport>, ApiError> {
    let report = tokio::task::spawn_blocking(move || system.clear_user_data(&user_id))
        .await
        .map_err(|e| ApiError::internal(format!("User erasure failed: {}", e)))?;
    Ok(Json(report))
}
