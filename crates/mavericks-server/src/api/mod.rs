pub mod agents;
pub mod error;
pub mod events;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::system::AgentSystem;

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Every HTTP route, sharing one agent system.
pub fn router(system: Arc<AgentSystem>) -> Router {
    Router::new()
        // Health check
        .route("/api/", get(health_check))
        // System routes
        .route("/api/agents/status", get(agents::get_status))
        .route("/api/agents/capabilities", get(agents::get_capabilities))
        // Analytics routes
        .route("/api/agents/analytics/overview", get(agents::analytics_overview))
        .route("/api/agents/analytics/user/:user_id", get(agents::user_analytics))
        .route("/api/agents/analytics/learning", get(agents::learning_analytics))
        .route("/api/agents/analytics/hackathons", get(agents::hackathon_analytics))
        // Gamification routes
        .route(
            "/api/agents/gamification/profile/:user_id",
            get(agents::gamification_profile),
        )
        .route("/api/agents/gamification/leaderboard", get(agents::leaderboard))
        // Learning & hackathon routes
        .route(
            "/api/agents/learning/dashboard/:user_id",
            get(agents::learning_dashboard),
        )
        .route(
            "/api/agents/hackathon/status/:hackathon_id",
            get(agents::hackathon_status),
        )
        // User routes
        .route("/api/agents/profile/:user_id", get(agents::user_profile))
        .route(
            "/api/agents/users/:user_id",
            delete(agents::delete_user),
        )
        // Event routes
        .route("/api/agents/events", post(events::emit_event))
        .route("/api/agents/events/failed", get(events::failed_events))
        .route("/api/agents/events/user/:user_id", get(events::user_events))
        .with_state(system)
}
