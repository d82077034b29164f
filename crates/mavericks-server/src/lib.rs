pub mod agents;
pub mod api;
pub mod config;
pub mod event_bus;
pub mod system;

use axum::http::StatusCode;
use thiserror::Error;

pub use system::AgentSystem;

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum MavericksError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, MavericksError>;

impl MavericksError {
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            MavericksError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MavericksError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MavericksError::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MavericksError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}
