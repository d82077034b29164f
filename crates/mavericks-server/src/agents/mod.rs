// Agents
//
// Each agent owns per-user state behind its own lock and reacts to bus events
// through a static dispatch table. Handlers emit follow-up events only after
// releasing their state.

pub mod analytics;
pub mod assessment;
pub mod base;
pub mod gamification;
pub mod hackathon;
pub mod learning_path;
pub mod profile;

pub use analytics::{AnalyticsAgent, ANALYTICS_AGENT};
pub use assessment::{AssessmentAgent, ASSESSMENT_AGENT};
pub use base::{
    dispatch, subscribe_all, Agent, AgentCore, AgentError, AgentHealth, HandlerResult, Outcome,
    Route, StateStore,
};
pub use gamification::{GamificationAgent, GAMIFICATION_AGENT};
pub use hackathon::{HackathonAgent, HACKATHON_AGENT};
pub use learning_path::{LearningPathAgent, LEARNING_PATH_AGENT};
pub use profile::{ProfileAgent, PROFILE_AGENT};
