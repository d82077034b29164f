// Agent system
//
// Builds the bus and the six agents wired to it, and offers the façade the
// HTTP layer calls into.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use mavericks_protocol::EventKind;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::agents::{
    Agent, AgentHealth, AnalyticsAgent, AssessmentAgent, GamificationAgent, HackathonAgent,
    LearningPathAgent, ProfileAgent,
};
use crate::config::BusSettings;
use crate::event_bus::{BusConfig, BusError, Clock, Event, EventAnalytics, EventBus, SYSTEM_SOURCE};

/// Result of a `process_*` convenience call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessReceipt {
    pub status: &'static str,
    /// Empty when the event was not delivered
    pub event_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub agent_system_status: &'static str,
    pub event_bus_stats: EventAnalytics,
    pub agents: BTreeMap<&'static str, AgentHealth>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErasureReport {
    pub user_id: String,
    pub events_removed: usize,
    pub agents_cleared: Vec<&'static str>,
}

pub struct AgentSystem {
    bus: Arc<EventBus>,
    profile: Arc<ProfileAgent>,
    assessment: Arc<AssessmentAgent>,
    learning_path: Arc<LearningPathAgent>,
    hackathon: Arc<HackathonAgent>,
    gamification: Arc<GamificationAgent>,
    analytics: Arc<AnalyticsAgent>,
    sweep_interval: StdDuration,
}

impl AgentSystem {
    pub fn new(settings: &BusSettings, clock: Arc<dyn Clock>) -> Self {
        let bus = EventBus::with_config(BusConfig::from(settings), clock);

        let system = Self {
            profile: ProfileAgent::new(&bus),
            assessment: AssessmentAgent::new(&bus),
            learning_path: LearningPathAgent::new(&bus),
            hackathon: HackathonAgent::new(&bus),
            gamification: GamificationAgent::new(&bus),
            analytics: AnalyticsAgent::new(&bus),
            sweep_interval: StdDuration::from_secs(settings.sweep_interval_secs),
            bus,
        };

        info!(agents = system.agents().len(), "Initialized agents with event bus");
        system
    }

    /// Agents by key, in construction order.
    pub fn agents(&self) -> Vec<(&'static str, Arc<dyn Agent>)> {
        vec![
            ("profile", self.profile.clone() as Arc<dyn Agent>),
            ("assessment", self.assessment.clone()),
            ("learning_path", self.learning_path.clone()),
            ("hackathon", self.hackathon.clone()),
            ("gamification", self.gamification.clone()),
            ("analytics", self.analytics.clone()),
        ]
    }

    pub fn get_agent(&self, key: &str) -> Option<Arc<dyn Agent>> {
        self.agents()
            .into_iter()
            .find(|(name, _)| *name == key)
            .map(|(_, agent)| agent)
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn profile(&self) -> &ProfileAgent {
        &self.profile
    }

    pub fn assessment(&self) -> &AssessmentAgent {
        &self.assessment
    }

    pub fn learning_path(&self) -> &LearningPathAgent {
        &self.learning_path
    }

    pub fn hackathon(&self) -> &HackathonAgent {
        &self.hackathon
    }

    pub fn gamification(&self) -> &GamificationAgent {
        &self.gamification
    }

    pub fn analytics(&self) -> &AnalyticsAgent {
        &self.analytics
    }

    /// Start the dead-letter sweeper. Requires a tokio runtime.
    pub fn start_background_tasks(&self) -> Option<tokio::task::JoinHandle<()>> {
        self.bus.spawn_sweeper(self.sweep_interval)
    }

    // ========================================================================
    // Emitting
    // ========================================================================

    pub fn try_emit_event(
        &self,
        event_type: &str,
        user_id: &str,
        payload: Value,
        source_agent: Option<&str>,
        target_agent: Option<&str>,
    ) -> Result<String, BusError> {
        let mut event = Event::new(
            event_type,
            source_agent.unwrap_or(SYSTEM_SOURCE),
            user_id,
            payload,
            self.bus.now(),
        );
        if let Some(target) = target_agent {
            event = event.targeted(target);
        }
        self.bus.try_emit(event)
    }

    /// Emit through the bus. Returns `""` if the event was not delivered.
    pub fn emit_event(
        &self,
        event_type: &str,
        user_id: &str,
        payload: Value,
        source_agent: Option<&str>,
        target_agent: Option<&str>,
    ) -> String {
        self.try_emit_event(event_type, user_id, payload, source_agent, target_agent)
            .unwrap_or_else(|e| {
                warn!(event_type = %event_type, error = %e, "Failed to emit event");
                String::new()
            })
    }

    fn process(&self, event_type: &str, user_id: &str, payload: Value, status: &'static str) -> ProcessReceipt {
        ProcessReceipt {
            status,
            event_id: self.emit_event(event_type, user_id, payload, None, None),
        }
    }

    pub fn process_user_registration(
        &self,
        user_id: &str,
        username: &str,
        extra: Map<String, Value>,
    ) -> ProcessReceipt {
        let mut payload = extra;
        payload.insert("username".into(), json!(username));
        self.process(
            EventKind::USER_REGISTERED,
            user_id,
            Value::Object(payload),
            "user_registration_processed",
        )
    }

    pub fn process_resume_upload(&self, user_id: &str, resume_text: &str) -> ProcessReceipt {
        self.process(
            EventKind::RESUME_UPLOADED,
            user_id,
            json!({ "resume_text": resume_text }),
            "resume_processed",
        )
    }

    pub fn process_assessment_completion(&self, user_id: &str, results: Value) -> ProcessReceipt {
        self.process(
            EventKind::ASSESSMENT_COMPLETED,
            user_id,
            json!({ "final_results": results }),
            "assessment_processed",
        )
    }

    pub fn process_exercise_submission(&self, user_id: &str, exercise: Value) -> ProcessReceipt {
        self.process(
            EventKind::EXERCISE_SOLUTION_SUBMITTED,
            user_id,
            exercise,
            "exercise_processed",
        )
    }

    pub fn process_hackathon_submission(
        &self,
        user_id: &str,
        hackathon_id: &str,
        submission: Value,
    ) -> ProcessReceipt {
        self.process(
            EventKind::HACKATHON_SUBMISSION_MADE,
            user_id,
            json!({ "hackathon_id": hackathon_id, "submission_data": submission }),
            "hackathon_submission_processed",
        )
    }

    pub fn process_daily_login(&self, user_id: &str) -> ProcessReceipt {
        self.process(
            EventKind::USER_DAILY_LOGIN,
            user_id,
            json!({ "login_time": self.bus.now() }),
            "daily_login_processed",
        )
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_system_status(&self) -> SystemStatus {
        SystemStatus {
            agent_system_status: if self.bus.is_shut_down() {
                "offline"
            } else {
                "operational"
            },
            event_bus_stats: self.bus.get_event_analytics(),
            agents: self
                .agents()
                .into_iter()
                .map(|(key, agent)| (key, agent.health_check()))
                .collect(),
        }
    }

    pub fn get_capabilities(&self) -> BTreeMap<&'static str, Value> {
        self.agents()
            .into_iter()
            .map(|(key, agent)| (key, agent.capabilities()))
            .collect()
    }

    /// Everything the agents know about one user.
    pub fn get_user_profile_data(&self, user_id: &str) -> Value {
        json!({
            "user_id": user_id,
            "profile": self.profile.get_user_profile(user_id),
            "gamification": self.gamification.get_user_profile(user_id).into_value(),
            "learning": self.learning_path.get_user_learning_dashboard(user_id).into_value(),
            "analytics": self.analytics.get_user_analytics(user_id).into_value(),
        })
    }

    /// Erase a user from bus history and from every agent's state.
    ///
    /// Runs under the bus dispatch lock, so an emit for the same user on
    /// another thread lands either wholly before or wholly after the erasure.
    pub fn clear_user_data(&self, user_id: &str) -> ErasureReport {
        let (events_removed, agents_cleared) = self.bus.exclusive(|| {
            let events_removed = self.bus.clear_user_events(user_id);
            let mut agents_cleared = Vec::new();
            for (key, agent) in self.agents() {
                if agent.user_state(user_id).is_some() {
                    agents_cleared.push(key);
                }
                agent.clear_user_state(user_id);
            }
            (events_removed, agents_cleared)
        });
        info!(user_id = %user_id, events_removed, "Cleared user data");
        ErasureReport {
            user_id: user_id.to_string(),
            events_removed,
            agents_cleared,
        }
    }

    pub fn shutdown(&self) {
        self.bus.shutdown();
        info!("Agent system shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::ManualClock;
    use chrono::{TimeZone, Utc};

    fn system() -> AgentSystem {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()));
        AgentSystem::new(&BusSettings::default(), clock)
    }

    #[test]
    fn test_agents_are_keyed_and_subscribed() {
        let system = system();
        let keys: Vec<_> = system.agents().into_iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec!["profile", "assessment", "learning_path", "hackathon", "gamification", "analytics"]
        );
        assert_eq!(system.get_agent("hackathon").unwrap().name(), "HackathonAgent");
        assert!(system.get_agent("billing").is_none());
        assert_eq!(system.bus().subscriber_count(EventKind::PROFILE_CREATED), 2);
    }

    #[test]
    fn test_registration_cascade() {
        let system = system();
        let receipt = system.process_user_registration("u1", "ada", Map::new());
        assert_eq!(receipt.status, "user_registration_processed");
        assert!(receipt.event_id.starts_with("system_user.registered_"));

        let data = system.get_user_profile_data("u1");
        assert_eq!(data["profile"]["username"], "ada");
        assert_eq!(data["gamification"]["total_points"], 100);
        assert_eq!(data["analytics"]["session_stats"]["total_events"], 1);
        assert_eq!(data["learning"]["error"], "Learning state not found");

        let status = system.get_system_status();
        assert_eq!(status.agent_system_status, "operational");
        assert_eq!(status.agents["gamification"].active_users, 1);
        assert_eq!(status.event_bus_stats.event_types["gamification.initialized"], 1);
    }

    #[test]
    fn test_daily_login_and_capabilities() {
        let system = system();
        system.process_user_registration("u1", "ada", Map::new());
        let receipt = system.process_daily_login("u1");
        assert_eq!(receipt.status, "daily_login_processed");
        assert_eq!(system.gamification().get_user_profile("u1").into_value()["streaks"]["current_daily"], 1);

        let capabilities = system.get_capabilities();
        assert_eq!(capabilities.len(), 6);
        assert_eq!(capabilities["analytics"]["agent_name"], "AnalyticsAgent");
        assert_eq!(capabilities["gamification"]["version"], "1.0.0");
    }

    #[test]
    fn test_clear_user_data() {
        let system = system();
        system.process_user_registration("u1", "ada", Map::new());
        system.process_user_registration("u2", "grace", Map::new());

        let report = system.clear_user_data("u1");
        assert_eq!(report.events_removed, 3);
        assert_eq!(report.agents_cleared, vec!["profile", "gamification", "analytics"]);
        assert!(system.bus().get_events_for_user("u1", None, 10).is_empty());
        for (_, agent) in system.agents() {
            assert!(agent.user_state("u1").is_none());
        }
        assert!(system.profile().get_user_profile("u2").is_some());
    }

    #[test]
    fn test_clear_user_data_races_registration() {
        for _ in 0..50 {
            let system = system();
            std::thread::scope(|scope| {
                scope.spawn(|| system.process_user_registration("u1", "ada", Map::new()));
                system.clear_user_data("u1");
            });

            let history = system.bus().get_events_for_user("u1", None, 10).len();
            let holding: Vec<_> = system
                .agents()
                .into_iter()
                .filter(|(_, agent)| agent.user_state("u1").is_some())
                .map(|(key, _)| key)
                .collect();
            if history == 0 {
                assert!(holding.is_empty(), "state survived erasure: {holding:?}");
            } else {
                assert_eq!(history, 3);
                assert_eq!(holding, vec!["profile", "gamification", "analytics"]);
            }
        }
    }

    #[test]
    fn test_emit_after_shutdown() {
        let system = system();
        system.shutdown();
        assert_eq!(system.emit_event("user.registered", "u1", json!({}), None, None), "");
        assert_eq!(
            system.try_emit_event("user.registered", "u1", json!({}), None, None),
            Err(BusError::ShutDown)
        );
        assert_eq!(system.get_system_status().agent_system_status, "offline");
    }
}
