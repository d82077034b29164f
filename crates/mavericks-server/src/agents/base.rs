use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::event_bus::{Clock, Event, EventBus, SystemClock};

// ============================================================================
// Handler results
// ============================================================================

/// Unexpected faults inside a handler. Business conditions are reported
/// through [`Outcome::Rejected`] instead.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// What a handler made of an event
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok(Value),
    /// A normal, reported failure such as missing prior state
    Rejected { error: String },
    /// Nothing to report
    Ignored,
}

impl Outcome {
    pub fn ok(value: impl Serialize) -> HandlerResult {
        Ok(Outcome::Ok(serde_json::to_value(value)?))
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Outcome::Rejected {
            error: error.into(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected { .. })
    }

    /// JSON shape seen by callers: the value, `{"error": ..}` or `null`.
    pub fn into_value(self) -> Value {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Rejected { error } => json!({ "error": error }),
            Outcome::Ignored => Value::Null,
        }
    }
}

pub type HandlerResult = Result<Outcome, AgentError>;

/// One entry of an agent's dispatch table
pub type Route<A> = (&'static str, fn(&A, &Event) -> HandlerResult);

// ============================================================================
// Agent contract
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AgentHealth {
    pub agent_name: String,
    pub status: &'static str,
    pub subscribed_events: Vec<String>,
    pub active_users: usize,
    pub timestamp: DateTime<Utc>,
}

/// A named event handler owning per-user state.
pub trait Agent: Send + Sync {
    fn core(&self) -> &AgentCore;

    fn process_event(&self, event: &Event) -> HandlerResult;

    /// Static self-description for introspection endpoints
    fn capabilities(&self) -> Value;

    /// Number of users with state
    fn active_users(&self) -> usize;

    fn user_state(&self, user_id: &str) -> Option<Value>;

    fn clear_user_state(&self, user_id: &str);

    fn name(&self) -> &str {
        self.core().name()
    }

    fn subscribed_events(&self) -> Vec<String> {
        self.core().subscribed_events()
    }

    fn health_check(&self) -> AgentHealth {
        AgentHealth {
            agent_name: self.name().to_string(),
            status: "healthy",
            subscribed_events: self.subscribed_events(),
            active_users: self.active_users(),
            timestamp: self.core().now(),
        }
    }
}

/// Route an event through a dispatch table. Unknown types are ignored.
pub fn dispatch<A>(agent: &A, routes: &[Route<A>], event: &Event) -> HandlerResult
where
    A: Agent,
{
    match routes.iter().find(|(kind, _)| *kind == event.event_type) {
        Some((_, handler)) => handler(agent, event),
        None => {
            debug!(agent = %agent.name(), event_type = %event.event_type, "Unhandled event type");
            Ok(Outcome::Ignored)
        }
    }
}

/// Subscribe an agent to every type in its dispatch table.
pub fn subscribe_all<A>(agent: &Arc<A>, routes: &[Route<A>])
where
    A: Agent + 'static,
{
    for (kind, _) in routes {
        let handle: Arc<dyn Agent> = agent.clone();
        agent.core().subscribe_to_event(kind, handle);
    }
}

// ============================================================================
// Shared agent plumbing
// ============================================================================

/// Name, bus handle and clock shared by every agent.
///
/// The bus is held weakly: the bus owns the agents through its subscriber
/// lists, so a strong handle would keep both alive forever.
pub struct AgentCore {
    name: String,
    bus: Weak<EventBus>,
    clock: Arc<dyn Clock>,
    subscribed: Mutex<BTreeSet<String>>,
}

impl AgentCore {
    pub fn new(name: impl Into<String>, bus: &Arc<EventBus>) -> Self {
        Self {
            name: name.into(),
            bus: Arc::downgrade(bus),
            clock: bus.clock(),
            subscribed: Mutex::new(BTreeSet::new()),
        }
    }

    /// A core with no bus attached; emits are dropped with a warning.
    pub fn detached(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bus: Weak::new(),
            clock: Arc::new(SystemClock),
            subscribed: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn subscribed_events(&self) -> Vec<String> {
        self.subscribed.lock().iter().cloned().collect()
    }

    pub fn subscribe_to_event(&self, event_type: &str, agent: Arc<dyn Agent>) -> bool {
        self.subscribed.lock().insert(event_type.to_string());
        match self.bus.upgrade() {
            Some(bus) => bus.subscribe(event_type, agent),
            None => false,
        }
    }

    /// Run a state mutation outside of any concurrent dispatch.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.bus.upgrade() {
            Some(bus) => bus.exclusive(f),
            None => f(),
        }
    }

    /// Emit an event attributed to this agent. Returns `""` if it was not delivered.
    pub fn emit_event(
        &self,
        event_type: &str,
        target_agent: Option<&str>,
        user_id: &str,
        payload: impl Serialize,
    ) -> String {
        let Some(bus) = self.bus.upgrade() else {
            warn!(agent = %self.name, event_type = %event_type, "No event bus configured");
            return String::new();
        };
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(agent = %self.name, event_type = %event_type, error = %e, "Unserializable payload");
                return String::new();
            }
        };
        let mut event = Event::new(event_type, self.name.as_str(), user_id, payload, self.now());
        if let Some(target) = target_agent {
            event = event.targeted(target);
        }
        bus.emit(event)
    }
}

// ============================================================================
// Per-user state
// ============================================================================

/// Per-user state map. Entries are created lazily and removed only explicitly.
///
/// Never emit while holding the closure passed to [`StateStore::update`]:
/// nested handlers for the same agent would deadlock on the inner lock.
pub struct StateStore<S> {
    inner: Mutex<HashMap<String, S>>,
}

impl<S> Default for StateStore<S> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> StateStore<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.inner.lock().contains_key(user_id)
    }

    pub fn read<R>(&self, user_id: &str, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.inner.lock().get(user_id).map(f)
    }

    /// Mutate a user's state, creating the default state first if absent.
    pub fn update<R>(&self, user_id: &str, f: impl FnOnce(&mut S) -> R) -> R
    where
        S: Default,
    {
        let mut inner = self.inner.lock();
        f(inner.entry(user_id.to_string()).or_default())
    }

    /// Mutate a user's state only if it already exists.
    pub fn update_existing<R>(&self, user_id: &str, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.inner.lock().get_mut(user_id).map(f)
    }

    pub fn insert(&self, user_id: &str, state: S) {
        self.inner.lock().insert(user_id.to_string(), state);
    }

    pub fn clear(&self, user_id: &str) -> bool {
        self.inner.lock().remove(user_id).is_some()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Run a read-only pass over every user's state.
    pub fn with_all<R>(&self, f: impl FnOnce(&HashMap<String, S>) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn get(&self, user_id: &str) -> Option<S>
    where
        S: Clone,
    {
        self.inner.lock().get(user_id).cloned()
    }

    pub fn to_json(&self, user_id: &str) -> Option<Value>
    where
        S: Serialize,
    {
        self.read(user_id, |state| serde_json::to_value(state).ok())
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default, Clone, Serialize)]
    struct Counter {
        hits: u32,
    }

    struct Echo {
        core: AgentCore,
        state: StateStore<Counter>,
    }

    impl Echo {
        const ROUTES: &'static [Route<Self>] = &[("ping", Self::handle_ping), ("fail", Self::handle_fail)];

        fn handle_ping(&self, event: &Event) -> HandlerResult {
            let hits = self.state.update(&event.user_id, |s| {
                s.hits += 1;
                s.hits
            });
            self.core.emit_event("pong", None, &event.user_id, json!({ "hits": hits }));
            Outcome::ok(json!({ "hits": hits }))
        }

        fn handle_fail(&self, _event: &Event) -> HandlerResult {
            Ok(Outcome::rejected("nothing to do"))
        }
    }

    impl Agent for Echo {
        fn core(&self) -> &AgentCore {
            &self.core
        }

        fn process_event(&self, event: &Event) -> HandlerResult {
            dispatch(self, Self::ROUTES, event)
        }

        fn capabilities(&self) -> Value {
            json!({ "agent_name": self.name() })
        }

        fn active_users(&self) -> usize {
            self.state.user_count()
        }

        fn user_state(&self, user_id: &str) -> Option<Value> {
            self.state.to_json(user_id)
        }

        fn clear_user_state(&self, user_id: &str) {
            self.state.clear(user_id);
        }
    }

    fn echo(bus: &Arc<EventBus>) -> Arc<Echo> {
        let agent = Arc::new(Echo {
            core: AgentCore::new("echo", bus),
            state: StateStore::new(),
        });
        subscribe_all(&agent, Echo::ROUTES);
        agent
    }

    #[test]
    fn test_subscriptions_follow_routes() {
        let bus = EventBus::new(100);
        let agent = echo(&bus);
        assert_eq!(agent.subscribed_events(), vec!["fail", "ping"]);
        assert_eq!(bus.subscriber_count("ping"), 1);
        assert_eq!(bus.subscriber_count("pong"), 0);
    }

    #[test]
    fn test_dispatch_and_emit_from_handler() {
        let bus = EventBus::new(100);
        let agent = echo(&bus);
        bus.emit(Event::new("ping", "system", "u1", json!({}), Utc::now()));
        bus.emit(Event::new("ping", "system", "u1", json!({}), Utc::now()));

        assert_eq!(agent.user_state("u1"), Some(json!({ "hits": 2 })));
        let pongs = bus.get_events_for_user("u1", Some(&["pong".to_string()]), 10);
        assert_eq!(pongs.len(), 2);
        assert_eq!(pongs[0].source_agent, "echo");
        assert_eq!(pongs[0].payload["hits"], 2);
    }

    #[test]
    fn test_rejected_outcome_shape() {
        let outcome = Outcome::rejected("Profile not found");
        assert!(outcome.is_rejected());
        assert_eq!(outcome.into_value(), json!({ "error": "Profile not found" }));
        assert_eq!(Outcome::Ignored.into_value(), Value::Null);
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let bus = EventBus::new(100);
        let agent = echo(&bus);
        let event = Event::new("other", "system", "u1", json!({}), Utc::now());
        assert_eq!(agent.process_event(&event).unwrap(), Outcome::Ignored);
    }

    #[test]
    fn test_detached_emit_returns_empty() {
        let core = AgentCore::detached("lonely");
        assert_eq!(core.emit_event("x.y", None, "u1", json!({})), "");
    }

    #[test]
    fn test_health_and_clear() {
        let bus = EventBus::new(100);
        let agent = echo(&bus);
        bus.emit(Event::new("ping", "system", "u1", json!({}), Utc::now()));
        let health = agent.health_check();
        assert_eq!(health.agent_name, "echo");
        assert_eq!(health.status, "healthy");
        assert_eq!(health.active_users, 1);
        agent.clear_user_state("u1");
        assert_eq!(agent.active_users(), 0);
        assert!(agent.user_state("u1").is_none());
    }
}
