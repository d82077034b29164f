use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::dead_letter::{DeadLetterQueue, FailedDelivery};
use super::types::Event;
use crate::agents::{Agent, Outcome};
use crate::config::BusSettings;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("event type must not be empty")]
    EmptyEventType,

    #[error("dispatch depth {depth} exceeded while emitting {event_type}")]
    DepthExceeded { event_type: String, depth: usize },

    #[error("event bus is shut down")]
    ShutDown,
}

/// Sizing for one bus instance
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub max_event_history: usize,
    pub dead_letter_capacity: usize,
    pub dead_letter_retention: Duration,
    pub max_dispatch_depth: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::from(&BusSettings::default())
    }
}

impl From<&BusSettings> for BusConfig {
    fn from(settings: &BusSettings) -> Self {
        Self {
            max_event_history: settings.max_event_history,
            dead_letter_capacity: settings.dead_letter_capacity,
            dead_letter_retention: Duration::hours(settings.dead_letter_retention_hours),
            max_dispatch_depth: settings.max_dispatch_depth,
        }
    }
}

/// Aggregate view over the current history
#[derive(Debug, Clone, Serialize)]
pub struct EventAnalytics {
    pub total_events: usize,
    pub failed_events: usize,
    pub event_types: BTreeMap<String, usize>,
    pub user_activity: BTreeMap<String, usize>,
    pub delivery_stats: BTreeMap<String, u64>,
    pub subscribers: BTreeMap<String, usize>,
    pub latest_cursor: u64,
    pub timestamp: DateTime<Utc>,
}

struct BusState {
    subscribers: HashMap<String, Vec<Arc<dyn Agent>>>,
    history: VecDeque<Event>,
    dead_letters: DeadLetterQueue,
    delivery_stats: BTreeMap<String, u64>,
    next_cursor: u64,
}

/// In-process publish/subscribe broker.
///
/// Delivery is synchronous and depth-first: a handler that emits sees its
/// nested event fully delivered before the outer fan-out continues. The
/// dispatch lock is re-entrant and held for the whole fan-out, so emits from
/// other threads wait until the current one (with everything it triggers)
/// has finished. Bookkeeping lives behind a separate lock that is never held
/// while a handler runs.
pub struct EventBus {
    config: BusConfig,
    clock: Arc<dyn Clock>,
    /// Current nesting depth of the thread holding the lock
    dispatch: ReentrantMutex<Cell<usize>>,
    state: Mutex<BusState>,
    shut_down: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl EventBus {
    pub fn new(max_event_history: usize) -> Arc<Self> {
        let config = BusConfig {
            max_event_history,
            ..BusConfig::default()
        };
        Self::with_config(config, Arc::new(SystemClock))
    }

    pub fn with_config(config: BusConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let state = BusState {
            subscribers: HashMap::new(),
            history: VecDeque::with_capacity(config.max_event_history.min(1024)),
            dead_letters: DeadLetterQueue::new(config.dead_letter_capacity),
            delivery_stats: BTreeMap::new(),
            next_cursor: 0,
        };
        Arc::new(Self {
            config,
            clock,
            dispatch: ReentrantMutex::new(Cell::new(0)),
            state: Mutex::new(state),
            shut_down: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Returns false when the agent is already subscribed to this type.
    pub fn subscribe(&self, event_type: &str, agent: Arc<dyn Agent>) -> bool {
        let _dispatch = self.dispatch.lock();
        let mut state = self.state.lock();
        let list = state.subscribers.entry(event_type.to_string()).or_default();
        if list.iter().any(|existing| same_agent(existing, &agent)) {
            return false;
        }
        info!(agent = %agent.name(), event_type = %event_type, "Agent subscribed");
        list.push(agent);
        true
    }

    pub fn unsubscribe(&self, event_type: &str, agent: &Arc<dyn Agent>) -> bool {
        let _dispatch = self.dispatch.lock();
        let mut state = self.state.lock();
        let Some(list) = state.subscribers.get_mut(event_type) else {
            return false;
        };
        let Some(index) = list.iter().position(|existing| same_agent(existing, agent)) else {
            return false;
        };
        list.remove(index);
        info!(agent = %agent.name(), event_type = %event_type, "Agent unsubscribed");
        true
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        let state = self.state.lock();
        state.subscribers.get(event_type).map_or(0, Vec::len)
    }

    // ========================================================================
    // Emission
    // ========================================================================

    /// Emit an event, returning its id or `""` when it could not be delivered.
    pub fn emit(&self, event: Event) -> String {
        let event_type = event.event_type.clone();
        match self.try_emit(event) {
            Ok(event_id) => event_id,
            Err(e) => {
                error!(event_type = %event_type, error = %e, "Failed to emit event");
                String::new()
            }
        }
    }

    /// Emit an event and fan it out to every matching subscriber.
    ///
    /// Per-subscriber failures never surface here; they land in the dead-letter
    /// queue. Errors are reserved for events the bus refuses outright.
    pub fn try_emit(&self, mut event: Event) -> Result<String, BusError> {
        if event.event_type.trim().is_empty() {
            return Err(BusError::EmptyEventType);
        }
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(BusError::ShutDown);
        }

        let depth = self.dispatch.lock();
        if depth.get() >= self.config.max_dispatch_depth {
            return Err(BusError::DepthExceeded {
                event_type: event.event_type,
                depth: depth.get(),
            });
        }

        let subscribers = {
            let mut state = self.state.lock();
            state.next_cursor += 1;
            event.cursor = state.next_cursor;

            if self.config.max_event_history > 0 {
                while state.history.len() >= self.config.max_event_history {
                    state.history.pop_front();
                }
                state.history.push_back(event.clone());
            }

            let subscribers = state
                .subscribers
                .get(&event.event_type)
                .cloned()
                .unwrap_or_default();
            match &event.target_agent {
                Some(target) => subscribers
                    .into_iter()
                    .filter(|agent| agent.name() == target)
                    .collect::<Vec<_>>(),
                None => subscribers,
            }
        };

        info!(
            event_type = %event.event_type,
            source = %event.source_agent,
            cursor = event.cursor,
            subscribers = subscribers.len(),
            "Emitting event"
        );

        depth.set(depth.get() + 1);
        for agent in &subscribers {
            self.deliver(agent, &event);
        }
        depth.set(depth.get() - 1);

        Ok(event.event_id)
    }

    fn deliver(&self, agent: &Arc<dyn Agent>, event: &Event) {
        let name = agent.name().to_string();
        let failure = match run_handler(agent, event) {
            Ok(outcome) => {
                if !matches!(outcome, Outcome::Ignored) {
                    debug!(agent = %name, event_id = %event.event_id, "Handler produced a result");
                }
                let mut state = self.state.lock();
                *state.delivery_stats.entry(format!("{}_success", name)).or_default() += 1;
                return;
            }
            Err(message) => message,
        };

        error!(
            agent = %name,
            event_id = %event.event_id,
            error = %failure,
            "Failed to deliver event"
        );
        let now = self.clock.now();
        let mut state = self.state.lock();
        *state.delivery_stats.entry(format!("{}_failed", name)).or_default() += 1;
        state.dead_letters.push(FailedDelivery {
            event: event.clone(),
            target_agent: name,
            error: failure,
            timestamp: now,
        });
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Newest-first history for one user, optionally filtered by type.
    pub fn get_events_for_user(
        &self,
        user_id: &str,
        event_types: Option<&[String]>,
        limit: usize,
    ) -> Vec<Event> {
        let _dispatch = self.dispatch.lock();
        let state = self.state.lock();
        state
            .history
            .iter()
            .rev()
            .filter(|event| event.user_id == user_id)
            .filter(|event| matches_types(event, event_types))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_event_analytics(&self) -> EventAnalytics {
        let _dispatch = self.dispatch.lock();
        let state = self.state.lock();
        let mut event_types = BTreeMap::new();
        let mut user_activity = BTreeMap::new();
        for event in &state.history {
            *event_types.entry(event.event_type.clone()).or_insert(0) += 1;
            *user_activity.entry(event.user_id.clone()).or_insert(0) += 1;
        }
        EventAnalytics {
            total_events: state.history.len(),
            failed_events: state.dead_letters.len(),
            event_types,
            user_activity,
            delivery_stats: state.delivery_stats.clone(),
            subscribers: state
                .subscribers
                .iter()
                .map(|(kind, agents)| (kind.clone(), agents.len()))
                .collect(),
            latest_cursor: state.next_cursor,
            timestamp: self.clock.now(),
        }
    }

    pub fn delivery_stats(&self) -> BTreeMap<String, u64> {
        self.state.lock().delivery_stats.clone()
    }

    /// Newest-first dead-letter listing
    pub fn failed_events(&self, limit: usize) -> Vec<FailedDelivery> {
        self.state.lock().dead_letters.recent(limit)
    }

    /// Number of events currently retained in history
    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Run `f` while holding the dispatch lock, so no fan-out from another
    /// thread interleaves with it. Re-entrant on the calling thread.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _dispatch = self.dispatch.lock();
        f()
    }

    // ========================================================================
    // Replay & erasure
    // ========================================================================

    /// Re-deliver a user's retained events, oldest first, to a single agent.
    ///
    /// Failures are logged and skipped; the count covers successful deliveries.
    pub fn replay_events_for_user(
        &self,
        user_id: &str,
        agent: &Arc<dyn Agent>,
        event_types: Option<&[String]>,
    ) -> usize {
        let depth = self.dispatch.lock();
        let events: Vec<Event> = {
            let state = self.state.lock();
            state
                .history
                .iter()
                .filter(|event| event.user_id == user_id)
                .filter(|event| matches_types(event, event_types))
                .cloned()
                .collect()
        };

        depth.set(depth.get() + 1);
        let mut replayed = 0;
        for event in &events {
            match run_handler(agent, event) {
                Ok(_) => replayed += 1,
                Err(e) => warn!(
                    agent = %agent.name(),
                    event_id = %event.event_id,
                    error = %e,
                    "Failed to replay event"
                ),
            }
        }
        depth.set(depth.get() - 1);

        info!(user_id = %user_id, agent = %agent.name(), replayed, "Replayed events");
        replayed
    }

    /// Purge a user's events from history and the dead-letter queue.
    /// Returns the number of history entries removed.
    pub fn clear_user_events(&self, user_id: &str) -> usize {
        let _dispatch = self.dispatch.lock();
        let mut state = self.state.lock();
        let before = state.history.len();
        state.history.retain(|event| event.user_id != user_id);
        let removed = before - state.history.len();
        let dead = state.dead_letters.remove_user(user_id);
        info!(user_id = %user_id, removed, dead_letters = dead, "Cleared user events");
        removed
    }

    // ========================================================================
    // Dead-letter sweep & lifecycle
    // ========================================================================

    /// One sweep pass over the dead-letter queue.
    pub fn sweep_dead_letters(&self) -> usize {
        let now = self.clock.now();
        let cleaned = self
            .state
            .lock()
            .dead_letters
            .evict_older_than(now, self.config.dead_letter_retention);
        if cleaned > 0 {
            info!(cleaned, "Cleaned up old failed events");
        }
        cleaned
    }

    /// Start the periodic dead-letter sweep on the current tokio runtime.
    ///
    /// The task only holds a weak handle and stops on [`EventBus::shutdown`]
    /// or once the bus is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: StdDuration) -> Option<tokio::task::JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime available, dead-letter sweeper not started");
            return None;
        };
        let bus: Weak<EventBus> = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(bus) = bus.upgrade() else { break };
                        bus.sweep_dead_letters();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Dead-letter sweeper stopped");
        }))
    }

    /// Stop the background sweep and refuse further emits. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        info!("Event bus shutdown complete");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

fn same_agent(a: &Arc<dyn Agent>, b: &Arc<dyn Agent>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn matches_types(event: &Event, event_types: Option<&[String]>) -> bool {
    match event_types {
        Some(types) if !types.is_empty() => types.iter().any(|t| *t == event.event_type),
        _ => true,
    }
}

/// Run one handler, turning both errors and panics into a message.
fn run_handler(agent: &Arc<dyn Agent>, event: &Event) -> Result<Outcome, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| agent.process_event(event))) {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentCore, AgentError, HandlerResult};
    use crate::event_bus::clock::ManualClock;
    use serde_json::{json, Value};

    /// Records every event it sees and optionally fails.
    struct Recorder {
        core: AgentCore,
        mode: Mode,
        seen: Mutex<Vec<String>>,
    }

    enum Mode {
        Ok,
        Error,
        Panic,
    }

    impl Recorder {
        fn new(name: &str, mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                core: AgentCore::detached(name),
                mode,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().clone()
        }
    }

    impl Agent for Recorder {
        fn core(&self) -> &AgentCore {
            &self.core
        }

        fn process_event(&self, event: &Event) -> HandlerResult {
            self.seen.lock().push(event.event_type.clone());
            match self.mode {
                Mode::Ok => Ok(Outcome::Ignored),
                Mode::Error => Err(AgentError::Internal("handler failure".to_string())),
                Mode::Panic => panic!("handler panic"),
            }
        }

        fn capabilities(&self) -> Value {
            json!({})
        }

        fn active_users(&self) -> usize {
            0
        }

        fn user_state(&self, _user_id: &str) -> Option<Value> {
            None
        }

        fn clear_user_state(&self, _user_id: &str) {}
    }

    fn event(kind: &str, user: &str) -> Event {
        Event::new(kind, "system", user, json!({}), Utc::now())
    }

    /// Logs `name:type` to a shared journal and emits `reply` on `trigger`.
    struct Relay {
        core: AgentCore,
        bus: Weak<EventBus>,
        journal: Arc<Mutex<Vec<String>>>,
        trigger: &'static str,
        reply: &'static str,
        pause: StdDuration,
        started: Mutex<Option<std::sync::mpsc::Sender<()>>>,
        results: Mutex<Vec<Result<String, BusError>>>,
    }

    impl Relay {
        fn new(
            bus: &Arc<EventBus>,
            name: &str,
            journal: &Arc<Mutex<Vec<String>>>,
            trigger: &'static str,
            reply: &'static str,
        ) -> Self {
            Self {
                core: AgentCore::new(name, bus),
                bus: Arc::downgrade(bus),
                journal: journal.clone(),
                trigger,
                reply,
                pause: StdDuration::ZERO,
                started: Mutex::new(None),
                results: Mutex::new(Vec::new()),
            }
        }

        fn listener(bus: &Arc<EventBus>, name: &str, journal: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self::new(bus, name, journal, "", ""))
        }
    }

    impl Agent for Relay {
        fn core(&self) -> &AgentCore {
            &self.core
        }

        fn process_event(&self, event: &Event) -> HandlerResult {
            self.journal
                .lock()
                .push(format!("{}:{}", self.core.name(), event.event_type));
            if event.event_type != self.trigger {
                return Ok(Outcome::Ignored);
            }
            if let Some(started) = self.started.lock().take() {
                let _ = started.send(());
            }
            std::thread::sleep(self.pause);
            if let Some(bus) = self.bus.upgrade() {
                let reply = Event::new(self.reply, self.core.name(), &event.user_id, json!({}), Utc::now());
                let result = bus.try_emit(reply);
                self.results.lock().push(result);
            }
            Ok(Outcome::Ignored)
        }

        fn capabilities(&self) -> Value {
            json!({})
        }

        fn active_users(&self) -> usize {
            0
        }

        fn user_state(&self, _user_id: &str) -> Option<Value> {
            None
        }

        fn clear_user_state(&self, _user_id: &str) {}
    }

    #[test]
    fn test_nested_emit_is_delivered_depth_first() {
        let bus = EventBus::new(100);
        let journal = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::new(Relay::new(&bus, "a", &journal, "x", "y"));
        let b = Relay::listener(&bus, "b", &journal);
        let c = Relay::listener(&bus, "c", &journal);
        bus.subscribe("x", a.clone());
        bus.subscribe("y", b);
        bus.subscribe("x", c);

        bus.emit(event("x", "u"));
        assert_eq!(*journal.lock(), vec!["a:x", "b:y", "c:x"]);

        let kinds: Vec<_> = bus
            .get_events_for_user("u", None, 10)
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(kinds, vec!["y", "x"]);
    }

    #[test]
    fn test_emit_cycle_is_cut_at_max_depth() {
        let config = BusConfig {
            max_dispatch_depth: 4,
            ..BusConfig::default()
        };
        let bus = EventBus::with_config(config, Arc::new(SystemClock));
        let journal = Arc::new(Mutex::new(Vec::new()));
        let echo = Arc::new(Relay::new(&bus, "echo", &journal, "ping", "ping"));
        bus.subscribe("ping", echo.clone());

        let id = bus.emit(event("ping", "u"));
        assert!(!id.is_empty());
        assert_eq!(bus.history_len(), 4);
        assert_eq!(journal.lock().len(), 4);

        let results = echo.results.lock();
        assert_eq!(results.len(), 4);
        assert_eq!(
            results[0],
            Err(BusError::DepthExceeded {
                event_type: "ping".to_string(),
                depth: 4
            })
        );
        assert!(results[1..].iter().all(Result::is_ok));
        assert!(bus.failed_events(10).is_empty());
    }

    #[test]
    fn test_fan_out_is_atomic_across_threads() {
        let bus = EventBus::new(100);
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let slow = Arc::new(Relay {
            pause: StdDuration::from_millis(50),
            started: Mutex::new(Some(started_tx)),
            ..Relay::new(&bus, "slow", &journal, "x", "y")
        });
        bus.subscribe("x", slow);

        std::thread::scope(|scope| {
            scope.spawn(|| bus.emit(event("x", "u")));
            started_rx.recv().unwrap();

            // The fan-out is in flight; readers and writers wait for all of it.
            let kinds: Vec<_> = bus
                .get_events_for_user("u", None, 10)
                .into_iter()
                .map(|e| e.event_type)
                .collect();
            assert_eq!(kinds, vec!["y", "x"]);
            assert_eq!(bus.exclusive(|| journal.lock().len()), 1);
            bus.emit(event("z", "u"));
        });

        let cursors: Vec<_> = bus
            .get_events_for_user("u", None, 10)
            .into_iter()
            .map(|e| (e.event_type, e.cursor))
            .collect();
        assert_eq!(
            cursors,
            vec![("z".to_string(), 3), ("y".to_string(), 2), ("x".to_string(), 1)]
        );
    }

    #[test]
    fn test_duplicate_subscribe_is_noop() {
        let bus = EventBus::new(100);
        let recorder = Recorder::new("a", Mode::Ok);
        assert!(bus.subscribe("t", recorder.clone()));
        assert!(!bus.subscribe("t", recorder.clone()));
        bus.emit(event("t", "u"));
        assert_eq!(recorder.seen().len(), 1);
        assert_eq!(bus.subscriber_count("t"), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new(100);
        let recorder: Arc<dyn Agent> = Recorder::new("a", Mode::Ok);
        bus.subscribe("t", recorder.clone());
        assert!(bus.unsubscribe("t", &recorder));
        assert!(!bus.unsubscribe("t", &recorder));
        assert!(!bus.unsubscribe("never", &recorder));
    }

    #[test]
    fn test_failure_isolation_and_dead_letter() {
        let bus = EventBus::new(100);
        let first = Recorder::new("first", Mode::Ok);
        let second = Recorder::new("second", Mode::Error);
        let third = Recorder::new("third", Mode::Panic);
        let fourth = Recorder::new("fourth", Mode::Ok);
        bus.subscribe("t", first.clone());
        bus.subscribe("t", second.clone());
        bus.subscribe("t", third.clone());
        bus.subscribe("t", fourth.clone());

        let id = bus.emit(event("t", "u"));
        assert!(!id.is_empty());
        assert_eq!(first.seen().len(), 1);
        assert_eq!(fourth.seen().len(), 1);

        let failed = bus.failed_events(10);
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].target_agent, "third");
        assert!(failed[0].error.contains("handler panic"));
        assert_eq!(failed[1].target_agent, "second");
        assert_eq!(failed[1].error, "internal error: recorder failure");

        let stats = bus.delivery_stats();
        assert_eq!(stats["first_success"], 1);
        assert_eq!(stats["second_failed"], 1);
        assert_eq!(stats["third_failed"], 1);
    }

    #[test]
    fn test_targeted_delivery() {
        let bus = EventBus::new(100);
        let recorders: Vec<_> = ["x", "y", "z"]
            .iter()
            .map(|name| Recorder::new(name, Mode::Ok))
            .collect();
        for recorder in &recorders {
            bus.subscribe("t", recorder.clone());
        }
        bus.emit(event("t", "u").targeted("y"));
        assert!(recorders[0].seen().is_empty());
        assert_eq!(recorders[1].seen().len(), 1);
        assert!(recorders[2].seen().is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::new(3);
        for i in 0..4 {
            bus.emit(event(&format!("t{}", i), "u"));
        }
        let events = bus.get_events_for_user("u", None, 100);
        let kinds: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["t3", "t2", "t1"]);
        assert_eq!(events[0].cursor, 4);
    }

    #[test]
    fn test_event_query_filters() {
        let bus = EventBus::new(100);
        bus.emit(event("a", "u1"));
        bus.emit(event("b", "u1"));
        bus.emit(event("a", "u2"));
        bus.emit(event("a", "u1"));
        let only_a = vec!["a".to_string()];
        assert_eq!(bus.get_events_for_user("u1", Some(&only_a), 100).len(), 2);
        assert_eq!(bus.get_events_for_user("u1", None, 1).len(), 1);

        let analytics = bus.get_event_analytics();
        assert_eq!(analytics.total_events, 4);
        assert_eq!(analytics.event_types["a"], 3);
        assert_eq!(analytics.user_activity["u1"], 3);
    }

    #[test]
    fn test_empty_event_type_is_rejected() {
        let bus = EventBus::new(10);
        assert_eq!(bus.emit(event(" ", "u")), "");
        assert_eq!(bus.try_emit(event("", "u")), Err(BusError::EmptyEventType));
        assert_eq!(bus.history_len(), 0);
    }

    #[test]
    fn test_replay_skips_failures() {
        let bus = EventBus::new(100);
        bus.emit(event("a", "u"));
        bus.emit(event("b", "u"));
        bus.emit(event("a", "other"));

        let ok: Arc<dyn Agent> = Recorder::new("ok", Mode::Ok);
        assert_eq!(bus.replay_events_for_user("u", &ok, None), 2);

        let failing: Arc<dyn Agent> = Recorder::new("bad", Mode::Error);
        assert_eq!(bus.replay_events_for_user("u", &failing, None), 0);
        assert!(bus.failed_events(10).is_empty());
    }

    #[test]
    fn test_clear_user_events() {
        let bus = EventBus::new(100);
        bus.subscribe("a", Recorder::new("bad", Mode::Error));
        bus.emit(event("a", "u"));
        bus.emit(event("a", "v"));
        assert_eq!(bus.clear_user_events("u"), 1);
        assert_eq!(bus.history_len(), 1);
        assert_eq!(bus.failed_events(10).len(), 1);
    }

    #[test]
    fn test_sweep_uses_clock() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let bus = EventBus::with_config(BusConfig::default(), clock.clone());
        bus.subscribe("a", Recorder::new("bad", Mode::Error));

        bus.emit(event("a", "u"));
        clock.advance(Duration::hours(20));
        bus.emit(event("a", "u"));
        clock.advance(Duration::hours(5));

        assert_eq!(bus.sweep_dead_letters(), 1);
        assert_eq!(bus.failed_events(10).len(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let bus = EventBus::new(10);
        bus.shutdown();
        bus.shutdown();
        assert!(bus.is_shut_down());
        assert_eq!(bus.try_emit(event("a", "u")), Err(BusError::ShutDown));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let bus = EventBus::new(10);
        let handle = bus
            .spawn_sweeper(StdDuration::from_millis(10))
            .expect("runtime is available");
        bus.shutdown();
        tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("sweeper exits")
            .unwrap();
    }

    #[test]
    fn test_sweeper_needs_runtime() {
        let bus = EventBus::new(10);
        assert!(bus.spawn_sweeper(StdDuration::from_secs(1)).is_none());
    }
}
