//! Analytics agent: records every delivered event into daily metrics and
//! per-user engagement logs, and answers platform and user reporting queries.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use mavericks_protocol::{
    AssessmentCompletedData, DailyLoginData, EventKind, ExerciseSolutionSubmittedData,
    HackathonSubmissionMadeData, ModuleCompletedData, PointsAwardedData, ProfileCreatedData,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::base::{
    dispatch, subscribe_all, Agent, AgentCore, HandlerResult, Outcome, Route, StateStore,
};
use crate::event_bus::{Event, EventBus};

pub const ANALYTICS_AGENT: &str = "AnalyticsAgent";

const NOT_FOUND: &str = "User analytics not found";

/// Days covered by trend reports.
const TREND_DAYS: i64 = 7;
/// Percent change separating a trend from "stable".
const TREND_THRESHOLD: f64 = 5.0;
const ENGAGEMENT_LOG_LIMIT: usize = 1000;
const TOP_USERS: usize = 5;
const TOP_ITEMS: usize = 5;

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub const KPI_DEFINITIONS: [(&str, &str); 8] = [
    ("daily_active_users", "Number of unique users active per day"),
    ("assessment_completion_rate", "Percentage of users completing assessments"),
    ("learning_path_completion_rate", "Percentage of learning paths completed"),
    ("average_session_duration", "Average time users spend on platform"),
    ("user_retention_rate", "Percentage of users returning after first visit"),
    ("hackathon_participation_rate", "Percentage of users participating in hackathons"),
    ("skill_improvement_rate", "Rate of skill level improvements over time"),
    ("platform_engagement_score", "Composite score of user engagement"),
];

// ============================================================================
// Metrics
// ============================================================================

/// One metric as a series of per-day values.
#[derive(Debug, Clone, Default)]
struct Metric {
    /// Cumulative metrics store running totals, counters store per-day sums.
    cumulative: bool,
    values: BTreeMap<NaiveDate, f64>,
}

impl Metric {
    fn value_on(&self, date: NaiveDate) -> f64 {
        if self.cumulative {
            self.values
                .range(..=date)
                .next_back()
                .map_or(0.0, |(_, value)| *value)
        } else {
            self.values.get(&date).copied().unwrap_or(0.0)
        }
    }

    fn total(&self) -> f64 {
        if self.cumulative {
            self.values.values().next_back().copied().unwrap_or(0.0)
        } else {
            self.values.values().sum()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub direction: &'static str,
    pub percentage: f64,
    pub values: Vec<f64>,
    pub dates: Vec<NaiveDate>,
}

/// Platform-wide aggregates. Per-user data lives in the agent's state store.
#[derive(Debug, Default)]
struct Ledger {
    metrics: BTreeMap<String, Metric>,
    daily_unique_users: BTreeMap<NaiveDate, BTreeSet<String>>,
    hourly_activity: BTreeMap<u32, u64>,
    weekday_activity: BTreeMap<u32, u64>,
    path_completions: BTreeMap<String, u64>,
    hackathon_submissions: BTreeMap<String, u64>,
    hackathon_scores: BTreeMap<&'static str, u64>,
}

impl Ledger {
    fn count(&mut self, name: &str, date: NaiveDate, value: f64) {
        let metric = self.metrics.entry(name.to_string()).or_default();
        *metric.values.entry(date).or_default() += value;
    }

    fn accumulate(&mut self, name: &str, date: NaiveDate, value: f64) {
        let metric = self.metrics.entry(name.to_string()).or_insert_with(|| Metric {
            cumulative: true,
            ..Default::default()
        });
        let previous = metric.value_on(date);
        metric.values.insert(date, previous + value);
        // Later days already recorded carry the new amount too.
        for (_, later) in metric.values.range_mut((Excluded(date), Unbounded)) {
            *later += value;
        }
    }

    fn total(&self, name: &str) -> f64 {
        self.metrics.get(name).map_or(0.0, Metric::total)
    }

    fn trend(&self, name: &str, today: NaiveDate, days: i64) -> Trend {
        let dates: Vec<NaiveDate> = (0..days)
            .rev()
            .map(|back| today - Duration::days(back))
            .collect();
        let values: Vec<f64> = dates
            .iter()
            .map(|date| self.metrics.get(name).map_or(0.0, |m| m.value_on(*date)))
            .collect();
        let (direction, percentage) = trend_of(&values);
        Trend {
            direction,
            percentage: round2(percentage),
            values,
            dates,
        }
    }
}

// ============================================================================
// Per-user state
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub total_events: u64,
    pub event_types: BTreeSet<String>,
    /// Seconds between first and last event.
    pub session_duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementRecord {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub day_of_week: u32,
    pub hour_of_day: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRecord {
    pub score: f64,
    pub exercises: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HackathonRecord {
    pub hackathon_id: String,
    pub score: f64,
    pub participated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserAnalytics {
    pub session: SessionStats,
    pub engagement: VecDeque<EngagementRecord>,
    pub assessment_history: Vec<AssessmentRecord>,
    pub hackathon_history: Vec<HackathonRecord>,
    pub login_streak: u32,
    pub max_streak: u32,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserAnalytics {
    fn average_assessment_score(&self) -> Option<f64> {
        mean(&self.assessment_history.iter().map(|a| a.score).collect::<Vec<_>>())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopUser {
    pub user_id: String,
    pub average_score: f64,
    pub total_assessments: usize,
    pub max_streak: u32,
}

// ============================================================================
// Agent
// ============================================================================

pub struct AnalyticsAgent {
    core: AgentCore,
    state: StateStore<UserAnalytics>,
    ledger: Mutex<Ledger>,
}

impl AnalyticsAgent {
    const ROUTES: &'static [Route<Self>] = &[
        (EventKind::PROFILE_CREATED, Self::handle_profile_created),
        (EventKind::ASSESSMENT_COMPLETED, Self::handle_assessment_completed),
        (EventKind::EXERCISE_SOLUTION_SUBMITTED, Self::handle_exercise_submitted),
        (EventKind::LEARNING_MODULE_COMPLETED, Self::handle_learning_progress),
        (EventKind::HACKATHON_SUBMISSION_MADE, Self::handle_hackathon_participation),
        (EventKind::USER_DAILY_LOGIN, Self::handle_user_activity),
        (EventKind::POINTS_AWARDED, Self::handle_points_awarded),
    ];

    pub fn new(bus: &Arc<EventBus>) -> Arc<Self> {
        let agent = Arc::new(Self {
            core: AgentCore::new(ANALYTICS_AGENT, bus),
            state: StateStore::new(),
            ledger: Mutex::new(Ledger::default()),
        });
        subscribe_all(&agent, Self::ROUTES);
        agent
    }

    /// Session, engagement and daily-user bookkeeping shared by every event.
    fn record(&self, event: &Event) {
        let (hour, weekday) = event.hour_and_weekday();
        let date = event.timestamp.date_naive();

        self.state.update(&event.user_id, |user| {
            let session = &mut user.session;
            let first_seen = *session.first_seen.get_or_insert(event.timestamp);
            session.last_seen = Some(event.timestamp);
            session.total_events += 1;
            session.event_types.insert(event.event_type.clone());
            session.session_duration = (event.timestamp - first_seen).num_seconds() as f64;

            if user.engagement.len() >= ENGAGEMENT_LOG_LIMIT {
                user.engagement.pop_front();
            }
            user.engagement.push_back(EngagementRecord {
                event_type: event.event_type.clone(),
                timestamp: event.timestamp,
                day_of_week: weekday,
                hour_of_day: hour,
            });
        });

        let mut ledger = self.ledger.lock();
        ledger.count("daily_events", date, 1.0);
        ledger
            .daily_unique_users
            .entry(date)
            .or_default()
            .insert(event.user_id.clone());
        *ledger.hourly_activity.entry(hour).or_default() += 1;
        *ledger.weekday_activity.entry(weekday).or_default() += 1;
    }

    fn handle_profile_created(&self, event: &Event) -> HandlerResult {
        let data: ProfileCreatedData = event.decode()?;
        let date = event.timestamp.date_naive();
        let source = data.source.as_deref().unwrap_or("direct");

        let mut ledger = self.ledger.lock();
        ledger.count("user_registrations", date, 1.0);
        ledger.accumulate("total_users", date, 1.0);
        ledger.count(&format!("registration_source_{source}"), date, 1.0);

        Outcome::ok(json!({ "status": "user_registration_tracked" }))
    }

    fn handle_assessment_completed(&self, event: &Event) -> HandlerResult {
        let data: AssessmentCompletedData = event.decode()?;
        let results = &data.final_results;
        let date = event.timestamp.date_naive();

        {
            let mut ledger = self.ledger.lock();
            ledger.count("assessments_completed", date, 1.0);
            ledger.accumulate("total_assessment_score", date, results.average_score);
            ledger.accumulate(
                "total_exercises_completed",
                date,
                f64::from(results.total_exercises),
            );
            ledger.count(
                &format!("score_distribution_{}", score_bucket(results.average_score)),
                date,
                1.0,
            );
        }

        self.state.update(&event.user_id, |user| {
            user.assessment_history.push(AssessmentRecord {
                score: results.average_score,
                exercises: results.total_exercises,
                completed_at: event.timestamp,
            });
        });

        Outcome::ok(json!({ "status": "assessment_analytics_tracked" }))
    }

    fn handle_exercise_submitted(&self, event: &Event) -> HandlerResult {
        let data: ExerciseSolutionSubmittedData = event.decode()?;
        let score = data.evaluation_result.as_ref().map_or(0.0, |r| r.score);
        let date = event.timestamp.date_naive();
        let difficulty = data.difficulty.as_deref().unwrap_or("unknown");
        let language = data.language.as_deref().unwrap_or("unknown");

        let mut ledger = self.ledger.lock();
        ledger.count("exercises_submitted", date, 1.0);
        ledger.accumulate("total_exercise_score", date, score);
        ledger.accumulate("total_completion_time", date, data.completion_time);
        ledger.count(&format!("exercises_difficulty_{difficulty}"), date, 1.0);
        ledger.count(&format!("exercises_language_{language}"), date, 1.0);

        Outcome::ok(json!({ "status": "exercise_analytics_tracked" }))
    }

    fn handle_learning_progress(&self, event: &Event) -> HandlerResult {
        let data: ModuleCompletedData = event.decode()?;
        let date = event.timestamp.date_naive();

        let mut ledger = self.ledger.lock();
        ledger.count("learning_modules_completed", date, 1.0);
        ledger.accumulate("total_learning_time", date, data.completion_time.unwrap_or(0.0));
        if data.score >= 80.0 {
            ledger.count("high_performing_modules", date, 1.0);
        }
        if let Some(path_id) = data.path_id.filter(|id| !id.is_empty()) {
            *ledger.path_completions.entry(path_id).or_default() += 1;
        }

        Outcome::ok(json!({ "status": "learning_analytics_tracked" }))
    }

    fn handle_hackathon_participation(&self, event: &Event) -> HandlerResult {
        let data: HackathonSubmissionMadeData = event.decode()?;
        let date = event.timestamp.date_naive();

        {
            let mut ledger = self.ledger.lock();
            ledger.count("hackathon_submissions", date, 1.0);
            ledger.accumulate("total_hackathon_score", date, data.score);
            *ledger.hackathon_scores.entry(score_bucket(data.score)).or_default() += 1;
            if !data.hackathon_id.is_empty() {
                *ledger
                    .hackathon_submissions
                    .entry(data.hackathon_id.clone())
                    .or_default() += 1;
            }
        }

        self.state.update(&event.user_id, |user| {
            user.hackathon_history.push(HackathonRecord {
                hackathon_id: data.hackathon_id,
                score: data.score,
                participated_at: event.timestamp,
            });
        });

        Outcome::ok(json!({ "status": "hackathon_analytics_tracked" }))
    }

    fn handle_user_activity(&self, event: &Event) -> HandlerResult {
        let data: DailyLoginData = event.decode()?;
        let login_at = data.login_time.unwrap_or(event.timestamp);

        self.ledger
            .lock()
            .count("daily_logins", event.timestamp.date_naive(), 1.0);

        self.state.update(&event.user_id, |user| {
            let today = login_at.date_naive();
            match user.last_login.map(|at| at.date_naive()) {
                Some(last) if last == today => {}
                Some(last) if last == today - Duration::days(1) => user.login_streak += 1,
                _ => user.login_streak = 1,
            }
            user.max_streak = user
                .max_streak
                .max(user.login_streak)
                .max(data.current_streak);
            user.last_login = Some(login_at);
        });

        Outcome::ok(json!({ "status": "activity_analytics_tracked" }))
    }

    fn handle_points_awarded(&self, event: &Event) -> HandlerResult {
        let data: PointsAwardedData = event.decode()?;
        let date = event.timestamp.date_naive();
        let reason = if data.reason.is_empty() {
            "unknown"
        } else {
            data.reason.as_str()
        };
        let points = data.points_earned as f64;

        let mut ledger = self.ledger.lock();
        ledger.accumulate("total_points_awarded", date, points);
        ledger.accumulate(&format!("points_source_{reason}"), date, points);

        Outcome::ok(json!({ "status": "gamification_analytics_tracked" }))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_platform_overview(&self) -> Value {
        let now = self.core.now();
        let today = now.date_naive();
        let ledger = self.ledger.lock();

        let total_users = ledger.total("total_users");
        let total_assessments = ledger.total("assessments_completed");
        let daily_active_users = ledger
            .daily_unique_users
            .get(&today)
            .map_or(0, BTreeSet::len);

        json!({
            "overview": {
                "total_users": total_users,
                "daily_active_users": daily_active_users,
                "total_assessments": total_assessments,
                "total_exercises": ledger.total("exercises_submitted"),
                "total_points_awarded": ledger.total("total_points_awarded"),
                "assessment_completion_rate": round2(total_assessments / total_users.max(1.0) * 100.0),
            },
            "trends": {
                "user_growth": ledger.trend("total_users", today, TREND_DAYS),
                "daily_activity": ledger.trend("daily_logins", today, TREND_DAYS),
            },
            "top_performing_users": self.top_performing_users(TOP_USERS),
            "engagement_patterns": engagement_patterns(&ledger),
            "generated_at": now,
        })
    }

    pub fn get_user_analytics(&self, user_id: &str) -> Outcome {
        let Some(user) = self.state.get(user_id) else {
            return Outcome::rejected(NOT_FOUND);
        };

        let mut activity_by_hour: BTreeMap<u32, u64> = BTreeMap::new();
        for record in &user.engagement {
            *activity_by_hour.entry(record.hour_of_day).or_default() += 1;
        }

        Outcome::Ok(json!({
            "user_id": user_id,
            "session_stats": user.session,
            "performance": {
                "total_assessments": user.assessment_history.len(),
                "average_assessment_score": round2(user.average_assessment_score().unwrap_or(0.0)),
                "total_hackathons": user.hackathon_history.len(),
                "max_streak": user.max_streak,
            },
            "activity_patterns": activity_by_hour,
            "engagement_score": engagement_score(&user),
            "skill_progression": skill_progression(&user),
            "recommendations": user_recommendations(&user),
        }))
    }

    pub fn get_learning_path_analytics(&self) -> Value {
        let today = self.core.now().date_naive();
        let ledger = self.ledger.lock();
        let total_modules = ledger.total("learning_modules_completed");
        let high_performing = ledger.total("high_performing_modules");
        let total_time = ledger.total("total_learning_time");

        json!({
            "total_modules_completed": total_modules,
            "completion_quality_rate": round2(high_performing / total_modules.max(1.0) * 100.0),
            "average_time_per_module": round2(total_time / total_modules.max(1.0)),
            "learning_path_effectiveness": {
                "high_performing_modules": high_performing,
                "completion_trend": ledger.trend("learning_modules_completed", today, TREND_DAYS),
            },
            "popular_paths": top_counts(&ledger.path_completions, "path_id", "completions"),
        })
    }

    pub fn get_hackathon_analytics(&self) -> Value {
        let today = self.core.now().date_naive();
        let ledger = self.ledger.lock();
        let total_submissions = ledger.total("hackathon_submissions");
        let total_score = ledger.total("total_hackathon_score");

        let (participants, repeat) = self.state.with_all(|all| {
            all.values()
                .map(|user| user.hackathon_history.len())
                .filter(|count| *count > 0)
                .fold((0usize, 0usize), |(p, r), count| (p + 1, r + usize::from(count > 1)))
        });
        let repeat_rate = repeat as f64 / participants.max(1) as f64 * 100.0;

        let distribution: BTreeMap<&str, u64> = ["excellent", "good", "average", "below_average", "poor"]
            .into_iter()
            .map(|bucket| (bucket, ledger.hackathon_scores.get(bucket).copied().unwrap_or(0)))
            .collect();

        json!({
            "total_submissions": total_submissions,
            "average_score": round2(total_score / total_submissions.max(1.0)),
            "participation_trends": {
                "submission_trend": ledger.trend("hackathon_submissions", today, TREND_DAYS),
                "repeat_participation_rate": round2(repeat_rate),
            },
            "popular_hackathons": top_counts(&ledger.hackathon_submissions, "hackathon_id", "submissions"),
            "performance_distribution": distribution,
        })
    }

    fn top_performing_users(&self, limit: usize) -> Vec<TopUser> {
        let mut users: Vec<TopUser> = self.state.with_all(|all| {
            all.iter()
                .filter_map(|(user_id, user)| {
                    Some(TopUser {
                        user_id: user_id.clone(),
                        average_score: user.average_assessment_score()?,
                        total_assessments: user.assessment_history.len(),
                        max_streak: user.max_streak,
                    })
                })
                .collect()
        });
        users.sort_by(|a, b| {
            b.average_score
                .total_cmp(&a.average_score)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        users.truncate(limit);
        users
    }
}

impl Agent for AnalyticsAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    /// Every delivered event is recorded before type-specific handling.
    fn process_event(&self, event: &Event) -> HandlerResult {
        self.record(event);
        let outcome = dispatch(self, Self::ROUTES, event)?;
        if outcome == Outcome::Ignored {
            debug!(event_type = %event.event_type, "Tracked generic event");
            self.ledger.lock().count(
                &format!("event_count_{}", event.event_type),
                event.timestamp.date_naive(),
                1.0,
            );
            return Outcome::ok(json!({ "status": "generic_event_tracked" }));
        }
        Ok(outcome)
    }

    fn capabilities(&self) -> Value {
        json!({
            "agent_name": ANALYTICS_AGENT,
            "version": "1.0.0",
            "capabilities": [
                "user_behavior_analysis",
                "performance_tracking",
                "engagement_analytics",
                "trend_analysis",
                "kpi_monitoring",
                "custom_reporting",
            ],
            "tracked_metrics": KPI_DEFINITIONS.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            "supported_events": Self::ROUTES.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            "reporting_capabilities": [
                "platform_overview",
                "user_analytics",
                "learning_path_analytics",
                "hackathon_analytics",
            ],
        })
    }

    fn active_users(&self) -> usize {
        self.state.user_count()
    }

    fn user_state(&self, user_id: &str) -> Option<Value> {
        self.state.to_json(user_id)
    }

    /// Drops the user's record and their presence in daily-user sets.
    /// Aggregate counters are kept.
    fn clear_user_state(&self, user_id: &str) {
        self.state.clear(user_id);
        for users in self.ledger.lock().daily_unique_users.values_mut() {
            users.remove(user_id);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Direction and percent change between the means of the two halves.
pub fn trend_of(values: &[f64]) -> (&'static str, f64) {
    if values.len() < 2 {
        return ("stable", 0.0);
    }
    let (first, second) = values.split_at(values.len() / 2);
    let first = mean(first).unwrap_or(0.0);
    let second = mean(second).unwrap_or(0.0);

    let percentage = if first == 0.0 {
        if second > 0.0 { 100.0 } else { 0.0 }
    } else {
        (second - first) / first * 100.0
    };

    let direction = if percentage > TREND_THRESHOLD {
        "increasing"
    } else if percentage < -TREND_THRESHOLD {
        "decreasing"
    } else {
        "stable"
    };
    (direction, percentage)
}

pub fn score_bucket(score: f64) -> &'static str {
    if score >= 90.0 {
        "excellent"
    } else if score >= 80.0 {
        "good"
    } else if score >= 70.0 {
        "average"
    } else if score >= 60.0 {
        "below_average"
    } else {
        "poor"
    }
}

/// 0-100: activity (30), assessments (25), streak (25), hackathons (20).
pub fn engagement_score(user: &UserAnalytics) -> f64 {
    let activity = (user.session.total_events as f64 / 10.0).min(30.0);
    let assessments = (user.assessment_history.len() as f64 * 5.0).min(25.0);
    let streak = f64::from(user.max_streak).min(25.0);
    let hackathons = (user.hackathon_history.len() as f64 * 10.0).min(20.0);
    round2(activity + assessments + streak + hackathons)
}

fn skill_progression(user: &UserAnalytics) -> Value {
    let history = &user.assessment_history;
    let (Some(first), Some(latest)) = (history.first(), history.last()) else {
        return json!({ "status": "insufficient_data" });
    };
    if history.len() < 2 {
        return json!({ "status": "insufficient_data" });
    }

    let improvement = latest.score - first.score;
    let trend = if improvement > TREND_THRESHOLD {
        "improving"
    } else if improvement < -TREND_THRESHOLD {
        "declining"
    } else {
        "stable"
    };
    json!({
        "first_score": first.score,
        "latest_score": latest.score,
        "improvement": round2(improvement),
        "trend": trend,
        "total_assessments": history.len(),
    })
}

fn user_recommendations(user: &UserAnalytics) -> Vec<&'static str> {
    let mut recommendations = Vec::new();
    match user.average_assessment_score() {
        None => recommendations
            .push("Take your first skill assessment to get personalized learning recommendations"),
        Some(avg) if avg < 70.0 => {
            recommendations.push("Focus on fundamental skills through our beginner learning paths")
        }
        Some(avg) if avg > 85.0 => {
            recommendations.push("Consider advanced challenges and hackathon participation")
        }
        Some(_) => {}
    }
    if user.hackathon_history.is_empty() {
        recommendations.push("Participate in hackathons to apply your skills in real challenges");
    }
    if user.max_streak < 7 {
        recommendations.push("Build a daily learning habit to improve your skills consistently");
    }
    recommendations
}

fn engagement_patterns(ledger: &Ledger) -> Value {
    let peak = |activity: &BTreeMap<u32, u64>| {
        activity
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(key, _)| *key)
    };
    let peak_day = peak(&ledger.weekday_activity)
        .and_then(|day| DAY_NAMES.get(day as usize).copied());

    json!({
        "peak_hour": peak(&ledger.hourly_activity),
        "peak_day": peak_day,
        "hourly_distribution": ledger.hourly_activity,
        "daily_distribution": ledger.weekday_activity,
    })
}

fn top_counts(counts: &BTreeMap<String, u64>, key: &str, count_key: &str) -> Vec<Value> {
    let mut ranked: Vec<(&String, &u64)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_ITEMS)
        .map(|(id, count)| json!({ key: id, count_key: count }))
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::{BusConfig, Clock, ManualClock};
    use chrono::TimeZone;

    struct Fixture {
        clock: Arc<ManualClock>,
        bus: Arc<EventBus>,
        agent: Arc<AnalyticsAgent>,
    }

    fn fixture() -> Fixture {
        // A Wednesday
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 10, 14, 0, 0).unwrap()));
        let bus = EventBus::with_config(BusConfig::default(), clock.clone());
        let agent = AnalyticsAgent::new(&bus);
        Fixture { clock, bus, agent }
    }

    fn send(f: &Fixture, kind: &str, user: &str, payload: Value) -> Outcome {
        f.agent
            .process_event(&Event::new(kind, "system", user, payload, f.clock.now()))
            .unwrap()
    }

    fn assessment(average: f64) -> Value {
        json!({ "final_results": { "average_score": average, "total_exercises": 2 } })
    }

    #[test]
    fn test_trend_rule() {
        assert_eq!(trend_of(&[1.0]), ("stable", 0.0));
        assert_eq!(trend_of(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]), ("increasing", 100.0));
        assert_eq!(trend_of(&[0.0; 7]), ("stable", 0.0));
        assert_eq!(trend_of(&[10.0, 10.0, 10.4, 10.4]).0, "stable");
        assert_eq!(trend_of(&[10.0, 10.0, 5.0, 5.0]), ("decreasing", -50.0));
    }

    #[test]
    fn test_counters_and_running_totals() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let mut ledger = Ledger::default();
        ledger.count("logins", day(1), 1.0);
        ledger.count("logins", day(3), 2.0);
        ledger.accumulate("users", day(1), 1.0);
        ledger.accumulate("users", day(3), 2.0);
        ledger.accumulate("users", day(2), 1.0);

        assert_eq!(ledger.total("logins"), 3.0);
        assert_eq!(ledger.total("users"), 4.0);
        assert_eq!(ledger.total("missing"), 0.0);

        let trend = ledger.trend("users", day(4), 4);
        assert_eq!(trend.values, vec![1.0, 2.0, 4.0, 4.0]);
        assert_eq!(trend.dates[0], day(1));
        assert_eq!(trend.direction, "increasing");
    }

    #[test]
    fn test_every_delivered_event_is_recorded() {
        let f = fixture();
        f.bus.emit(Event::new(EventKind::PROFILE_CREATED, "system", "u1", json!({}), f.clock.now()));
        f.bus.emit(Event::new(
            EventKind::PROFILE_CREATED,
            "system",
            "u2",
            json!({ "source": "referral" }),
            f.clock.now(),
        ));

        let user = f.agent.user_state("u1").unwrap();
        assert_eq!(user["session"]["total_events"], 1);
        assert_eq!(user["engagement"][0]["hour_of_day"], 14);
        assert_eq!(user["engagement"][0]["day_of_week"], 2);

        let overview = f.agent.get_platform_overview();
        assert_eq!(overview["overview"]["total_users"], 2.0);
        assert_eq!(overview["overview"]["daily_active_users"], 2);
        assert_eq!(overview["trends"]["user_growth"]["direction"], "increasing");
        assert_eq!(overview["engagement_patterns"]["peak_hour"], 14);
        assert_eq!(overview["engagement_patterns"]["peak_day"], "Wednesday");
    }

    #[test]
    fn test_unrouted_event_is_tracked_generically() {
        let f = fixture();
        let outcome = send(&f, "custom.event", "u1", json!({})).into_value();
        assert_eq!(outcome["status"], "generic_event_tracked");
        assert_eq!(f.agent.ledger.lock().total("event_count_custom.event"), 1.0);
    }

    #[test]
    fn test_user_analytics() {
        let f = fixture();
        assert_eq!(f.agent.get_user_analytics("u1"), Outcome::rejected(NOT_FOUND));

        send(&f, EventKind::ASSESSMENT_COMPLETED, "u1", assessment(60.0));
        f.clock.advance(Duration::hours(1));
        send(&f, EventKind::ASSESSMENT_COMPLETED, "u1", assessment(80.0));

        let report = f.agent.get_user_analytics("u1").into_value();
        assert_eq!(report["performance"]["total_assessments"], 2);
        assert_eq!(report["performance"]["average_assessment_score"], 70.0);
        assert_eq!(report["session_stats"]["session_duration"], 3600.0);
        assert_eq!(report["activity_patterns"]["14"], 1);
        assert_eq!(report["activity_patterns"]["15"], 1);
        assert_eq!(report["skill_progression"]["trend"], "improving");
        assert_eq!(report["skill_progression"]["improvement"], 20.0);
        assert_eq!(report["engagement_score"], 10.2);
        assert_eq!(
            report["recommendations"],
            json!([
                "Participate in hackathons to apply your skills in real challenges",
                "Build a daily learning habit to improve your skills consistently",
            ])
        );

        let overview = f.agent.get_platform_overview();
        assert_eq!(overview["top_performing_users"][0]["user_id"], "u1");
        assert_eq!(overview["top_performing_users"][0]["average_score"], 70.0);
    }

    #[test]
    fn test_login_streak() {
        let f = fixture();
        for _ in 0..3 {
            send(&f, EventKind::USER_DAILY_LOGIN, "u1", json!({}));
            f.clock.advance(Duration::days(1));
        }
        send(&f, EventKind::USER_DAILY_LOGIN, "u1", json!({}));
        let user = f.agent.user_state("u1").unwrap();
        assert_eq!(user["login_streak"], 4);

        f.clock.advance(Duration::days(5));
        send(&f, EventKind::USER_DAILY_LOGIN, "u1", json!({ "current_streak": 9 }));
        let user = f.agent.user_state("u1").unwrap();
        assert_eq!(user["login_streak"], 1);
        assert_eq!(user["max_streak"], 9);
    }

    #[test]
    fn test_learning_and_hackathon_reports() {
        let f = fixture();
        send(
            &f,
            EventKind::LEARNING_MODULE_COMPLETED,
            "u1",
            json!({ "path_id": "python_fundamentals", "completion_time": 3.0, "score": 90.0 }),
        );
        send(
            &f,
            EventKind::LEARNING_MODULE_COMPLETED,
            "u2",
            json!({ "path_id": "python_fundamentals", "completion_time": 1.0, "score": 50.0 }),
        );
        let learning = f.agent.get_learning_path_analytics();
        assert_eq!(learning["total_modules_completed"], 2.0);
        assert_eq!(learning["completion_quality_rate"], 50.0);
        assert_eq!(learning["average_time_per_module"], 2.0);
        assert_eq!(learning["popular_paths"][0]["completions"], 2);

        for (user, score) in [("u1", 95.0), ("u1", 75.0), ("u2", 40.0)] {
            send(
                &f,
                EventKind::HACKATHON_SUBMISSION_MADE,
                user,
                json!({ "hackathon_id": "h1", "score": score }),
            );
        }
        let hackathons = f.agent.get_hackathon_analytics();
        assert_eq!(hackathons["total_submissions"], 3.0);
        assert_eq!(hackathons["average_score"], 70.0);
        assert_eq!(hackathons["participation_trends"]["repeat_participation_rate"], 50.0);
        assert_eq!(hackathons["performance_distribution"]["excellent"], 1);
        assert_eq!(hackathons["performance_distribution"]["poor"], 1);
        assert_eq!(hackathons["popular_hackathons"][0]["hackathon_id"], "h1");
    }

    #[test]
    fn test_module_without_path_is_not_ranked() {
        let f = fixture();
        send(&f, EventKind::LEARNING_MODULE_COMPLETED, "u1", json!({ "score": 70.0 }));
        send(&f, EventKind::LEARNING_MODULE_COMPLETED, "u1", json!({ "path_id": "", "score": 70.0 }));
        let learning = f.agent.get_learning_path_analytics();
        assert_eq!(learning["total_modules_completed"], 2.0);
        assert_eq!(learning["popular_paths"], json!([]));
    }

    #[test]
    fn test_engagement_log_keeps_newest_records() {
        let f = fixture();
        send(&f, "first.event", "u1", json!({}));
        for _ in 0..ENGAGEMENT_LOG_LIMIT {
            send(&f, "custom.event", "u1", json!({}));
        }

        let user = f.agent.user_state("u1").unwrap();
        let engagement = user["engagement"].as_array().unwrap();
        assert_eq!(engagement.len(), ENGAGEMENT_LOG_LIMIT);
        assert!(engagement.iter().all(|record| record["event_type"] == "custom.event"));
        assert_eq!(user["session"]["total_events"], ENGAGEMENT_LOG_LIMIT + 1);
    }

    #[test]
    fn test_points_and_clear() {
        let f = fixture();
        send(
            &f,
            EventKind::POINTS_AWARDED,
            "u1",
            json!({ "points_earned": 400, "reason": "assessment_completed" }),
        );
        assert_eq!(f.agent.get_platform_overview()["overview"]["total_points_awarded"], 400.0);
        assert_eq!(f.agent.ledger.lock().total("points_source_assessment_completed"), 400.0);

        f.agent.clear_user_state("u1");
        assert_eq!(f.agent.active_users(), 0);
        assert_eq!(f.agent.get_platform_overview()["overview"]["daily_active_users"], 0);
    }
}
