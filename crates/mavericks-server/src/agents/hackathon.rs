//! Hackathon agent: challenge generation, participation windows, automated
//! scoring and per-hackathon leaderboards.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mavericks_protocol::{
    Challenge, Difficulty, EventKind, HackathonCreateRequestedData, HackathonCreatedData,
    HackathonEvaluationCompletedData, HackathonJoinRequestedData, HackathonStatus,
    HackathonSubmissionMadeData, HackathonSummary, ParticipantJoinedData, SubmissionData,
    SubmissionReceivedData,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::base::{
    dispatch, subscribe_all, Agent, AgentCore, HandlerResult, Outcome, Route, StateStore,
};
use crate::event_bus::{Event, EventBus};

pub const HACKATHON_AGENT: &str = "HackathonAgent";

/// Weights reported as evaluation criteria.
const SCORING_WEIGHTS: [(&str, f64); 5] = [
    ("automated_tests", 0.4),
    ("code_quality", 0.25),
    ("creativity", 0.15),
    ("documentation", 0.1),
    ("presentation", 0.1),
];

const AUTOMATED_WEIGHT: f64 = 0.6;
const MANUAL_WEIGHT: f64 = 0.4;

// ============================================================================
// Challenge templates
// ============================================================================

struct ChallengeTemplate {
    theme: &'static str,
    difficulty: Difficulty,
    title: &'static str,
    description: &'static str,
    requirements: &'static [&'static str],
    judging_criteria: &'static [(&'static str, f64)],
    time_limit: u32,
    max_score: u32,
}

impl ChallengeTemplate {
    fn build(&self) -> Challenge {
        Challenge {
            title: self.title.to_string(),
            description: self.description.to_string(),
            requirements: self.requirements.iter().map(|r| r.to_string()).collect(),
            judging_criteria: self
                .judging_criteria
                .iter()
                .map(|(name, weight)| (name.to_string(), *weight))
                .collect(),
            time_limit: self.time_limit,
            max_score: self.max_score,
        }
    }
}

const CHALLENGE_TEMPLATES: &[ChallengeTemplate] = &[
    ChallengeTemplate {
        theme: "web_development",
        difficulty: Difficulty::Beginner,
        title: "Personal Portfolio Website",
        description: "Create a responsive portfolio website showcasing your skills",
        requirements: &[
            "Responsive design (mobile-friendly)",
            "At least 3 sections (about, projects, contact)",
            "Clean, modern UI design",
            "Working contact form",
        ],
        judging_criteria: &[
            ("functionality", 0.3),
            ("design", 0.3),
            ("code_quality", 0.2),
            ("creativity", 0.2),
        ],
        time_limit: 180,
        max_score: 100,
    },
    ChallengeTemplate {
        theme: "web_development",
        difficulty: Difficulty::Intermediate,
        title: "Task Management App",
        description: "Build a full-stack task management application",
        requirements: &[
            "User authentication system",
            "CRUD operations for tasks",
            "Task filtering and sorting",
            "Data persistence (database)",
            "RESTful API design",
        ],
        judging_criteria: &[
            ("functionality", 0.35),
            ("architecture", 0.25),
            ("user_experience", 0.2),
            ("code_quality", 0.2),
        ],
        time_limit: 300,
        max_score: 100,
    },
    ChallengeTemplate {
        theme: "algorithm",
        difficulty: Difficulty::Beginner,
        title: "Data Structure Implementation",
        description: "Implement and optimize common data structures",
        requirements: &[
            "Implement at least 3 data structures",
            "Include time/space complexity analysis",
            "Comprehensive test cases",
            "Performance benchmarking",
        ],
        judging_criteria: &[
            ("correctness", 0.4),
            ("efficiency", 0.3),
            ("code_quality", 0.2),
            ("documentation", 0.1),
        ],
        time_limit: 240,
        max_score: 100,
    },
    ChallengeTemplate {
        theme: "ai_ml",
        difficulty: Difficulty::Intermediate,
        title: "Predictive Analytics Challenge",
        description: "Build a machine learning model for prediction",
        requirements: &[
            "Data preprocessing and cleaning",
            "Feature engineering",
            "Model training and validation",
            "Performance metrics and evaluation",
            "Deployment-ready solution",
        ],
        judging_criteria: &[
            ("model_accuracy", 0.35),
            ("feature_engineering", 0.25),
            ("code_organization", 0.2),
            ("documentation", 0.2),
        ],
        time_limit: 360,
        max_score: 100,
    },
];

/// Requirement keyword -> terms that satisfy it.
const REQUIREMENT_KEYWORDS: &[(&str, &[&str])] = &[
    ("responsive", &["responsive", "mobile", "media query"]),
    ("database", &["database", "db", "sql", "mongodb", "postgres"]),
    ("authentication", &["auth", "login", "signup", "user"]),
    ("api", &["api", "endpoint", "rest", "graphql"]),
    ("test", &["test", "testing", "jest", "pytest"]),
];

const INNOVATIVE_TERMS: &[&str] = &[
    "unique",
    "innovative",
    "creative",
    "original",
    "novel",
    "ai",
    "machine learning",
    "automation",
    "real-time",
    "visualization",
    "analytics",
    "dashboard",
];

const DOC_INDICATORS: &[&str] = &[
    "installation",
    "setup",
    "usage",
    "features",
    "requirements",
    "dependencies",
    "api",
    "examples",
];

fn challenge_for(theme: &str, difficulty: Difficulty) -> Option<Challenge> {
    CHALLENGE_TEMPLATES
        .iter()
        .find(|t| t.theme == theme && t.difficulty == difficulty)
        .map(ChallengeTemplate::build)
}

// ============================================================================
// State
// ============================================================================

/// Automated scoring is done; a judge has not reviewed yet.
pub const EVALUATION_SCORED: &str = "scored";
/// A judge's manual scores have been folded in.
pub const EVALUATION_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub user_id: String,
    pub team_name: String,
    pub joined_at: DateTime<Utc>,
    pub submission_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub score: u32,
    pub max_score: u32,
    pub feedback: Vec<String>,
    pub score_breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub user_id: String,
    pub team_name: String,
    pub submission_data: SubmissionData,
    pub submitted_at: DateTime<Utc>,
    pub evaluation_status: &'static str,
    #[serde(flatten)]
    pub evaluation: Evaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub manual_scores: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub judge_feedback: String,
}

impl Submission {
    /// Judged score when available, otherwise the automated one.
    pub fn ranking_score(&self) -> f64 {
        self.final_score
            .unwrap_or_else(|| f64::from(self.evaluation.score))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub team_name: String,
    pub score: f64,
    pub submitted_at: DateTime<Utc>,
    pub evaluation_status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Hackathon {
    pub id: String,
    pub title: String,
    pub description: String,
    pub theme: String,
    pub difficulty: Difficulty,
    pub challenge: Challenge,
    pub duration_hours: u32,
    pub max_participants: usize,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub participants: Vec<Participant>,
    pub submissions: BTreeMap<String, Submission>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl Hackathon {
    /// Lifecycle stage at `now`. Past the deadline a hackathon stays in
    /// judging until every submission has a judge's review.
    pub fn status(&self, now: DateTime<Utc>) -> HackathonStatus {
        if now < self.start_time {
            HackathonStatus::Upcoming
        } else if now <= self.end_time {
            HackathonStatus::Active
        } else if self
            .submissions
            .values()
            .all(|s| s.evaluation_status == EVALUATION_COMPLETED)
        {
            HackathonStatus::Completed
        } else {
            HackathonStatus::Judging
        }
    }

    pub fn summary(&self, now: DateTime<Utc>) -> HackathonSummary {
        HackathonSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            theme: self.theme.clone(),
            difficulty: self.difficulty,
            challenge: self.challenge.clone(),
            duration_hours: self.duration_hours,
            max_participants: self.max_participants,
            status: self.status(now),
            created_by: self.created_by.clone(),
            created_at: Some(self.created_at),
            start_time: Some(self.start_time),
            end_time: Some(self.end_time),
        }
    }

    fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.leaderboard
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.rank)
    }

    /// Rebuild the leaderboard: one entry per submitter, best score first.
    fn rerank(&mut self) {
        let mut entries: Vec<LeaderboardEntry> = self
            .submissions
            .values()
            .map(|s| LeaderboardEntry {
                rank: 0,
                user_id: s.user_id.clone(),
                team_name: s.team_name.clone(),
                score: s.ranking_score(),
                submitted_at: s.submitted_at,
                evaluation_status: s.evaluation_status,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.submitted_at.cmp(&b.submitted_at))
        });
        for (idx, entry) in entries.iter_mut().enumerate() {
            entry.rank = idx + 1;
        }
        self.leaderboard = entries;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserHackathon {
    pub hackathon_id: String,
    pub title: String,
    pub status: HackathonStatus,
    pub theme: String,
    pub difficulty: Difficulty,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub submission_status: &'static str,
    pub score: f64,
    pub rank: Option<usize>,
}

// ============================================================================
// Agent
// ============================================================================

/// Hackathons are keyed by hackathon id, not by user.
pub struct HackathonAgent {
    core: AgentCore,
    hackathons: StateStore<Hackathon>,
}

impl HackathonAgent {
    const ROUTES: &'static [Route<Self>] = &[
        (EventKind::HACKATHON_CREATE_REQUESTED, Self::handle_creation),
        (EventKind::HACKATHON_JOIN_REQUESTED, Self::handle_join_request),
        (EventKind::HACKATHON_SUBMISSION_MADE, Self::handle_submission),
        (EventKind::HACKATHON_EVALUATION_COMPLETED, Self::handle_evaluation_completed),
    ];

    pub fn new(bus: &Arc<EventBus>) -> Arc<Self> {
        let agent = Arc::new(Self {
            core: AgentCore::new(HACKATHON_AGENT, bus),
            hackathons: StateStore::new(),
        });
        subscribe_all(&agent, Self::ROUTES);
        agent
    }

    fn handle_creation(&self, event: &Event) -> HandlerResult {
        let data: HackathonCreateRequestedData = event.decode()?;
        let Some(challenge) = challenge_for(&data.theme, data.difficulty) else {
            return Ok(Outcome::rejected(format!(
                "No challenges available for theme: {}, difficulty: {}",
                data.theme,
                data.difficulty.as_str()
            )));
        };

        let now = self.core.now();
        let start_time = data
            .start_time
            .or_else(|| now.checked_add_signed(Duration::hours(1)));
        let Some((start_time, end_time)) = start_time.and_then(|start_time| {
            let end_time = start_time.checked_add_signed(Duration::hours(i64::from(data.duration_hours)))?;
            Some((start_time, end_time))
        }) else {
            return Ok(Outcome::rejected("Invalid hackathon schedule"));
        };
        let spaced_theme = data.theme.replace('_', " ");
        let hackathon = Hackathon {
            id: format!(
                "hackathon_{}_{}_{}",
                data.theme,
                now.timestamp(),
                &Uuid::new_v4().simple().to_string()[..8]
            ),
            title: format!("{} Challenge", title_case(&spaced_theme)),
            description: format!("A {} level {} hackathon", data.difficulty.as_str(), spaced_theme),
            theme: data.theme,
            difficulty: data.difficulty,
            challenge,
            duration_hours: data.duration_hours,
            max_participants: data.max_participants,
            created_by: event.user_id.clone(),
            created_at: now,
            start_time,
            end_time,
            participants: Vec::new(),
            submissions: BTreeMap::new(),
            leaderboard: Vec::new(),
        };
        let summary = hackathon.summary(now);
        let id = hackathon.id.clone();
        self.hackathons.insert(&id, hackathon);

        info!(hackathon_id = %summary.id, created_by = %event.user_id, "Hackathon created");

        self.core.emit_event(
            EventKind::HACKATHON_CREATED,
            None,
            &event.user_id,
            HackathonCreatedData {
                hackathon_id: summary.id.clone(),
                hackathon: summary.clone(),
                registration_open: true,
            },
        );

        Outcome::ok(json!({
            "status": "hackathon_created",
            "hackathon_id": summary.id,
            "hackathon": summary,
        }))
    }

    fn handle_join_request(&self, event: &Event) -> HandlerResult {
        let data: HackathonJoinRequestedData = event.decode()?;
        let team_name = data.team_name.unwrap_or_else(|| event.user_id.clone());
        let now = self.core.now();

        let joined = self.hackathons.update_existing(&data.hackathon_id, |hackathon| {
            if hackathon.status(now) != HackathonStatus::Upcoming {
                return Err("Hackathon is not accepting new participants");
            }
            if hackathon.participants.len() >= hackathon.max_participants {
                return Err("Hackathon is full");
            }
            if hackathon.participants.iter().any(|p| p.user_id == event.user_id) {
                return Err("Already registered for this hackathon");
            }
            hackathon.participants.push(Participant {
                user_id: event.user_id.clone(),
                team_name: team_name.clone(),
                joined_at: now,
                submission_status: "not_submitted",
                submission_time: None,
            });
            Ok(hackathon.participants.len())
        });
        let total_participants = match joined {
            None => return Ok(Outcome::rejected("Hackathon not found")),
            Some(Err(reason)) => return Ok(Outcome::rejected(reason)),
            Some(Ok(total)) => total,
        };

        self.core.emit_event(
            EventKind::HACKATHON_PARTICIPANT_JOINED,
            None,
            &event.user_id,
            ParticipantJoinedData {
                hackathon_id: data.hackathon_id.clone(),
                team_name: team_name.clone(),
                total_participants,
            },
        );

        Outcome::ok(json!({
            "status": "joined_successfully",
            "hackathon_id": data.hackathon_id,
            "team_name": team_name,
        }))
    }

    fn handle_submission(&self, event: &Event) -> HandlerResult {
        let data: HackathonSubmissionMadeData = event.decode()?;
        let now = self.core.now();

        let received = self.hackathons.update_existing(&data.hackathon_id, |hackathon| {
            let Some(participant) = hackathon
                .participants
                .iter_mut()
                .find(|p| p.user_id == event.user_id)
            else {
                return Err("Not registered for this hackathon");
            };
            if now < hackathon.start_time {
                return Err("Hackathon has not started yet");
            }
            if now > hackathon.end_time {
                return Err("Hackathon submission deadline has passed");
            }

            participant.submission_status = "submitted";
            participant.submission_time = Some(now);
            let submission = Submission {
                user_id: event.user_id.clone(),
                team_name: participant.team_name.clone(),
                evaluation: evaluate_submission(&data.submission_data, &hackathon.challenge),
                submission_data: data.submission_data.clone(),
                submitted_at: now,
                evaluation_status: EVALUATION_SCORED,
                final_score: None,
                manual_scores: BTreeMap::new(),
                judge_feedback: String::new(),
            };
            let evaluation = submission.evaluation.clone();
            hackathon.submissions.insert(event.user_id.clone(), submission);
            hackathon.rerank();
            Ok((evaluation, hackathon.rank_of(&event.user_id)))
        });
        let (evaluation, rank) = match received {
            None => return Ok(Outcome::rejected("Hackathon not found")),
            Some(Err(reason)) => return Ok(Outcome::rejected(reason)),
            Some(Ok(received)) => received,
        };

        info!(
            hackathon_id = %data.hackathon_id,
            user_id = %event.user_id,
            score = evaluation.score,
            "Hackathon submission scored"
        );

        self.core.emit_event(
            EventKind::HACKATHON_SUBMISSION_RECEIVED,
            None,
            &event.user_id,
            SubmissionReceivedData {
                hackathon_id: data.hackathon_id,
                score: evaluation.score,
                rank,
            },
        );

        Outcome::ok(json!({
            "status": "submission_received",
            "score": evaluation.score,
            "feedback": evaluation.feedback,
            "rank": rank,
        }))
    }

    fn handle_evaluation_completed(&self, event: &Event) -> HandlerResult {
        let data: HackathonEvaluationCompletedData = event.decode()?;

        let judged = self.hackathons.update_existing(&data.hackathon_id, |hackathon| {
            let submission = hackathon.submissions.get_mut(&data.evaluated_user_id)?;
            let final_score = combine_scores(f64::from(submission.evaluation.score), &data.manual_scores);
            submission.final_score = Some(final_score);
            submission.manual_scores = data.manual_scores.clone();
            submission.judge_feedback = data.judge_feedback.clone();
            submission.evaluation_status = EVALUATION_COMPLETED;
            hackathon.rerank();
            Some(final_score)
        });
        let Some(final_score) = judged.flatten() else {
            return Ok(Outcome::rejected("Submission not found"));
        };

        Outcome::ok(json!({ "status": "evaluation_completed", "final_score": final_score }))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_hackathon_status(&self, hackathon_id: &str) -> Outcome {
        let now = self.core.now();
        let status = self.hackathons.read(hackathon_id, |hackathon| {
            let summary = hackathon.summary(now);
            let time_remaining = if summary.status == HackathonStatus::Active {
                (hackathon.end_time - now).num_seconds().max(0)
            } else {
                0
            };
            json!({
                "hackathon": summary,
                "participants": hackathon.participants,
                "leaderboard": hackathon.leaderboard,
                "time_remaining": time_remaining,
                "submissions_count": hackathon.submissions.len(),
                "participants_count": hackathon.participants.len(),
            })
        });
        match status {
            Some(status) => Outcome::Ok(status),
            None => Outcome::rejected("Hackathon not found"),
        }
    }

    /// Hackathons the user has joined, with their standing in each.
    pub fn get_user_hackathons(&self, user_id: &str) -> Vec<UserHackathon> {
        let now = self.core.now();
        self.hackathons.with_all(|all| {
            let mut joined: Vec<UserHackathon> = all
                .values()
                .filter(|h| h.participants.iter().any(|p| p.user_id == user_id))
                .map(|h| {
                    let submission = h.submissions.get(user_id);
                    UserHackathon {
                        hackathon_id: h.id.clone(),
                        title: h.title.clone(),
                        status: h.status(now),
                        theme: h.theme.clone(),
                        difficulty: h.difficulty,
                        start_time: h.start_time,
                        end_time: h.end_time,
                        submission_status: submission.map_or("not_submitted", |s| s.evaluation_status),
                        score: submission.map_or(0.0, Submission::ranking_score),
                        rank: h.rank_of(user_id),
                    }
                })
                .collect();
            joined.sort_by_key(|h| h.start_time);
            joined
        })
    }

    pub fn list_hackathons(&self) -> Vec<HackathonSummary> {
        let now = self.core.now();
        self.hackathons.with_all(|all| {
            let mut summaries: Vec<HackathonSummary> = all.values().map(|h| h.summary(now)).collect();
            summaries.sort_by_key(|s| s.start_time);
            summaries
        })
    }

    /// Move a hackathon's window. Returns false for an unknown id.
    pub fn reschedule(&self, hackathon_id: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> bool {
        self.core.exclusive(|| {
            self.hackathons
                .update_existing(hackathon_id, |hackathon| {
                    hackathon.start_time = start_time;
                    hackathon.end_time = end_time;
                })
                .is_some()
        })
    }
}

impl Agent for HackathonAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn process_event(&self, event: &Event) -> HandlerResult {
        dispatch(self, Self::ROUTES, event)
    }

    fn capabilities(&self) -> Value {
        let themes: BTreeSet<&str> = CHALLENGE_TEMPLATES.iter().map(|t| t.theme).collect();
        json!({
            "agent_name": HACKATHON_AGENT,
            "version": "1.0.0",
            "capabilities": [
                "challenge_generation",
                "automated_evaluation",
                "leaderboard_management",
                "team_formation",
                "submission_tracking",
                "judge_dashboard",
            ],
            "themes": themes,
            "difficulty_levels": ["beginner", "intermediate", "advanced"],
            "evaluation_criteria": SCORING_WEIGHTS.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            "hackathon_statuses": [
                HackathonStatus::Upcoming,
                HackathonStatus::Active,
                HackathonStatus::Judging,
                HackathonStatus::Completed,
                HackathonStatus::Cancelled,
            ],
            "supported_events": Self::ROUTES.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            "emitted_events": [
                EventKind::HACKATHON_CREATED,
                EventKind::HACKATHON_PARTICIPANT_JOINED,
                EventKind::HACKATHON_SUBMISSION_RECEIVED,
            ],
        })
    }

    /// Distinct users registered for any hackathon.
    fn active_users(&self) -> usize {
        self.hackathons.with_all(|all| {
            all.values()
                .flat_map(|h| h.participants.iter().map(|p| p.user_id.as_str()))
                .collect::<BTreeSet<_>>()
                .len()
        })
    }

    fn user_state(&self, user_id: &str) -> Option<Value> {
        let joined = self.get_user_hackathons(user_id);
        if joined.is_empty() {
            return None;
        }
        serde_json::to_value(joined).ok()
    }

    /// Withdraw the user from every hackathon and drop their submissions.
    fn clear_user_state(&self, user_id: &str) {
        let ids: Vec<String> = self.hackathons.with_all(|all| all.keys().cloned().collect());
        for id in ids {
            self.hackathons.update_existing(&id, |hackathon| {
                hackathon.participants.retain(|p| p.user_id != user_id);
                if hackathon.submissions.remove(user_id).is_some() {
                    hackathon.rerank();
                }
            });
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

pub fn evaluate_submission(submission: &SubmissionData, challenge: &Challenge) -> Evaluation {
    let mut feedback = Vec::with_capacity(challenge.requirements.len());
    let mut met = 0usize;
    for requirement in &challenge.requirements {
        if check_requirement(submission, requirement) {
            met += 1;
            feedback.push(format!("✓ {requirement}"));
        } else {
            feedback.push(format!("✗ {requirement}"));
        }
    }

    let requirements = if challenge.requirements.is_empty() {
        0.0
    } else {
        met as f64 / challenge.requirements.len() as f64 * 40.0
    };
    let code_quality = code_quality_score(submission);
    let creativity = creativity_score(submission);
    let documentation = documentation_score(submission);

    let total = requirements + code_quality * 0.3 + creativity * 0.2 + documentation * 0.1;

    Evaluation {
        score: (total as u32).min(challenge.max_score),
        max_score: challenge.max_score,
        feedback,
        score_breakdown: BTreeMap::from([
            ("requirements".to_string(), requirements),
            ("code_quality".to_string(), code_quality),
            ("creativity".to_string(), creativity),
            ("documentation".to_string(), documentation),
        ]),
    }
}

/// Keyword requirements need a matching term in the description or code;
/// any other requirement is met by handing in code at all.
fn check_requirement(submission: &SubmissionData, requirement: &str) -> bool {
    let requirement = requirement.to_lowercase();
    let description = submission.description.to_lowercase();
    let code: Vec<String> = submission.code_files.values().map(|c| c.to_lowercase()).collect();

    match REQUIREMENT_KEYWORDS.iter().find(|(key, _)| requirement.contains(key)) {
        Some((_, terms)) => terms
            .iter()
            .any(|term| description.contains(term) || code.iter().any(|c| c.contains(term))),
        None => !submission.code_files.is_empty(),
    }
}

fn code_quality_score(submission: &SubmissionData) -> f64 {
    if submission.code_files.is_empty() {
        return 0.0;
    }
    let code = submission
        .code_files
        .values()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut score = 50.0;
    if code.contains("function") || code.contains("def ") {
        score += 10.0;
    }
    if code.contains("class") {
        score += 5.0;
    }
    if code.contains("import") {
        score += 5.0;
    }
    if code.contains('#') || code.contains("//") || code.contains("/*") {
        score += 10.0;
    }
    if ["try", "catch", "except", "error"].iter().any(|t| code.contains(t)) {
        score += 10.0;
    }
    f64::min(score, 100.0)
}

fn creativity_score(submission: &SubmissionData) -> f64 {
    let description = submission.description.to_lowercase();
    let hits = INNOVATIVE_TERMS.iter().filter(|t| description.contains(*t)).count();
    let features = (submission.features.len() * 5).min(20);
    f64::min(30.0 + (hits * 5 + features) as f64, 100.0)
}

fn documentation_score(submission: &SubmissionData) -> f64 {
    if submission.readme.is_empty() && submission.description.is_empty() {
        return 0.0;
    }
    let docs = format!("{} {}", submission.readme, submission.description).to_lowercase();
    let hits = DOC_INDICATORS.iter().filter(|i| docs.contains(*i)).count();
    f64::min(20.0 + hits as f64 * 10.0, 100.0)
}

/// Blend the automated score with the mean of a judge's scores.
pub fn combine_scores(automated: f64, manual: &BTreeMap<String, f64>) -> f64 {
    if manual.is_empty() {
        return automated;
    }
    let mean = manual.values().sum::<f64>() / manual.len() as f64;
    automated * AUTOMATED_WEIGHT + mean * MANUAL_WEIGHT
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
