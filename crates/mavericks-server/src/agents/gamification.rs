//! Gamification agent: points, levels, tiered achievements, daily streaks and
//! leaderboards.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use mavericks_protocol::{
    AchievementKind, AchievementTier, AssessmentCompletedData, AwardedAchievement, EventKind,
    ExerciseSolutionSubmittedData, GamificationInitializedData, HackathonSubmissionMadeData,
    ModuleCompletedData, PointsAwardedData,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::base::{
    dispatch, subscribe_all, Agent, AgentCore, HandlerResult, Outcome, Route, StateStore,
};
use crate::event_bus::{Event, EventBus};

pub const GAMIFICATION_AGENT: &str = "GamificationAgent";

const NOT_FOUND: &str = "Gamification profile not found";

// ============================================================================
// Point table
// ============================================================================

pub mod points {
    pub const PROFILE_CREATED: u64 = 100;
    pub const FIRST_ASSESSMENT: u64 = 200;
    pub const EXERCISE_COMPLETED: u64 = 50;
    pub const PERFECT_SOLUTION: u64 = 100;
    pub const FAST_SOLUTION: u64 = 75;
    pub const LEARNING_MODULE: u64 = 150;
    pub const HACKATHON_PARTICIPATION: u64 = 300;
    pub const HACKATHON_WIN: u64 = 1000;
    pub const DAILY_LOGIN: u64 = 25;
    pub const WEEKLY_STREAK: u64 = 200;
    pub const MONTHLY_STREAK: u64 = 500;

    pub const ALL: &[(&str, u64)] = &[
        ("profile_created", PROFILE_CREATED),
        ("first_assessment", FIRST_ASSESSMENT),
        ("exercise_completed", EXERCISE_COMPLETED),
        ("perfect_solution", PERFECT_SOLUTION),
        ("fast_solution", FAST_SOLUTION),
        ("learning_module", LEARNING_MODULE),
        ("hackathon_participation", HACKATHON_PARTICIPATION),
        ("hackathon_win", HACKATHON_WIN),
        ("daily_login", DAILY_LOGIN),
        ("weekly_streak", WEEKLY_STREAK),
        ("monthly_streak", MONTHLY_STREAK),
    ];
}

/// Minutes under which a solution earns the speed bonus.
const FAST_SOLUTION_MINUTES: f64 = 15.0;

pub const LEADERBOARD_CATEGORIES: [&str; 7] = [
    "total_points",
    "monthly_points",
    "assessment_scores",
    "exercise_completion",
    "hackathon_wins",
    "learning_streaks",
    "skill_certifications",
];

// ============================================================================
// Achievement catalog
// ============================================================================

struct AchievementSpec {
    kind: AchievementKind,
    name: &'static str,
    description: &'static str,
    points: u64,
    /// Thresholds in tier order.
    tiers: [(AchievementTier, f64, &'static str); 4],
}

static ACHIEVEMENTS: [AchievementSpec; 6] = [
    AchievementSpec {
        kind: AchievementKind::FirstSteps,
        name: "First Steps",
        description: "Complete your first coding exercise",
        points: 100,
        tiers: [
            (AchievementTier::Bronze, 1.0, "Complete 1 exercise"),
            (AchievementTier::Silver, 10.0, "Complete 10 exercises"),
            (AchievementTier::Gold, 50.0, "Complete 50 exercises"),
            (AchievementTier::Platinum, 100.0, "Complete 100 exercises"),
        ],
    },
    AchievementSpec {
        kind: AchievementKind::SkillMaster,
        name: "Skill Master",
        description: "Achieve high proficiency in programming skills",
        points: 200,
        tiers: [
            (AchievementTier::Bronze, 80.0, "Score 80% average"),
            (AchievementTier::Silver, 85.0, "Score 85% average"),
            (AchievementTier::Gold, 90.0, "Score 90% average"),
            (AchievementTier::Platinum, 95.0, "Score 95% average"),
        ],
    },
    AchievementSpec {
        kind: AchievementKind::SpeedDemon,
        name: "Speed Demon",
        description: "Complete exercises quickly and efficiently",
        points: 150,
        tiers: [
            (AchievementTier::Bronze, 5.0, "5 fast completions"),
            (AchievementTier::Silver, 15.0, "15 fast completions"),
            (AchievementTier::Gold, 30.0, "30 fast completions"),
            (AchievementTier::Platinum, 50.0, "50 fast completions"),
        ],
    },
    AchievementSpec {
        kind: AchievementKind::Perfectionist,
        name: "Perfectionist",
        description: "Achieve perfect scores on multiple exercises",
        points: 300,
        tiers: [
            (AchievementTier::Bronze, 3.0, "3 perfect scores"),
            (AchievementTier::Silver, 10.0, "10 perfect scores"),
            (AchievementTier::Gold, 25.0, "25 perfect scores"),
            (AchievementTier::Platinum, 50.0, "50 perfect scores"),
        ],
    },
    AchievementSpec {
        kind: AchievementKind::ConsistentLearner,
        name: "Consistent Learner",
        description: "Maintain daily learning streaks",
        points: 250,
        tiers: [
            (AchievementTier::Bronze, 7.0, "7-day streak"),
            (AchievementTier::Silver, 30.0, "30-day streak"),
            (AchievementTier::Gold, 90.0, "90-day streak"),
            (AchievementTier::Platinum, 365.0, "365-day streak"),
        ],
    },
    AchievementSpec {
        kind: AchievementKind::Challenger,
        name: "Challenger",
        description: "Participate and excel in coding challenges",
        points: 400,
        tiers: [
            (AchievementTier::Bronze, 1.0, "Complete 1 hackathon"),
            (AchievementTier::Silver, 5.0, "Complete 5 hackathons"),
            (AchievementTier::Gold, 10.0, "Complete 10 hackathons"),
            (AchievementTier::Platinum, 20.0, "Complete 20 hackathons"),
        ],
    },
];

fn achievement_spec(kind: AchievementKind) -> Option<&'static AchievementSpec> {
    ACHIEVEMENTS.iter().find(|spec| spec.kind == kind)
}

/// `max(1, floor(sqrt(experience / 100)))`
pub fn level_for(experience: u64) -> u32 {
    let level = (experience / 100).isqrt();
    u32::try_from(level).unwrap_or(u32::MAX).max(1)
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct Streaks {
    pub current_daily: u32,
    pub longest_daily: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub exercises_completed: u32,
    pub assessments_taken: u32,
    pub best_assessment_score: f64,
    pub modules_completed: u32,
    pub hackathons_participated: u32,
    pub hackathon_wins: u32,
    pub perfect_scores: u32,
    pub fast_completions: u32,
    /// Hours.
    pub total_study_time: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GamificationState {
    pub user_id: String,
    pub total_points: u64,
    /// Points earned in the calendar month of `points_month`.
    pub monthly_points: u64,
    pub points_month: Option<(i32, u32)>,
    pub level: u32,
    pub experience: u64,
    pub achievements: BTreeMap<AchievementKind, AchievementTier>,
    pub badges: Vec<AwardedAchievement>,
    pub streaks: Streaks,
    pub statistics: Statistics,
    pub created_at: Option<DateTime<Utc>>,
}

impl GamificationState {
    fn add_points(&mut self, points: u64, now: DateTime<Utc>) {
        let month = (now.year(), now.month());
        if self.points_month != Some(month) {
            self.points_month = Some(month);
            self.monthly_points = 0;
        }
        self.total_points += points;
        self.monthly_points += points;
        self.experience += points;
    }

    /// Calendar-day streak update. Returns false if already counted today.
    fn touch_streak(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        let streaks = &mut self.streaks;
        match streaks.last_activity.map(|at| at.date_naive()) {
            Some(last) if last == today => return false,
            Some(last) if last == today - Duration::days(1) => streaks.current_daily += 1,
            _ => streaks.current_daily = 1,
        }
        streaks.longest_daily = streaks.longest_daily.max(streaks.current_daily);
        streaks.last_activity = Some(now);
        true
    }

    /// Award each achievement whose qualifying tier is strictly above the
    /// user's recorded tier. Achievement points count toward the totals.
    fn check_achievements(
        &mut self,
        metrics: &[(AchievementKind, f64)],
        now: DateTime<Utc>,
    ) -> Vec<AwardedAchievement> {
        let mut awarded = Vec::new();
        for (kind, value) in metrics {
            let Some(spec) = achievement_spec(*kind) else {
                continue;
            };
            let Some((tier, _, tier_description)) = spec
                .tiers
                .iter()
                .rev()
                .find(|(_, threshold, _)| *value >= *threshold)
            else {
                continue;
            };
            if self.achievements.get(kind).is_some_and(|current| current >= tier) {
                continue;
            }

            let achievement = AwardedAchievement {
                kind: *kind,
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                level: *tier,
                level_description: tier_description.to_string(),
                points: spec.points,
                earned_at: now,
            };
            self.achievements.insert(*kind, *tier);
            self.badges.push(achievement.clone());
            self.add_points(spec.points, now);
            awarded.push(achievement);
        }
        awarded
    }

    /// Credit points, check achievements and recompute the level.
    fn grant(
        &mut self,
        points_earned: u64,
        metrics: &[(AchievementKind, f64)],
        now: DateTime<Utc>,
    ) -> Award {
        let previous_level = self.level;
        self.add_points(points_earned, now);
        let new_achievements = self.check_achievements(metrics, now);
        self.level = level_for(self.experience);
        Award {
            points_earned,
            new_total: self.total_points,
            level_up: self.level > previous_level,
            new_level: self.level,
            new_achievements,
        }
    }

    fn category_score(&self, category: &str) -> f64 {
        match category {
            "monthly_points" => self.monthly_points as f64,
            "assessment_scores" => self.statistics.best_assessment_score,
            "exercise_completion" => f64::from(self.statistics.exercises_completed),
            "hackathon_wins" => f64::from(self.statistics.hackathon_wins),
            "learning_streaks" => f64::from(self.streaks.longest_daily),
            "skill_certifications" => self.achievements.len() as f64,
            _ => self.total_points as f64,
        }
    }
}

struct Award {
    points_earned: u64,
    new_total: u64,
    level_up: bool,
    new_level: u32,
    new_achievements: Vec<AwardedAchievement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub score: f64,
    pub level: u32,
    pub badges_count: usize,
    pub streak: u32,
}

// ============================================================================
// Agent
// ============================================================================

pub struct GamificationAgent {
    core: AgentCore,
    state: StateStore<GamificationState>,
}

impl GamificationAgent {
    const ROUTES: &'static [Route<Self>] = &[
        (EventKind::PROFILE_CREATED, Self::handle_profile_created),
        (EventKind::ASSESSMENT_COMPLETED, Self::handle_assessment_completed),
        (EventKind::EXERCISE_SOLUTION_SUBMITTED, Self::handle_exercise_completed),
        (EventKind::LEARNING_MODULE_COMPLETED, Self::handle_learning_progress),
        (EventKind::HACKATHON_SUBMISSION_MADE, Self::handle_hackathon_participation),
        (EventKind::USER_DAILY_LOGIN, Self::handle_daily_login),
    ];

    pub fn new(bus: &Arc<EventBus>) -> Arc<Self> {
        let agent = Arc::new(Self {
            core: AgentCore::new(GAMIFICATION_AGENT, bus),
            state: StateStore::new(),
        });
        subscribe_all(&agent, Self::ROUTES);
        agent
    }

    fn handle_profile_created(&self, event: &Event) -> HandlerResult {
        if self.state.contains(&event.user_id) {
            return Outcome::ok(json!({ "status": "already_initialized" }));
        }

        let now = self.core.now();
        let mut state = GamificationState {
            user_id: event.user_id.clone(),
            created_at: Some(now),
            ..Default::default()
        };
        state.add_points(points::PROFILE_CREATED, now);
        state.level = level_for(state.experience);
        let level = state.level;
        self.state.insert(&event.user_id, state);

        self.core.emit_event(
            EventKind::GAMIFICATION_INITIALIZED,
            None,
            &event.user_id,
            GamificationInitializedData {
                initial_points: points::PROFILE_CREATED,
                level,
                available_achievements: ACHIEVEMENTS.len(),
            },
        );

        Outcome::ok(json!({
            "status": "gamification_initialized",
            "points_earned": points::PROFILE_CREATED,
            "current_level": level,
        }))
    }

    fn handle_assessment_completed(&self, event: &Event) -> HandlerResult {
        let data: AssessmentCompletedData = event.decode()?;
        let average = data.final_results.average_score;
        let multiplier = performance_multiplier(average);
        let earned = (points::FIRST_ASSESSMENT as f64 * multiplier) as u64;
        let now = self.core.now();

        let award = self.state.update_existing(&event.user_id, |state| {
            state.statistics.assessments_taken += 1;
            state.statistics.best_assessment_score = state.statistics.best_assessment_score.max(average);
            state.grant(earned, &[(AchievementKind::SkillMaster, average)], now)
        });
        let Some(award) = award else {
            return Ok(Outcome::rejected(NOT_FOUND));
        };

        self.announce(&event.user_id, "assessment_completed", multiplier, &award);

        Outcome::ok(json!({
            "points_earned": award.points_earned,
            "performance_multiplier": multiplier,
            "new_achievements": award.new_achievements,
            "level_up": award.level_up,
            "current_level": award.new_level,
        }))
    }

    fn handle_exercise_completed(&self, event: &Event) -> HandlerResult {
        let data: ExerciseSolutionSubmittedData = event.decode()?;
        let score = data.evaluation_result.as_ref().map_or(0.0, |r| r.score);
        let now = self.core.now();

        let outcome = self.state.update_existing(&event.user_id, |state| {
            let mut bonus = 0;
            if score >= 100.0 {
                bonus += points::PERFECT_SOLUTION;
                state.statistics.perfect_scores += 1;
            }
            if data.completion_time < FAST_SOLUTION_MINUTES {
                bonus += points::FAST_SOLUTION;
                state.statistics.fast_completions += 1;
            }
            state.statistics.exercises_completed += 1;
            state.touch_streak(now);

            let stats = &state.statistics;
            let metrics = [
                (AchievementKind::FirstSteps, f64::from(stats.exercises_completed)),
                (AchievementKind::SpeedDemon, f64::from(stats.fast_completions)),
                (AchievementKind::Perfectionist, f64::from(stats.perfect_scores)),
                (AchievementKind::ConsistentLearner, f64::from(state.streaks.current_daily)),
            ];
            (state.grant(points::EXERCISE_COMPLETED + bonus, &metrics, now), bonus)
        });
        let Some((award, bonus)) = outcome else {
            return Ok(Outcome::rejected(NOT_FOUND));
        };

        self.announce(&event.user_id, "exercise_completed", 1.0, &award);

        Outcome::ok(json!({
            "points_earned": award.points_earned,
            "bonus_points": bonus,
            "new_achievements": award.new_achievements,
            "level_up": award.level_up,
            "streak_updated": true,
        }))
    }

    fn handle_learning_progress(&self, event: &Event) -> HandlerResult {
        let data: ModuleCompletedData = event.decode()?;
        let now = self.core.now();

        let award = self.state.update_existing(&event.user_id, |state| {
            state.statistics.modules_completed += 1;
            state.statistics.total_study_time += data.completion_time.unwrap_or(0.0);
            state.grant(points::LEARNING_MODULE, &[], now)
        });
        let Some(award) = award else {
            return Ok(Outcome::rejected(NOT_FOUND));
        };

        self.announce(&event.user_id, "learning_module", 1.0, &award);

        Outcome::ok(json!({ "points_earned": award.points_earned, "level_up": award.level_up }))
    }

    fn handle_hackathon_participation(&self, event: &Event) -> HandlerResult {
        let data: HackathonSubmissionMadeData = event.decode()?;
        let earned = points::HACKATHON_PARTICIPATION + placement_bonus(data.position);
        let now = self.core.now();

        let award = self.state.update_existing(&event.user_id, |state| {
            state.statistics.hackathons_participated += 1;
            if data.position == Some(1) {
                state.statistics.hackathon_wins += 1;
            }
            let participated = f64::from(state.statistics.hackathons_participated);
            state.grant(earned, &[(AchievementKind::Challenger, participated)], now)
        });
        let Some(award) = award else {
            return Ok(Outcome::rejected(NOT_FOUND));
        };

        self.announce(&event.user_id, "hackathon_participation", 1.0, &award);

        Outcome::ok(json!({
            "points_earned": award.points_earned,
            "new_achievements": award.new_achievements,
        }))
    }

    fn handle_daily_login(&self, event: &Event) -> HandlerResult {
        let now = self.core.now();

        let outcome = self.state.update_existing(&event.user_id, |state| {
            if !state.touch_streak(now) {
                return (None, state.streaks.current_daily);
            }
            let streak = state.streaks.current_daily;
            let metrics = [(AchievementKind::ConsistentLearner, f64::from(streak))];
            (Some(state.grant(login_points(streak), &metrics, now)), streak)
        });
        let Some((award, streak)) = outcome else {
            return Ok(Outcome::rejected(NOT_FOUND));
        };

        let Some(award) = award else {
            return Outcome::ok(json!({
                "points_earned": 0,
                "current_streak": streak,
                "streak_updated": false,
            }));
        };

        self.announce(&event.user_id, "daily_login", 1.0, &award);

        Outcome::ok(json!({
            "points_earned": award.points_earned,
            "current_streak": streak,
            "streak_updated": true,
            "new_achievements": award.new_achievements,
        }))
    }

    fn announce(&self, user_id: &str, reason: &str, multiplier: f64, award: &Award) {
        if !award.new_achievements.is_empty() {
            info!(
                user_id = %user_id,
                count = award.new_achievements.len(),
                "Achievements unlocked"
            );
        }
        self.core.emit_event(
            EventKind::POINTS_AWARDED,
            None,
            user_id,
            PointsAwardedData {
                points_earned: award.points_earned,
                reason: reason.to_string(),
                performance_multiplier: multiplier,
                new_total: award.new_total,
                level_up: award.level_up,
                new_level: award.new_level,
                new_achievements: award.new_achievements.clone(),
            },
        );
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Users ranked by `category`; unknown categories rank by total points.
    pub fn get_leaderboard(&self, category: &str, limit: usize) -> Vec<LeaderboardEntry> {
        let category = if LEADERBOARD_CATEGORIES.contains(&category) {
            category
        } else {
            "total_points"
        };

        let mut entries: Vec<LeaderboardEntry> = self.state.with_all(|all| {
            all.iter()
                .map(|(user_id, state)| LeaderboardEntry {
                    rank: 0,
                    user_id: user_id.clone(),
                    score: state.category_score(category),
                    level: state.level,
                    badges_count: state.achievements.len(),
                    streak: state.streaks.current_daily,
                })
                .collect()
        });
        entries.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.user_id.cmp(&b.user_id)));
        entries.truncate(limit);
        for (idx, entry) in entries.iter_mut().enumerate() {
            entry.rank = idx + 1;
        }
        entries
    }

    /// The user's state plus progress to the next level and global rank.
    pub fn get_user_profile(&self, user_id: &str) -> Outcome {
        let Some(mut profile) = self.state.to_json(user_id) else {
            return Outcome::rejected(NOT_FOUND);
        };
        let Some((level, experience)) = self.state.read(user_id, |s| (s.level, s.experience)) else {
            return Outcome::rejected(NOT_FOUND);
        };

        let next_level_exp = (u64::from(level) + 1).pow(2) * 100;
        let global_rank = self
            .get_leaderboard("total_points", usize::MAX)
            .into_iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.rank);

        if let Some(map) = profile.as_object_mut() {
            map.insert("next_level_exp".into(), json!(next_level_exp));
            map.insert("exp_to_next_level".into(), json!(next_level_exp.saturating_sub(experience)));
            map.insert("global_rank".into(), json!(global_rank));
        }
        Outcome::Ok(profile)
    }
}

impl Agent for GamificationAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn process_event(&self, event: &Event) -> HandlerResult {
        dispatch(self, Self::ROUTES, event)
    }

    fn capabilities(&self) -> Value {
        let point_values: BTreeMap<&str, u64> = points::ALL.iter().copied().collect();
        json!({
            "agent_name": GAMIFICATION_AGENT,
            "version": "1.0.0",
            "capabilities": [
                "points_system",
                "achievement_tracking",
                "badge_management",
                "leaderboards",
                "streak_tracking",
                "level_progression",
            ],
            "point_values": point_values,
            "achievement_types": AchievementKind::ALL,
            "badge_levels": AchievementTier::ALL,
            "leaderboard_categories": LEADERBOARD_CATEGORIES,
            "supported_events": Self::ROUTES.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            "emitted_events": [EventKind::GAMIFICATION_INITIALIZED, EventKind::POINTS_AWARDED],
        })
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

// ============================================================================
// Rules
// ============================================================================

pub fn performance_multiplier(average_score: f64) -> f64 {
    if average_score >= 90.0 {
        2.0
    } else if average_score >= 80.0 {
        1.5
    } else if average_score >= 70.0 {
        1.2
    } else {
        1.0
    }
}

/// First place takes the full win bonus, second and third half of it.
pub fn placement_bonus(position: Option<u32>) -> u64 {
    match position {
        Some(1) => points::HACKATHON_WIN,
        Some(2..=3) => points::HACKATHON_WIN / 2,
        _ => 0,
    }
}

/// Daily login points with the weekly and monthly streak bonuses.
pub fn login_points(streak: u32) -> u64 {
    let mut earned = points::DAILY_LOGIN;
    if streak > 0 && streak % 7 == 0 {
        earned += points::WEEKLY_STREAK;
    }
    if streak > 0 && streak % 30 == 0 {
        earned += points::MONTHLY_STREAK;
    }
    earned
}
