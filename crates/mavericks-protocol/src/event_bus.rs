//! Structured event bus message definitions.
//!
//! All event kinds and their payload structures are defined here for use by
//! the bus, the agents and any producer sitting in front of them. Payload
//! fields default when absent so that partially filled payloads from loose
//! producers still decode.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AchievementKind, AchievementTier, Difficulty, HackathonStatus, SkillLevel};

// ============================================================================
// Event Kind Constants
// ============================================================================

/// Event kind constants following the format: `<category>.<action>`
pub struct EventKind;

impl EventKind {
    // User lifecycle
    pub const USER_REGISTERED: &str = "user.registered";
    pub const USER_DAILY_LOGIN: &str = "user.daily_login";
    pub const RESUME_UPLOADED: &str = "resume.uploaded";

    // Profile
    pub const PROFILE_CREATED: &str = "profile.created";
    pub const PROFILE_UPDATE_REQUESTED: &str = "profile.update_requested";
    pub const SKILLS_EXTRACTED: &str = "skills.extracted";
    pub const SKILLS_REFINED: &str = "skills.refined";
    pub const SKILLS_ASSESSMENT_COMPLETED: &str = "skills.assessment_completed";

    // Assessment
    pub const ASSESSMENT_READY: &str = "assessment.ready";
    pub const ASSESSMENT_START_REQUESTED: &str = "assessment.start_requested";
    pub const ASSESSMENT_COMPLETED: &str = "assessment.completed";
    pub const ASSESSMENT_ADAPTIVE_ADJUSTMENT: &str = "assessment.adaptive_adjustment";
    pub const EXERCISE_GENERATED: &str = "exercise.generated";
    pub const EXERCISE_SOLUTION_SUBMITTED: &str = "exercise.solution_submitted";

    // Learning paths
    pub const LEARNING_RECOMMENDATIONS_READY: &str = "learning.recommendations_ready";
    pub const LEARNING_PATH_REQUESTED: &str = "learning.path_requested";
    pub const LEARNING_PERSONALIZED_PATH_READY: &str = "learning.personalized_path_ready";
    pub const LEARNING_MODULE_COMPLETED: &str = "learning.module_completed";
    pub const LEARNING_PROGRESS_UPDATE: &str = "learning.progress_update";
    pub const LEARNING_PATH_COMPLETED: &str = "learning.path_completed";

    // Hackathons
    pub const HACKATHON_CREATE_REQUESTED: &str = "hackathon.create_requested";
    pub const HACKATHON_CREATED: &str = "hackathon.created";
    pub const HACKATHON_JOIN_REQUESTED: &str = "hackathon.join_requested";
    pub const HACKATHON_PARTICIPANT_JOINED: &str = "hackathon.participant_joined";
    pub const HACKATHON_SUBMISSION_MADE: &str = "hackathon.submission_made";
    pub const HACKATHON_SUBMISSION_RECEIVED: &str = "hackathon.submission_received";
    pub const HACKATHON_EVALUATION_COMPLETED: &str = "hackathon.evaluation_completed";

    // Gamification
    pub const GAMIFICATION_INITIALIZED: &str = "gamification.initialized";
    pub const POINTS_AWARDED: &str = "points.awarded";

    /// Every kind with a typed payload.
    pub const ALL: &[&str] = &[
        Self::USER_REGISTERED,
        Self::USER_DAILY_LOGIN,
        Self::RESUME_UPLOADED,
        Self::PROFILE_CREATED,
        Self::PROFILE_UPDATE_REQUESTED,
        Self::SKILLS_EXTRACTED,
        Self::SKILLS_REFINED,
        Self::SKILLS_ASSESSMENT_COMPLETED,
        Self::ASSESSMENT_READY,
        Self::ASSESSMENT_START_REQUESTED,
        Self::ASSESSMENT_COMPLETED,
        Self::ASSESSMENT_ADAPTIVE_ADJUSTMENT,
        Self::EXERCISE_GENERATED,
        Self::EXERCISE_SOLUTION_SUBMITTED,
        Self::LEARNING_RECOMMENDATIONS_READY,
        Self::LEARNING_PATH_REQUESTED,
        Self::LEARNING_PERSONALIZED_PATH_READY,
        Self::LEARNING_MODULE_COMPLETED,
        Self::LEARNING_PROGRESS_UPDATE,
        Self::LEARNING_PATH_COMPLETED,
        Self::HACKATHON_CREATE_REQUESTED,
        Self::HACKATHON_CREATED,
        Self::HACKATHON_JOIN_REQUESTED,
        Self::HACKATHON_PARTICIPANT_JOINED,
        Self::HACKATHON_SUBMISSION_MADE,
        Self::HACKATHON_SUBMISSION_RECEIVED,
        Self::HACKATHON_EVALUATION_COMPLETED,
        Self::GAMIFICATION_INITIALIZED,
        Self::POINTS_AWARDED,
    ];

    pub fn is_builtin(kind: &str) -> bool {
        Self::ALL.contains(&kind)
    }
}

// ============================================================================
// User & Profile Data Structures
// ============================================================================

/// Data for user.registered event - emitted by the web layer on sign-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRegisteredData {
    pub username: String,
    /// Acquisition channel, e.g. "direct" or "referral".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Any further registration attributes the producer attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Data for user.daily_login event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyLoginData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_time: Option<DateTime<Utc>>,
    /// Streak as seen by the producer, used for analytics only.
    pub current_streak: u32,
}

/// Data for resume.uploaded event - carries the extracted résumé text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeUploadedData {
    pub resume_text: String,
}

/// Data for profile.created event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileCreatedData {
    pub username: String,
    pub profile_completeness: u32,
    pub skills_extracted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Fields a profile update may touch. Unknown keys are kept as free-form attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// A new résumé text triggers re-extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_text: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ProfileUpdates {
    /// Names of every field carried by this update.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if self.username.is_some() {
            keys.push("username".to_string());
        }
        if self.resume_text.is_some() {
            keys.push("resume_text".to_string());
        }
        keys.extend(self.attributes.keys().cloned());
        keys
    }
}

/// Data for profile.update_requested event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdateRequestedData {
    pub updates: ProfileUpdates,
}

/// Data for skills.extracted event - emitted after keyword extraction on a résumé.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsExtractedData {
    /// Category name -> matched skill keywords.
    pub extracted_skills: BTreeMap<String, Vec<String>>,
    /// Category strengths plus `skill_<name>` weights.
    pub skill_vector: BTreeMap<String, f64>,
    pub skill_categories: Vec<String>,
    pub total_skills: usize,
}

/// Data for skills.assessment_completed event - per-area scores in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsAssessmentCompletedData {
    pub assessment_results: BTreeMap<String, f64>,
}

/// Data for skills.refined event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsRefinedData {
    pub refined_skill_vector: BTreeMap<String, f64>,
    pub assessment_scores: BTreeMap<String, f64>,
    pub profile_completeness: u32,
}

// ============================================================================
// Assessment Data Structures
// ============================================================================

/// One sample input/output pair (or a prose expectation) for an exercise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCase {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The static part of an exercise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseSpec {
    pub title: String,
    pub description: String,
    pub starter_code: String,
    pub test_cases: Vec<TestCase>,
    /// Skill tags, e.g. "algorithms" or "data_structures".
    pub skills: Vec<String>,
    /// Minutes.
    pub time_limit: u32,
}

/// An exercise slot in an assessment plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannedExercise {
    pub language: String,
    pub difficulty: Difficulty,
    pub template: ExerciseSpec,
}

/// Ordered list of exercises a user will be served.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentPlan {
    pub exercises: Vec<PlannedExercise>,
    /// Sum of exercise time limits in minutes.
    pub estimated_time: u32,
    pub skill_areas: Vec<String>,
    pub difficulty_progression: Vec<Difficulty>,
}

/// An exercise instance served to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// `<user_id>_exercise_<index>`
    pub id: String,
    pub language: String,
    pub difficulty: Difficulty,
    #[serde(flatten)]
    pub spec: ExerciseSpec,
    pub created_at: DateTime<Utc>,
}

/// Summary produced when an assessment plan is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalResults {
    pub user_id: String,
    pub assessment_id: String,
    pub total_exercises: u32,
    pub average_score: f64,
    pub skill_levels: BTreeMap<String, SkillLevel>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub performance_tier: String,
}

/// Data for assessment.ready event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentReadyData {
    pub assessment_plan: AssessmentPlan,
    pub recommended_exercises: usize,
    pub estimated_time: u32,
}

/// Data for assessment.start_requested event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentStartRequestedData {}

/// Observed performance used to move the difficulty ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceData {
    pub average_score: f64,
    /// Minutes.
    pub completion_time: f64,
}

impl Default for PerformanceData {
    fn default() -> Self {
        Self {
            average_score: 50.0,
            completion_time: 30.0,
        }
    }
}

/// Data for assessment.adaptive_adjustment event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveAdjustmentData {
    pub performance_data: PerformanceData,
}

/// Data for exercise.generated event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseGeneratedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise: Option<Exercise>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_score: Option<u32>,
    /// `<completed>/<total>`
    pub progress: String,
}

/// Scored outcome of an exercise, if the producer already has one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSummary {
    pub score: f64,
}

/// Data for exercise.solution_submitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseSolutionSubmittedData {
    pub solution_code: String,
    pub exercise_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_time: Option<DateTime<Utc>>,
    /// Minutes spent on the exercise.
    pub completion_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_result: Option<EvaluationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Default for ExerciseSolutionSubmittedData {
    fn default() -> Self {
        Self {
            solution_code: String::new(),
            exercise_id: String::new(),
            submission_time: None,
            completion_time: 30.0,
            evaluation_result: None,
            difficulty: None,
            language: None,
        }
    }
}

/// Data for assessment.completed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentCompletedData {
    pub final_results: FinalResults,
    pub total_exercises: u32,
    pub average_score: f64,
    pub skill_levels: BTreeMap<String, SkillLevel>,
}

// ============================================================================
// Learning Path Data Structures
// ============================================================================

/// A unit of study inside a curriculum or path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningModule {
    pub title: String,
    pub description: String,
    pub duration_hours: u32,
    pub topics: Vec<String>,
    pub exercises: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub extra_practice: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub accelerated: bool,
}

/// Suggested study pace for a recommended curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Accelerated,
    Thorough,
    #[default]
    Normal,
}

/// A curriculum recommended to a user, annotated with matching metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathRecommendation {
    pub curriculum_id: String,
    pub title: String,
    pub description: String,
    pub duration_weeks: u32,
    pub difficulty: Difficulty,
    pub prerequisites: Vec<String>,
    pub modules: Vec<LearningModule>,
    pub recommended_pace: Pace,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_basics: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub extra_practice: bool,
    pub match_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub accelerated_track: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub foundational_support: bool,
}

/// A concrete path a user follows, either assessment-based or requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningPath {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    pub modules: Vec<LearningModule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_weeks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_commitment: Option<u32>,
    pub learning_goals: Vec<String>,
    pub skill_focus: Vec<String>,
    pub customized: bool,
    pub assessment_based: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Data for learning.recommendations_ready event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationsReadyData {
    pub recommendations: Vec<PathRecommendation>,
    pub total_paths: usize,
    /// Sum of recommended curriculum durations in weeks.
    pub estimated_time: u32,
}

/// Data for learning.personalized_path_ready event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalizedPathReadyData {
    pub personalized_path: LearningPath,
    pub refined_recommendations: Vec<PathRecommendation>,
    pub skill_gaps_addressed: usize,
}

/// Data for learning.path_requested event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningPathRequestedData {
    /// Curriculum id; unknown or absent falls back to the first curriculum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_type: Option<String>,
    pub learning_goals: Vec<String>,
    /// Hours per week.
    pub time_commitment: u32,
}

impl Default for LearningPathRequestedData {
    fn default() -> Self {
        Self {
            path_type: None,
            learning_goals: Vec::new(),
            time_commitment: 5,
        }
    }
}

/// Data for learning.module_completed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleCompletedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    /// Hours spent; absent counts as two hours of study.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<f64>,
    pub score: f64,
}

/// Partial progress record merged into an existing path's progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_modules: Option<u32>,
}

/// Data for learning.progress_update event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressUpdateData {
    pub progress_data: BTreeMap<String, ProgressPatch>,
}

/// Data for learning.path_completed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathCompletedData {
    pub path_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
    pub total_modules: u32,
}

// ============================================================================
// Hackathon Data Structures
// ============================================================================

/// The problem statement a hackathon is built around.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Challenge {
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub judging_criteria: BTreeMap<String, f64>,
    /// Minutes.
    pub time_limit: u32,
    pub max_score: u32,
}

/// Public view of a hackathon as announced on creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HackathonSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub theme: String,
    pub difficulty: Difficulty,
    pub challenge: Challenge,
    pub duration_hours: u32,
    pub max_participants: usize,
    pub status: HackathonStatus,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Data for hackathon.create_requested event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HackathonCreateRequestedData {
    pub theme: String,
    pub difficulty: Difficulty,
    pub duration_hours: u32,
    pub max_participants: usize,
    /// Absent means one hour from now.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

impl Default for HackathonCreateRequestedData {
    fn default() -> Self {
        Self {
            theme: "web_development".to_string(),
            difficulty: Difficulty::Intermediate,
            duration_hours: 4,
            max_participants: 50,
            start_time: None,
        }
    }
}

/// Data for hackathon.created event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HackathonCreatedData {
    pub hackathon_id: String,
    pub hackathon: HackathonSummary,
    pub registration_open: bool,
}

/// Data for hackathon.join_requested event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HackathonJoinRequestedData {
    pub hackathon_id: String,
    /// Defaults to the user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
}

/// Data for hackathon.participant_joined event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantJoinedData {
    pub hackathon_id: String,
    pub team_name: String,
    pub total_participants: usize,
}

/// Project material handed in for a hackathon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionData {
    pub description: String,
    /// File name -> file contents.
    pub code_files: BTreeMap<String, String>,
    pub features: Vec<String>,
    pub readme: String,
}

/// Data for hackathon.submission_made event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HackathonSubmissionMadeData {
    pub hackathon_id: String,
    pub submission_data: SubmissionData,
    /// Final placing when known (1 = winner).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Externally assigned score, used by analytics.
    pub score: f64,
}

/// Data for hackathon.submission_received event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionReceivedData {
    pub hackathon_id: String,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

/// Data for hackathon.evaluation_completed event - a judge's manual review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HackathonEvaluationCompletedData {
    pub hackathon_id: String,
    pub evaluated_user_id: String,
    pub manual_scores: BTreeMap<String, f64>,
    pub judge_feedback: String,
}

// ============================================================================
// Gamification Data Structures
// ============================================================================

/// An achievement tier granted to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardedAchievement {
    #[serde(rename = "type")]
    pub kind: AchievementKind,
    pub name: String,
    pub description: String,
    pub level: AchievementTier,
    pub level_description: String,
    pub points: u64,
    pub earned_at: DateTime<Utc>,
}

/// Data for gamification.initialized event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamificationInitializedData {
    pub initial_points: u64,
    pub level: u32,
    pub available_achievements: usize,
}

/// Data for points.awarded event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsAwardedData {
    pub points_earned: u64,
    pub reason: String,
    pub performance_multiplier: f64,
    pub new_total: u64,
    pub level_up: bool,
    pub new_level: u32,
    pub new_achievements: Vec<AwardedAchievement>,
}

// ============================================================================
// Builtin Event Enum
// ============================================================================

/// All known events, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum BuiltinEvent {
    #[serde(rename = "user.registered")]
    UserRegistered(UserRegisteredData),
    #[serde(rename = "user.daily_login")]
    DailyLogin(DailyLoginData),
    #[serde(rename = "resume.uploaded")]
    ResumeUploaded(ResumeUploadedData),
    #[serde(rename = "profile.created")]
    ProfileCreated(ProfileCreatedData),
    #[serde(rename = "profile.update_requested")]
    ProfileUpdateRequested(ProfileUpdateRequestedData),
    #[serde(rename = "skills.extracted")]
    SkillsExtracted(SkillsExtractedData),
    #[serde(rename = "skills.refined")]
    SkillsRefined(SkillsRefinedData),
    #[serde(rename = "skills.assessment_completed")]
    SkillsAssessmentCompleted(SkillsAssessmentCompletedData),
    #[serde(rename = "assessment.ready")]
    AssessmentReady(AssessmentReadyData),
    #[serde(rename = "assessment.start_requested")]
    AssessmentStartRequested(AssessmentStartRequestedData),
    #[serde(rename = "assessment.completed")]
    AssessmentCompleted(AssessmentCompletedData),
    #[serde(rename = "assessment.adaptive_adjustment")]
    AdaptiveAdjustment(AdaptiveAdjustmentData),
    #[serde(rename = "exercise.generated")]
    ExerciseGenerated(ExerciseGeneratedData),
    #[serde(rename = "exercise.solution_submitted")]
    ExerciseSolutionSubmitted(ExerciseSolutionSubmittedData),
    #[serde(rename = "learning.recommendations_ready")]
    RecommendationsReady(RecommendationsReadyData),
    #[serde(rename = "learning.path_requested")]
    LearningPathRequested(LearningPathRequestedData),
    #[serde(rename = "learning.personalized_path_ready")]
    PersonalizedPathReady(PersonalizedPathReadyData),
    #[serde(rename = "learning.module_completed")]
    ModuleCompleted(ModuleCompletedData),
    #[serde(rename = "learning.progress_update")]
    ProgressUpdate(ProgressUpdateData),
    #[serde(rename = "learning.path_completed")]
    PathCompleted(PathCompletedData),
    #[serde(rename = "hackathon.create_requested")]
    HackathonCreateRequested(HackathonCreateRequestedData),
    #[serde(rename = "hackathon.created")]
    HackathonCreated(HackathonCreatedData),
    #[serde(rename = "hackathon.join_requested")]
    HackathonJoinRequested(HackathonJoinRequestedData),
    #[serde(rename = "hackathon.participant_joined")]
    ParticipantJoined(ParticipantJoinedData),
    #[serde(rename = "hackathon.submission_made")]
    HackathonSubmissionMade(HackathonSubmissionMadeData),
    #[serde(rename = "hackathon.submission_received")]
    SubmissionReceived(SubmissionReceivedData),
    #[serde(rename = "hackathon.evaluation_completed")]
    HackathonEvaluationCompleted(HackathonEvaluationCompletedData),
    #[serde(rename = "gamification.initialized")]
    GamificationInitialized(GamificationInitializedData),
    #[serde(rename = "points.awarded")]
    PointsAwarded(PointsAwardedData),
}

/// A typed event: either a known kind or a free-form custom one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    Builtin(BuiltinEvent),
    Custom { kind: String, data: Value },
}

impl Event {
    /// Decode `(kind, data)` strictly: a known kind must carry a valid payload,
    /// anything else becomes [`Event::Custom`].
    pub fn from_parts(kind: &str, data: Value) -> serde_json::Result<Self> {
        if !EventKind::is_builtin(kind) {
            return Ok(Event::Custom {
                kind: kind.to_string(),
                data,
            });
        }
        let data = if data.is_null() {
            Value::Object(Map::new())
        } else {
            data
        };
        let tagged = serde_json::json!({ "kind": kind, "data": data });
        serde_json::from_value(tagged).map(Event::Builtin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kinds_are_namespaced() {
        for kind in EventKind::ALL {
            assert!(kind.contains('.'), "{} is not namespaced", kind);
        }
    }

    #[test]
    fn test_builtin_event_deserialization() {
        let json = r#"{"kind":"resume.uploaded","data":{"resume_text":"Rust and Python"}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        if let Event::Builtin(BuiltinEvent::ResumeUploaded(data)) = event {
            assert_eq!(data.resume_text, "Rust and Python");
        } else {
            panic!("Expected ResumeUploaded event");
        }
    }

    #[test]
    fn test_missing_fields_default() {
        let event = Event::from_parts(EventKind::HACKATHON_CREATE_REQUESTED, serde_json::json!({}))
            .unwrap();
        if let Event::Builtin(BuiltinEvent::HackathonCreateRequested(data)) = event {
            assert_eq!(data.theme, "web_development");
            assert_eq!(data.difficulty, Difficulty::Intermediate);
            assert_eq!(data.duration_hours, 4);
            assert_eq!(data.max_participants, 50);
        } else {
            panic!("Expected HackathonCreateRequested event");
        }
    }

    #[test]
    fn test_known_kind_with_bad_payload_is_rejected() {
        let result = Event::from_parts(
            EventKind::RESUME_UPLOADED,
            serde_json::json!({"resume_text": 42}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_event_passthrough() {
        let event = Event::from_parts("mentor.session_booked", serde_json::json!({"slot": 3}))
            .unwrap();
        assert_eq!(
            event,
            Event::Custom {
                kind: "mentor.session_booked".to_string(),
                data: serde_json::json!({"slot": 3}),
            }
        );
    }

    #[test]
    fn test_null_payload_decodes_as_defaults() {
        let event = Event::from_parts(EventKind::USER_DAILY_LOGIN, Value::Null).unwrap();
        assert_eq!(
            event,
            Event::Builtin(BuiltinEvent::DailyLogin(DailyLoginData::default()))
        );
    }

    #[test]
    fn test_profile_update_keeps_unknown_attributes() {
        let json = r#"{"updates":{"username":"ada","location":"London"}}"#;
        let data: ProfileUpdateRequestedData = serde_json::from_str(json).unwrap();
        assert_eq!(data.updates.username.as_deref(), Some("ada"));
        assert_eq!(data.updates.attributes["location"], "London");
        assert_eq!(data.updates.keys(), vec!["username", "location"]);
    }
}
