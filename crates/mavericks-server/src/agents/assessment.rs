//! Assessment agent: builds an exercise plan from extracted skills, serves one
//! exercise at a time and scores submissions with a fixed heuristic rubric.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mavericks_protocol::{
    AdaptiveAdjustmentData, AssessmentCompletedData, AssessmentPlan, AssessmentReadyData,
    Difficulty, EventKind, Exercise, ExerciseGeneratedData, ExerciseSolutionSubmittedData,
    ExerciseSpec, FinalResults, PerformanceData, PlannedExercise, SkillLevel,
    SkillsExtractedData, TestCase,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::base::{
    dispatch, subscribe_all, Agent, AgentCore, HandlerResult, Outcome, Route, StateStore,
};
use crate::event_bus::{Event, EventBus};

pub const ASSESSMENT_AGENT: &str = "AssessmentAgent";

/// Rubric weights; they sum to 1.
const SCORING_CRITERIA: [(&str, f64); 4] = [
    ("correctness", 0.4),
    ("efficiency", 0.25),
    ("code_quality", 0.2),
    ("edge_cases", 0.15),
];

// ============================================================================
// Exercise templates
// ============================================================================

struct CaseTemplate {
    input: &'static str,
    expected: &'static str,
    description: &'static str,
}

struct ExerciseTemplate {
    language: &'static str,
    difficulty: Difficulty,
    title: &'static str,
    description: &'static str,
    starter_code: &'static str,
    test_cases: &'static [CaseTemplate],
    skills: &'static [&'static str],
    time_limit: u32,
}

const fn case(input: &'static str, expected: &'static str) -> CaseTemplate {
    CaseTemplate {
        input,
        expected,
        description: "",
    }
}

const EXERCISE_TEMPLATES: &[ExerciseTemplate] = &[
    ExerciseTemplate {
        language: "python",
        difficulty: Difficulty::Beginner,
        title: "List Manipulation",
        description: "Write a function to find the maximum element in a list",
        starter_code: "def find_max(numbers):\n    # Your code here\n    pass",
        test_cases: &[case("[1, 5, 3, 9, 2]", "9"), case("[-1, -5, -3]", "-1")],
        skills: &["basic_programming", "data_structures"],
        time_limit: 15,
    },
    ExerciseTemplate {
        language: "python",
        difficulty: Difficulty::Beginner,
        title: "String Operations",
        description: "Create a function to reverse words in a sentence",
        starter_code: "def reverse_words(sentence):\n    # Your code here\n    pass",
        test_cases: &[
            case("'hello world'", "'world hello'"),
            case("'python programming'", "'programming python'"),
        ],
        skills: &["string_manipulation", "basic_programming"],
        time_limit: 20,
    },
    ExerciseTemplate {
        language: "python",
        difficulty: Difficulty::Intermediate,
        title: "Binary Search Implementation",
        description: "Implement binary search algorithm for a sorted array",
        starter_code: "def binary_search(arr, target):\n    # Your code here\n    pass",
        test_cases: &[case("[1, 3, 5, 7, 9], 5", "2"), case("[2, 4, 6, 8], 1", "-1")],
        skills: &["algorithms", "searching"],
        time_limit: 30,
    },
    ExerciseTemplate {
        language: "python",
        difficulty: Difficulty::Advanced,
        title: "Dynamic Programming",
        description: "Solve the coin change problem using dynamic programming",
        starter_code: "def coin_change(coins, amount):\n    # Your code here\n    pass",
        test_cases: &[case("[1, 3, 4], 6", "2"), case("[2], 3", "-1")],
        skills: &["dynamic_programming", "optimization"],
        time_limit: 45,
    },
    ExerciseTemplate {
        language: "javascript",
        difficulty: Difficulty::Beginner,
        title: "Array Filter",
        description: "Filter even numbers from an array",
        starter_code: "function filterEvenNumbers(arr) {\n    // Your code here\n}",
        test_cases: &[case("[1, 2, 3, 4, 5, 6]", "[2, 4, 6]")],
        skills: &["array_methods", "functional_programming"],
        time_limit: 15,
    },
    ExerciseTemplate {
        language: "javascript",
        difficulty: Difficulty::Intermediate,
        title: "Promise Handling",
        description: "Create a function that handles multiple API calls",
        starter_code: "async function handleAPICalls(urls) {\n    // Your code here\n}",
        test_cases: &[CaseTemplate {
            input: "",
            expected: "",
            description: "Should handle concurrent requests properly",
        }],
        skills: &["async_programming", "promises"],
        time_limit: 30,
    },
];

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl ExerciseTemplate {
    /// Fresh owned copy; templates are never shared with user state.
    fn to_spec(&self) -> ExerciseSpec {
        ExerciseSpec {
            title: self.title.to_string(),
            description: self.description.to_string(),
            starter_code: self.starter_code.to_string(),
            test_cases: self
                .test_cases
                .iter()
                .map(|c| TestCase {
                    input: non_empty(c.input),
                    expected: non_empty(c.expected),
                    description: non_empty(c.description),
                })
                .collect(),
            skills: self.skills.iter().map(|s| s.to_string()).collect(),
            time_limit: self.time_limit,
        }
    }
}

/// First template for a language at a difficulty.
fn first_template(language: &str, difficulty: Difficulty) -> Option<&'static ExerciseTemplate> {
    EXERCISE_TEMPLATES
        .iter()
        .find(|t| t.language == language && t.difficulty == difficulty)
}

fn supported_languages() -> Vec<&'static str> {
    let mut languages: Vec<&str> = EXERCISE_TEMPLATES.iter().map(|t| t.language).collect();
    languages.dedup();
    languages
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub score: u32,
    pub score_components: BTreeMap<String, f64>,
    pub feedback: Vec<String>,
    pub evaluation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    pub exercise_id: String,
    pub solution_code: String,
    pub score: u32,
    pub feedback: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssessmentState {
    pub extracted_skills: BTreeMap<String, Vec<String>>,
    pub skill_vector: BTreeMap<String, f64>,
    pub assessment_plan: AssessmentPlan,
    pub current_difficulty: Difficulty,
    pub exercises_completed: u32,
    pub total_score: u32,
    pub status: AssessmentStatus,
    pub current_exercise: Option<Exercise>,
    pub last_submission: Option<SubmissionRecord>,
    pub final_results: Option<FinalResults>,
    pub created_at: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
}

impl AssessmentState {
    fn progress(&self) -> String {
        format!(
            "{}/{}",
            self.exercises_completed,
            self.assessment_plan.exercises.len()
        )
    }
}

/// What a submission led to, decided under the state lock and emitted after it.
enum SubmissionStep {
    Completed {
        results: FinalResults,
        total_exercises: u32,
        average_score: f64,
    },
    Next {
        evaluation: Evaluation,
        exercise: Option<Exercise>,
        progress: String,
    },
}

// ============================================================================
// Agent
// ============================================================================

pub struct AssessmentAgent {
    core: AgentCore,
    state: StateStore<AssessmentState>,
}

impl AssessmentAgent {
    const ROUTES: &'static [Route<Self>] = &[
        (EventKind::SKILLS_EXTRACTED, Self::handle_skills_extracted),
        (EventKind::ASSESSMENT_START_REQUESTED, Self::handle_assessment_start),
        (EventKind::EXERCISE_SOLUTION_SUBMITTED, Self::handle_solution_submission),
        (EventKind::ASSESSMENT_ADAPTIVE_ADJUSTMENT, Self::handle_adaptive_adjustment),
    ];

    pub fn new(bus: &Arc<EventBus>) -> Arc<Self> {
        let agent = Arc::new(Self {
            core: AgentCore::new(ASSESSMENT_AGENT, bus),
            state: StateStore::new(),
        });
        subscribe_all(&agent, Self::ROUTES);
        agent
    }

    fn handle_skills_extracted(&self, event: &Event) -> HandlerResult {
        let data: SkillsExtractedData = event.decode()?;
        let plan = create_assessment_plan(&data.extracted_skills, &data.skill_vector);

        self.state.insert(
            &event.user_id,
            AssessmentState {
                extracted_skills: data.extracted_skills,
                skill_vector: data.skill_vector,
                assessment_plan: plan.clone(),
                created_at: Some(self.core.now()),
                ..Default::default()
            },
        );

        self.core.emit_event(
            EventKind::ASSESSMENT_READY,
            None,
            &event.user_id,
            AssessmentReadyData {
                recommended_exercises: plan.exercises.len(),
                estimated_time: plan.estimated_time,
                assessment_plan: plan.clone(),
            },
        );

        Outcome::ok(json!({ "status": "assessment_plan_created", "plan": plan }))
    }

    fn handle_assessment_start(&self, event: &Event) -> HandlerResult {
        let now = self.core.now();
        let started = self.state.update_existing(&event.user_id, |state| {
            let exercise = next_exercise(&event.user_id, state, now)?;
            state.status = AssessmentStatus::InProgress;
            state.current_exercise = Some(exercise.clone());
            state.start_time = Some(now);
            Some((exercise, state.progress()))
        });

        let (exercise, progress) = match started {
            None => {
                return Ok(Outcome::rejected(
                    "No assessment plan found. Please upload resume first.",
                ));
            }
            Some(None) => return Ok(Outcome::rejected("Unable to generate exercise")),
            Some(Some(started)) => started,
        };

        info!(user_id = %event.user_id, exercise_id = %exercise.id, "Assessment started");
        self.core.emit_event(
            EventKind::EXERCISE_GENERATED,
            None,
            &event.user_id,
            ExerciseGeneratedData {
                exercise: Some(exercise.clone()),
                assessment_status: Some("in_progress".to_string()),
                previous_score: None,
                progress,
            },
        );

        Outcome::ok(json!({ "status": "assessment_started", "exercise": exercise }))
    }

    fn handle_solution_submission(&self, event: &Event) -> HandlerResult {
        let data: ExerciseSolutionSubmittedData = event.decode()?;
        let now = self.core.now();
        let user_id = event.user_id.as_str();

        let step = self.state.update_existing(user_id, |state| {
            if state.status == AssessmentStatus::Completed {
                return None;
            }

            let evaluation = evaluate_solution(&data.solution_code, state.current_exercise.as_ref(), now);
            state.exercises_completed += 1;
            state.total_score += evaluation.score;
            state.last_submission = Some(SubmissionRecord {
                exercise_id: data.exercise_id.clone(),
                solution_code: data.solution_code.clone(),
                score: evaluation.score,
                feedback: evaluation.feedback.clone(),
                submitted_at: data.submission_time.unwrap_or(now),
            });

            if state.exercises_completed as usize >= state.assessment_plan.exercises.len() {
                let results = finalize_assessment(user_id, state, now);
                Some(SubmissionStep::Completed {
                    total_exercises: state.exercises_completed,
                    average_score: state.total_score as f64 / state.exercises_completed as f64,
                    results,
                })
            } else {
                let exercise = next_exercise(user_id, state, now);
                state.current_exercise = exercise.clone();
                Some(SubmissionStep::Next {
                    evaluation,
                    exercise,
                    progress: state.progress(),
                })
            }
        });

        let step = match step {
            None => return Ok(Outcome::rejected("Assessment session not found")),
            Some(None) => return Ok(Outcome::rejected("Assessment already completed")),
            Some(Some(step)) => step,
        };

        match step {
            SubmissionStep::Completed {
                results,
                total_exercises,
                average_score,
            } => {
                info!(user_id = %user_id, average_score, "Assessment completed");
                self.core.emit_event(
                    EventKind::ASSESSMENT_COMPLETED,
                    None,
                    user_id,
                    AssessmentCompletedData {
                        skill_levels: results.skill_levels.clone(),
                        final_results: results.clone(),
                        total_exercises,
                        average_score,
                    },
                );
                Outcome::ok(json!({ "status": "assessment_complete", "results": results }))
            }
            SubmissionStep::Next {
                evaluation,
                exercise,
                progress,
            } => {
                self.core.emit_event(
                    EventKind::EXERCISE_GENERATED,
                    None,
                    user_id,
                    ExerciseGeneratedData {
                        exercise: exercise.clone(),
                        assessment_status: None,
                        previous_score: Some(evaluation.score),
                        progress,
                    },
                );
                Outcome::ok(json!({
                    "status": "exercise_evaluated",
                    "evaluation": evaluation,
                    "next_exercise": exercise,
                }))
            }
        }
    }

    fn handle_adaptive_adjustment(&self, event: &Event) -> HandlerResult {
        let data: AdaptiveAdjustmentData = event.decode()?;
        let adjusted = self.state.update_existing(&event.user_id, |state| {
            let old = state.current_difficulty;
            state.current_difficulty = adaptive_difficulty(&data.performance_data, old);
            (old, state.current_difficulty)
        });

        match adjusted {
            None => Ok(Outcome::rejected("Assessment session not found")),
            Some((old, new)) => Outcome::ok(json!({
                "status": "difficulty_adjusted",
                "old_difficulty": old,
                "new_difficulty": new,
            })),
        }
    }

    pub fn get_assessment_state(&self, user_id: &str) -> Option<AssessmentState> {
        self.state.get(user_id)
    }
}

impl Agent for AssessmentAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn process_event(&self, event: &Event) -> HandlerResult {
        dispatch(self, Self::ROUTES, event)
    }

    fn capabilities(&self) -> Value {
        json!({
            "agent_name": ASSESSMENT_AGENT,
            "version": "1.0.0",
            "capabilities": [
                "exercise_generation",
                "solution_evaluation",
                "adaptive_difficulty",
                "performance_analytics",
                "skill_assessment",
            ],
            "supported_languages": supported_languages(),
            "difficulty_levels": Difficulty::LADDER,
            "scoring_criteria": SCORING_CRITERIA.iter().cloned().collect::<BTreeMap<_, _>>(),
            "supported_events": Self::ROUTES.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            "emitted_events": [
                EventKind::ASSESSMENT_READY,
                EventKind::EXERCISE_GENERATED,
                EventKind::ASSESSMENT_COMPLETED,
            ],
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
// Planning
// ============================================================================

/// Beginner then intermediate exercise for each of the first two detected
/// languages, plus one advanced exercise for strong profiles.
pub fn create_assessment_plan(
    extracted_skills: &BTreeMap<String, Vec<String>>,
    skill_vector: &BTreeMap<String, f64>,
) -> AssessmentPlan {
    let mut plan = AssessmentPlan {
        difficulty_progression: vec![Difficulty::Beginner, Difficulty::Intermediate],
        ..Default::default()
    };

    let languages: Vec<&str> = match extracted_skills.get("programming_languages") {
        Some(langs) if !langs.is_empty() => langs.iter().map(String::as_str).collect(),
        _ => vec!["python"],
    };

    for language in languages.iter().take(2) {
        if !supported_languages().contains(language) {
            continue;
        }
        plan.skill_areas.push(language.to_string());
        for difficulty in [Difficulty::Beginner, Difficulty::Intermediate] {
            if let Some(template) = first_template(language, difficulty) {
                plan.exercises.push(PlannedExercise {
                    language: language.to_string(),
                    difficulty,
                    template: template.to_spec(),
                });
                plan.estimated_time += template.time_limit;
            }
        }
    }

    let strong_profile = skill_vector.values().any(|level| *level > 0.8);
    if strong_profile && plan.exercises.len() >= 2 {
        if let Some(template) = languages
            .first()
            .and_then(|language| first_template(language, Difficulty::Advanced))
        {
            plan.exercises.push(PlannedExercise {
                language: template.language.to_string(),
                difficulty: Difficulty::Advanced,
                template: template.to_spec(),
            });
            plan.estimated_time += template.time_limit;
        }
    }

    plan
}

fn next_exercise(user_id: &str, state: &AssessmentState, now: DateTime<Utc>) -> Option<Exercise> {
    let index = state.exercises_completed as usize;
    let planned = state.assessment_plan.exercises.get(index)?;
    Some(Exercise {
        id: format!("{}_exercise_{}", user_id, index),
        language: planned.language.clone(),
        difficulty: planned.difficulty,
        spec: planned.template.clone(),
        created_at: now,
    })
}

pub fn adaptive_difficulty(performance: &PerformanceData, current: Difficulty) -> Difficulty {
    if performance.average_score > 85.0 && performance.completion_time < 20.0 {
        current.harder()
    } else if performance.average_score < 50.0 && performance.completion_time > 40.0 {
        current.easier()
    } else if Difficulty::LADDER.contains(&current) {
        current
    } else {
        Difficulty::Beginner
    }
}

// ============================================================================
// Scoring
// ============================================================================

pub fn evaluate_solution(
    code: &str,
    exercise: Option<&Exercise>,
    now: DateTime<Utc>,
) -> Evaluation {
    let Some(exercise) = exercise.filter(|_| !code.is_empty()) else {
        return Evaluation {
            score: 0,
            feedback: vec!["No solution provided".to_string()],
            ..Default::default()
        };
    };

    let mut feedback = Vec::new();
    let mut components = BTreeMap::new();

    let correctness = check_correctness(code);
    components.insert("correctness".to_string(), correctness);
    feedback.push(if correctness > 0.0 {
        "✓ Basic functionality implemented"
    } else {
        "✗ Solution doesn't meet basic requirements"
    });

    let quality = assess_code_quality(code);
    components.insert("code_quality".to_string(), quality);
    feedback.push(if quality > 0.7 {
        "✓ Good code structure and readability"
    } else if quality > 0.4 {
        "△ Code could be more readable"
    } else {
        "✗ Consider improving code structure"
    });

    let efficiency = assess_efficiency(code, &exercise.spec.skills);
    components.insert("efficiency".to_string(), efficiency);
    if efficiency > 0.7 {
        feedback.push("✓ Efficient algorithm implementation");
    }

    // Components without a heuristic count as 50%
    let total: f64 = SCORING_CRITERIA
        .iter()
        .map(|(criterion, weight)| components.get(*criterion).copied().unwrap_or(0.5) * weight)
        .sum();

    Evaluation {
        score: (total * 100.0).floor().max(0.0) as u32,
        score_components: components,
        feedback: feedback.into_iter().map(str::to_string).collect(),
        evaluation_timestamp: Some(now),
    }
}

fn check_correctness(code: &str) -> f64 {
    if code.trim().chars().count() < 10 {
        return 0.0;
    }
    let checks = [
        code.contains("def ") || code.contains("function "),
        code.contains("return "),
        ["if", "for", "while", "in"].iter().any(|kw| code.contains(kw)),
        !code.contains("pass") && !code.to_lowercase().contains("todo"),
    ];
    checks.iter().filter(|passed| **passed).count() as f64 / checks.len() as f64
}

fn assess_code_quality(code: &str) -> f64 {
    if code.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;
    if code.lines().any(|line| !line.trim().is_empty() && line.starts_with("    ")) {
        score += 0.2;
    }
    if code
        .split_whitespace()
        .any(|word| word.chars().count() > 3 && word.chars().all(char::is_alphabetic))
    {
        score += 0.3;
    }
    if code.contains('#') || code.contains("\"\"\"") || code.contains("'''") {
        score += 0.2;
    }
    if (20..=500).contains(&code.chars().count()) {
        score += 0.3;
    }
    score
}

fn assess_efficiency(code: &str, skills: &[String]) -> f64 {
    if code.is_empty() {
        return 0.0;
    }
    let lower = code.to_lowercase();
    let has_skill = |name: &str| skills.iter().any(|s| s == name);
    let mut score = 0.5;

    if has_skill("algorithms") {
        if lower.contains("binary") || lower.contains("log") {
            score += 0.3;
        }
        if lower.contains("sort") && code.contains("sorted(") {
            score += 0.2;
        }
    }
    if has_skill("data_structures") && ["dict", "set", "deque"].iter().any(|ds| code.contains(ds)) {
        score += 0.2;
    }
    if code.matches("for").count() > 2 {
        score -= 0.1;
    }
    f64::min(score, 1.0).max(0.0)
}

fn finalize_assessment(user_id: &str, state: &mut AssessmentState, now: DateTime<Utc>) -> FinalResults {
    let average = if state.exercises_completed == 0 {
        0.0
    } else {
        state.total_score as f64 / state.exercises_completed as f64
    };

    let level = SkillLevel::from_average(average);
    let skill_levels: BTreeMap<String, SkillLevel> = state
        .assessment_plan
        .exercises
        .iter()
        .map(|planned| (planned.language.clone(), level))
        .collect();

    let results = FinalResults {
        user_id: user_id.to_string(),
        assessment_id: format!("assessment_{}_{}", user_id, now.timestamp_millis()),
        total_exercises: state.exercises_completed,
        average_score: (average * 100.0).round() / 100.0,
        recommendations: recommendations(average, &skill_levels),
        skill_levels,
        completed_at: Some(now),
        started_at: state.start_time,
        performance_tier: performance_tier(average).to_string(),
    };

    state.status = AssessmentStatus::Completed;
    state.current_exercise = None;
    state.final_results = Some(results.clone());
    results
}

fn recommendations(average: f64, skill_levels: &BTreeMap<String, SkillLevel>) -> Vec<String> {
    let general: [&str; 3] = if average < 60.0 {
        [
            "Focus on fundamental programming concepts",
            "Practice basic data structures and algorithms",
            "Complete beginner-level coding exercises daily",
        ]
    } else if average < 80.0 {
        [
            "Strengthen intermediate programming skills",
            "Learn about time and space complexity",
            "Practice with real-world coding problems",
        ]
    } else {
        [
            "Explore advanced algorithms and data structures",
            "Practice system design concepts",
            "Consider contributing to open source projects",
        ]
    };

    let specific = skill_levels.iter().filter_map(|(skill, level)| match level {
        SkillLevel::Beginner => Some(format!("Take a comprehensive {} course", skill)),
        SkillLevel::Intermediate => Some(format!("Practice advanced {} concepts", skill)),
        SkillLevel::Proficient => None,
    });

    general
        .iter()
        .map(|s| s.to_string())
        .chain(specific)
        .take(5)
        .collect()
}

pub fn performance_tier(average: f64) -> &'static str {
    if average >= 90.0 {
        "Expert"
    } else if average >= 80.0 {
        "Advanced"
    } else if average >= 65.0 {
        "Intermediate"
    } else if average >= 50.0 {
        "Beginner+"
    } else {
        "Beginner"
    }
}
