//! Learning path agent: curriculum recommendations, assessment-driven
//! personalization and module progress tracking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mavericks_protocol::{
    AssessmentCompletedData, Difficulty, EventKind, FinalResults, LearningModule, LearningPath,
    LearningPathRequestedData, ModuleCompletedData, Pace, PathCompletedData, PathRecommendation,
    PersonalizedPathReadyData, ProgressUpdateData, RecommendationsReadyData, SkillLevel,
    SkillsExtractedData,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::base::{
    dispatch, subscribe_all, Agent, AgentCore, HandlerResult, Outcome, Route, StateStore,
};
use crate::event_bus::{Event, EventBus};

pub const LEARNING_PATH_AGENT: &str = "LearningPathAgent";

const MAX_RECOMMENDATIONS: usize = 5;
const STREAK_WINDOW_DAYS: i64 = 30;
const DEFAULT_STUDY_HOURS: f64 = 2.0;

// ============================================================================
// Curricula
// ============================================================================

struct ModuleTemplate {
    title: &'static str,
    description: &'static str,
    duration_hours: u32,
    topics: &'static [&'static str],
    exercises: u32,
}

impl ModuleTemplate {
    fn build(&self) -> LearningModule {
        LearningModule {
            title: self.title.to_string(),
            description: self.description.to_string(),
            duration_hours: self.duration_hours,
            topics: self.topics.iter().map(|t| t.to_string()).collect(),
            exercises: self.exercises,
            ..Default::default()
        }
    }
}

struct Curriculum {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    duration_weeks: u32,
    difficulty: Difficulty,
    prerequisites: &'static [&'static str],
    modules: &'static [ModuleTemplate],
}

impl Curriculum {
    fn recommendation(&self) -> PathRecommendation {
        PathRecommendation {
            curriculum_id: self.id.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            duration_weeks: self.duration_weeks,
            difficulty: self.difficulty,
            prerequisites: self.prerequisites.iter().map(|p| p.to_string()).collect(),
            modules: self.modules.iter().map(ModuleTemplate::build).collect(),
            ..Default::default()
        }
    }
}

const CURRICULA: &[Curriculum] = &[
    Curriculum {
        id: "python_fundamentals",
        title: "Python Programming Fundamentals",
        description: "Master the basics of Python programming",
        duration_weeks: 8,
        difficulty: Difficulty::Beginner,
        prerequisites: &[],
        modules: &[
            ModuleTemplate {
                title: "Python Syntax and Data Types",
                description: "Learn basic Python syntax, variables, and data types",
                duration_hours: 6,
                topics: &["variables", "data_types", "operators", "input_output"],
                exercises: 5,
            },
            ModuleTemplate {
                title: "Control Flow and Functions",
                description: "Master if statements, loops, and function creation",
                duration_hours: 8,
                topics: &["conditionals", "loops", "functions", "scope"],
                exercises: 8,
            },
            ModuleTemplate {
                title: "Data Structures",
                description: "Work with lists, dictionaries, sets, and tuples",
                duration_hours: 10,
                topics: &["lists", "dictionaries", "sets", "tuples"],
                exercises: 12,
            },
            ModuleTemplate {
                title: "File I/O and Error Handling",
                description: "Handle files and manage exceptions",
                duration_hours: 6,
                topics: &["file_operations", "exceptions", "debugging"],
                exercises: 6,
            },
        ],
    },
    Curriculum {
        id: "web_development_basics",
        title: "Web Development Fundamentals",
        description: "Build modern web applications",
        duration_weeks: 12,
        difficulty: Difficulty::Intermediate,
        prerequisites: &["html", "css", "javascript"],
        modules: &[
            ModuleTemplate {
                title: "HTML5 and Semantic Markup",
                description: "Create structured, accessible web pages",
                duration_hours: 8,
                topics: &["html5_elements", "forms", "accessibility", "seo"],
                exercises: 6,
            },
            ModuleTemplate {
                title: "CSS3 and Responsive Design",
                description: "Style websites with modern CSS",
                duration_hours: 12,
                topics: &["flexbox", "grid", "animations", "responsive_design"],
                exercises: 10,
            },
            ModuleTemplate {
                title: "JavaScript ES6+",
                description: "Modern JavaScript programming",
                duration_hours: 15,
                topics: &["arrow_functions", "promises", "async_await", "modules"],
                exercises: 15,
            },
            ModuleTemplate {
                title: "Frontend Framework (React)",
                description: "Build interactive user interfaces",
                duration_hours: 20,
                topics: &["components", "state", "hooks", "routing"],
                exercises: 12,
            },
        ],
    },
    Curriculum {
        id: "data_structures_algorithms",
        title: "Data Structures and Algorithms",
        description: "Master fundamental CS concepts",
        duration_weeks: 16,
        difficulty: Difficulty::Advanced,
        prerequisites: &["programming_basics"],
        modules: &[
            ModuleTemplate {
                title: "Array and String Algorithms",
                description: "Master array and string manipulation",
                duration_hours: 12,
                topics: &["two_pointers", "sliding_window", "string_matching"],
                exercises: 20,
            },
            ModuleTemplate {
                title: "Linked Lists and Trees",
                description: "Understand linear and hierarchical data structures",
                duration_hours: 15,
                topics: &["linked_lists", "binary_trees", "tree_traversal"],
                exercises: 25,
            },
            ModuleTemplate {
                title: "Graphs and Dynamic Programming",
                description: "Advanced algorithmic concepts",
                duration_hours: 20,
                topics: &["graph_algorithms", "dp_patterns", "optimization"],
                exercises: 30,
            },
        ],
    },
];

/// Skill or category name to the curricula it leads into.
const SKILL_TO_CURRICULUM: &[(&str, &[&str])] = &[
    ("python", &["python_fundamentals", "data_structures_algorithms"]),
    ("javascript", &["web_development_basics"]),
    ("web_technologies", &["web_development_basics"]),
    ("algorithms", &["data_structures_algorithms"]),
    ("data_structures", &["data_structures_algorithms"]),
];

const FOUNDATIONAL_MODULES: &[(&str, ModuleTemplate)] = &[
    (
        "python",
        ModuleTemplate {
            title: "Python Basics Review",
            description: "Strengthen Python fundamentals",
            duration_hours: 8,
            topics: &["syntax", "variables", "basic_operations"],
            exercises: 10,
        },
    ),
    (
        "javascript",
        ModuleTemplate {
            title: "JavaScript Fundamentals",
            description: "Core JavaScript concepts and syntax",
            duration_hours: 10,
            topics: &["variables", "functions", "objects", "arrays"],
            exercises: 12,
        },
    ),
];

const INTERMEDIATE_MODULES: &[(&str, ModuleTemplate)] = &[
    (
        "python",
        ModuleTemplate {
            title: "Advanced Python Concepts",
            description: "Object-oriented programming and advanced features",
            duration_hours: 12,
            topics: &["oop", "decorators", "generators", "context_managers"],
            exercises: 15,
        },
    ),
    (
        "javascript",
        ModuleTemplate {
            title: "Modern JavaScript",
            description: "ES6+ features and async programming",
            duration_hours: 15,
            topics: &["arrow_functions", "promises", "async_await", "modules"],
            exercises: 18,
        },
    ),
];

const INTERVIEW_MODULE: ModuleTemplate = ModuleTemplate {
    title: "Technical Interview Preparation",
    description: "Practice coding interviews and system design",
    duration_hours: 15,
    topics: &["interview_practice", "system_design", "behavioral_questions"],
    exercises: 20,
};

fn curriculum(id: &str) -> Option<&'static Curriculum> {
    CURRICULA.iter().find(|c| c.id == id)
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathProgress {
    pub status: String,
    pub completed_modules: u32,
    pub total_modules: u32,
    pub start_date: DateTime<Utc>,
    pub estimated_completion: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedModule {
    pub path_id: Option<String>,
    pub module_id: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub completion_time: Option<f64>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LearningState {
    pub user_id: String,
    pub extracted_skills: BTreeMap<String, Vec<String>>,
    pub skill_vector: BTreeMap<String, f64>,
    pub recommendations: Vec<PathRecommendation>,
    pub active_paths: Vec<LearningPath>,
    pub completed_modules: Vec<CompletedModule>,
    pub progress: BTreeMap<String, PathProgress>,
    pub assessment_results: Option<FinalResults>,
    pub skill_levels: BTreeMap<String, SkillLevel>,
    pub refined_recommendations: Vec<PathRecommendation>,
    pub personalized_path: Option<LearningPath>,
    pub created_at: Option<DateTime<Utc>>,
    pub path_generated_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub path_id: String,
    pub path_title: String,
    pub next_module: LearningModule,
    pub priority: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningAchievement {
    pub title: &'static str,
    pub description: &'static str,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningDashboard {
    pub user_id: String,
    pub active_paths: Vec<LearningPath>,
    pub progress: BTreeMap<String, PathProgress>,
    pub completed_modules: usize,
    pub recommendations: Vec<PathRecommendation>,
    pub next_actions: Vec<NextAction>,
    pub learning_streak: u32,
    pub total_study_time: f64,
    pub skill_progress: BTreeMap<String, u32>,
    pub achievements: Vec<LearningAchievement>,
}

// ============================================================================
// Agent
// ============================================================================

pub struct LearningPathAgent {
    core: AgentCore,
    state: StateStore<LearningState>,
}

impl LearningPathAgent {
    const ROUTES: &'static [Route<Self>] = &[
        (EventKind::SKILLS_EXTRACTED, Self::handle_skills_extracted),
        (EventKind::ASSESSMENT_COMPLETED, Self::handle_assessment_completed),
        (EventKind::LEARNING_PATH_REQUESTED, Self::handle_path_request),
        (EventKind::LEARNING_MODULE_COMPLETED, Self::handle_module_completion),
        (EventKind::LEARNING_PROGRESS_UPDATE, Self::handle_progress_update),
    ];

    pub fn new(bus: &Arc<EventBus>) -> Arc<Self> {
        let agent = Arc::new(Self {
            core: AgentCore::new(LEARNING_PATH_AGENT, bus),
            state: StateStore::new(),
        });
        subscribe_all(&agent, Self::ROUTES);
        agent
    }

    fn handle_skills_extracted(&self, event: &Event) -> HandlerResult {
        let data: SkillsExtractedData = event.decode()?;
        let recommendations = recommend_paths(&data.extracted_skills, &data.skill_vector);
        let now = self.core.now();

        self.state.insert(
            &event.user_id,
            LearningState {
                user_id: event.user_id.clone(),
                extracted_skills: data.extracted_skills,
                skill_vector: data.skill_vector,
                recommendations: recommendations.clone(),
                created_at: Some(now),
                ..Default::default()
            },
        );

        info!(user_id = %event.user_id, total = recommendations.len(), "Generated learning recommendations");

        self.core.emit_event(
            EventKind::LEARNING_RECOMMENDATIONS_READY,
            None,
            &event.user_id,
            RecommendationsReadyData {
                total_paths: recommendations.len(),
                estimated_time: recommendations.iter().map(|r| r.duration_weeks).sum(),
                recommendations: recommendations.clone(),
            },
        );

        Outcome::ok(json!({
            "status": "recommendations_generated",
            "recommendations": recommendations,
        }))
    }

    fn handle_assessment_completed(&self, event: &Event) -> HandlerResult {
        let data: AssessmentCompletedData = event.decode()?;
        let results = data.final_results;
        let now = self.core.now();

        let personalized = self.state.update_existing(&event.user_id, |state| {
            let refined = refine_recommendations(&state.recommendations, &results);
            let owner = if results.user_id.is_empty() {
                event.user_id.as_str()
            } else {
                results.user_id.as_str()
            };
            let path = personalized_path(owner, &results, now);

            state.skill_levels = results.skill_levels.clone();
            state.refined_recommendations = refined.clone();
            state.personalized_path = Some(path.clone());
            state.assessment_results = Some(results.clone());
            state.path_generated_at = Some(now);
            (path, refined)
        });
        let Some((path, refined)) = personalized else {
            return Ok(Outcome::rejected("Learning state not found"));
        };

        self.core.emit_event(
            EventKind::LEARNING_PERSONALIZED_PATH_READY,
            None,
            &event.user_id,
            PersonalizedPathReadyData {
                skill_gaps_addressed: path.modules.len(),
                personalized_path: path.clone(),
                refined_recommendations: refined,
            },
        );

        Outcome::ok(json!({ "status": "personalized_path_created", "path": path }))
    }

    fn handle_path_request(&self, event: &Event) -> HandlerResult {
        let data: LearningPathRequestedData = event.decode()?;
        let now = self.core.now();

        let created = self.state.update_existing(&event.user_id, |state| {
            let path = custom_path(&data, state.active_paths.len() + 1, now);
            let progress = PathProgress {
                status: "started".to_string(),
                completed_modules: 0,
                total_modules: path.modules.len() as u32,
                start_date: now,
                estimated_completion: completion_date(&path, data.time_commitment, now),
                completion_date: None,
            };
            state.progress.insert(path.id.clone(), progress.clone());
            state.active_paths.push(path.clone());
            state.last_updated = Some(now);
            (path, progress.estimated_completion)
        });
        let Some((path, estimated_completion)) = created else {
            return Ok(Outcome::rejected("Learning state not found"));
        };

        Outcome::ok(json!({
            "status": "custom_path_created",
            "path": path,
            "estimated_completion": estimated_completion,
        }))
    }

    fn handle_module_completion(&self, event: &Event) -> HandlerResult {
        let data: ModuleCompletedData = event.decode()?;
        let now = self.core.now();

        let completed = self.state.update_existing(&event.user_id, |state| {
            let mut finished = None;
            if let Some(progress) = data.path_id.as_ref().and_then(|id| state.progress.get_mut(id)) {
                progress.completed_modules += 1;
                if progress.completed_modules >= progress.total_modules
                    && progress.status != "completed"
                {
                    progress.status = "completed".to_string();
                    progress.completion_date = Some(now);
                    finished = Some(progress.total_modules);
                }
            }

            state.completed_modules.push(CompletedModule {
                path_id: data.path_id.clone(),
                module_id: data.module_id.clone(),
                completed_at: now,
                completion_time: data.completion_time,
                score: data.score,
            });
            state.last_updated = Some(now);

            let path_progress = data
                .path_id
                .as_ref()
                .and_then(|id| state.progress.get(id))
                .cloned();
            (finished, path_progress, next_actions(state))
        });
        let Some((finished, path_progress, next)) = completed else {
            return Ok(Outcome::rejected("Learning state not found"));
        };

        if let (Some(total_modules), Some(path_id)) = (finished, data.path_id) {
            info!(user_id = %event.user_id, path_id = %path_id, "Learning path completed");
            self.core.emit_event(
                EventKind::LEARNING_PATH_COMPLETED,
                None,
                &event.user_id,
                PathCompletedData {
                    path_id,
                    completion_date: Some(now),
                    total_modules,
                },
            );
        }

        Outcome::ok(json!({
            "status": "module_completed",
            "path_progress": path_progress.map_or_else(|| json!({}), |p| json!(p)),
            "next_recommendations": next,
        }))
    }

    fn handle_progress_update(&self, event: &Event) -> HandlerResult {
        let data: ProgressUpdateData = event.decode()?;
        let now = self.core.now();

        let updated = self.state.update_existing(&event.user_id, |state| {
            for (path_id, patch) in &data.progress_data {
                let Some(progress) = state.progress.get_mut(path_id) else {
                    continue;
                };
                if let Some(status) = &patch.status {
                    progress.status = status.clone();
                }
                if let Some(completed) = patch.completed_modules {
                    progress.completed_modules = completed;
                }
            }
            state.last_updated = Some(now);
        });
        if updated.is_none() {
            return Ok(Outcome::rejected("Learning state not found"));
        }

        Outcome::ok(json!({ "status": "progress_updated" }))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_learning_state(&self, user_id: &str) -> Option<LearningState> {
        self.state.get(user_id)
    }

    pub fn get_user_learning_dashboard(&self, user_id: &str) -> Outcome {
        let today = self.core.now();
        let dashboard = self.state.read(user_id, |state| LearningDashboard {
            user_id: user_id.to_string(),
            active_paths: state.active_paths.clone(),
            progress: state.progress.clone(),
            completed_modules: state.completed_modules.len(),
            recommendations: state.recommendations.clone(),
            next_actions: next_actions(state),
            learning_streak: learning_streak(&state.completed_modules, today),
            total_study_time: state
                .completed_modules
                .iter()
                .map(|m| m.completion_time.unwrap_or(DEFAULT_STUDY_HOURS))
                .sum(),
            skill_progress: skill_progress(&state.completed_modules),
            achievements: learning_achievements(state.completed_modules.len(), today),
        });

        match dashboard {
            Some(dashboard) => match serde_json::to_value(dashboard) {
                Ok(value) => Outcome::Ok(value),
                Err(e) => Outcome::rejected(e.to_string()),
            },
            None => Outcome::rejected("Learning state not found"),
        }
    }
}

impl Agent for LearningPathAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn process_event(&self, event: &Event) -> HandlerResult {
        dispatch(self, Self::ROUTES, event)
    }

    fn capabilities(&self) -> Value {
        let mappings: BTreeMap<&str, &[&str]> = SKILL_TO_CURRICULUM.iter().copied().collect();
        json!({
            "agent_name": LEARNING_PATH_AGENT,
            "version": "1.0.0",
            "capabilities": [
                "personalized_curriculum_generation",
                "adaptive_learning_paths",
                "progress_tracking",
                "skill_gap_analysis",
                "milestone_management",
            ],
            "curriculum_templates": CURRICULA.iter().map(|c| c.id).collect::<Vec<_>>(),
            "skill_mappings": mappings,
            "supported_events": Self::ROUTES.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            "emitted_events": [
                EventKind::LEARNING_RECOMMENDATIONS_READY,
                EventKind::LEARNING_PERSONALIZED_PATH_READY,
                EventKind::LEARNING_PATH_COMPLETED,
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
// Path building
// ============================================================================

/// Curricula reachable from the user's categories or individual skills, best
/// match first.
pub fn recommend_paths(
    extracted: &BTreeMap<String, Vec<String>>,
    skill_vector: &BTreeMap<String, f64>,
) -> Vec<PathRecommendation> {
    let strong: Vec<&str> = skill_vector
        .iter()
        .filter(|(_, v)| **v > 0.7)
        .map(|(k, _)| k.as_str())
        .collect();
    let weak: Vec<&str> = skill_vector
        .iter()
        .filter(|(_, v)| **v < 0.4)
        .map(|(k, _)| k.as_str())
        .collect();

    let mut seen = BTreeSet::new();
    let mut recommendations = Vec::new();

    for (category, skills) in extracted {
        let keys = std::iter::once(category.as_str()).chain(skills.iter().map(String::as_str));
        for key in keys {
            let Some((_, ids)) = SKILL_TO_CURRICULUM.iter().find(|(name, _)| *name == key) else {
                continue;
            };
            for id in *ids {
                let Some(curriculum) = curriculum(id) else {
                    continue;
                };
                if !seen.insert(*id) {
                    continue;
                }

                let mut rec = curriculum.recommendation();
                let mentions = |keys: &[&str]| {
                    skills
                        .iter()
                        .any(|skill| keys.iter().any(|k| k.to_lowercase().contains(skill.as_str())))
                };
                if mentions(&strong) {
                    rec.recommended_pace = Pace::Accelerated;
                    rec.skip_basics = true;
                } else if mentions(&weak) {
                    rec.recommended_pace = Pace::Thorough;
                    rec.extra_practice = true;
                }
                rec.match_score = match_score(&rec, extracted, skill_vector);
                recommendations.push(rec);
            }
        }
    }

    recommendations.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}

fn match_score(
    rec: &PathRecommendation,
    extracted: &BTreeMap<String, Vec<String>>,
    skill_vector: &BTreeMap<String, f64>,
) -> f64 {
    let title = rec.title.to_lowercase();
    let description = rec.description.to_lowercase();
    let mentioned = |needle: &str| title.contains(needle) || description.contains(needle);

    let mut score = 0.0;
    for (category, skills) in extracted {
        if mentioned(&category.replace('_', " ")) {
            score += 0.3;
        }
        for skill in skills {
            if mentioned(skill) {
                score += skill_vector.get(&format!("skill_{skill}")).copied().unwrap_or(0.5) * 0.1;
            }
        }
    }
    score.min(1.0)
}

/// Re-grade recommendations against an assessment, highest priority first.
pub fn refine_recommendations(
    current: &[PathRecommendation],
    results: &FinalResults,
) -> Vec<PathRecommendation> {
    let mut refined: Vec<PathRecommendation> = current
        .iter()
        .map(|rec| {
            let mut rec = rec.clone();
            if results.average_score >= 80.0 {
                rec.difficulty = Difficulty::Advanced;
                rec.accelerated_track = true;
            } else if results.average_score >= 60.0 {
                rec.difficulty = Difficulty::Intermediate;
            } else {
                rec.difficulty = Difficulty::Beginner;
                rec.foundational_support = true;
            }

            let title = rec.title.to_lowercase();
            let priority = results
                .skill_levels
                .iter()
                .map(|(skill, level)| match level {
                    SkillLevel::Beginner if title.contains(skill.as_str()) => 3,
                    SkillLevel::Intermediate => 2,
                    _ => 1,
                })
                .sum();
            rec.priority_score = Some(priority);
            rec
        })
        .collect();

    refined.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
    refined
}

/// Foundational modules for beginner skills, then intermediate modules.
pub fn personalized_path(user_id: &str, results: &FinalResults, now: DateTime<Utc>) -> LearningPath {
    let difficulty = if results.average_score >= 80.0 {
        Difficulty::Intermediate
    } else if results.average_score >= 60.0 {
        Difficulty::BeginnerPlus
    } else {
        Difficulty::Beginner
    };

    let pick = |table: &[(&str, ModuleTemplate)], wanted: SkillLevel| -> Vec<LearningModule> {
        results
            .skill_levels
            .iter()
            .filter(|(_, level)| **level == wanted)
            .filter_map(|(skill, _)| table.iter().find(|(name, _)| *name == skill.as_str()))
            .map(|(_, module)| module.build())
            .collect()
    };
    let mut modules = pick(FOUNDATIONAL_MODULES, SkillLevel::Beginner);
    modules.extend(pick(INTERMEDIATE_MODULES, SkillLevel::Intermediate));

    LearningPath {
        id: format!("personalized_{}_{}", user_id, now.timestamp()),
        title: "Your Personalized Learning Journey".to_string(),
        description: format!(
            "Customized path based on your assessment results (Score: {}%)",
            results.average_score
        ),
        difficulty: Some(difficulty),
        estimated_weeks: Some(modules.len() as u32 * 2),
        modules,
        skill_focus: results.skill_levels.keys().cloned().collect(),
        assessment_based: true,
        created_at: Some(now),
        ..Default::default()
    }
}

/// A requested path: the chosen curriculum stretched or compressed to the
/// weekly time commitment, plus goal-specific modules.
pub fn custom_path(request: &LearningPathRequestedData, ordinal: usize, now: DateTime<Utc>) -> LearningPath {
    let base = request
        .path_type
        .as_deref()
        .and_then(curriculum)
        .unwrap_or(&CURRICULA[0]);

    let mut modules: Vec<LearningModule> = base.modules.iter().map(ModuleTemplate::build).collect();
    if request.time_commitment < 5 {
        for module in &mut modules {
            module.duration_hours = module.duration_hours * 3 / 2;
            module.extra_practice = true;
        }
    } else if request.time_commitment > 10 {
        for module in &mut modules {
            module.duration_hours = module.duration_hours * 4 / 5;
            module.accelerated = true;
        }
    }

    for goal in &request.learning_goals {
        if matches!(goal.to_lowercase().as_str(), "job interview" | "interview prep") {
            modules.push(INTERVIEW_MODULE.build());
        }
    }

    let path_type = request.path_type.as_deref().unwrap_or(base.id);
    LearningPath {
        id: format!("custom_{}_{}_{}", path_type, now.timestamp(), ordinal),
        title: base.title.to_string(),
        description: base.description.to_string(),
        modules,
        time_commitment: Some(request.time_commitment),
        learning_goals: request.learning_goals.clone(),
        customized: true,
        created_at: Some(now),
        ..Default::default()
    }
}

fn completion_date(path: &LearningPath, hours_per_week: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    let total_hours: u32 = path.modules.iter().map(|m| m.duration_hours).sum();
    let weeks = f64::from(total_hours) / f64::from(hours_per_week.max(1));
    now + Duration::seconds((weeks * 7.0 * 86_400.0) as i64)
}

fn next_actions(state: &LearningState) -> Vec<NextAction> {
    state
        .active_paths
        .iter()
        .filter_map(|path| {
            let done = state
                .progress
                .get(&path.id)
                .map_or(0, |p| p.completed_modules as usize);
            path.modules.get(done).map(|module| NextAction {
                kind: "continue_path",
                path_id: path.id.clone(),
                path_title: path.title.clone(),
                next_module: module.clone(),
                priority: "high",
            })
        })
        .collect()
}

/// Consecutive days with a completed module, counting back from today.
fn learning_streak(completed: &[CompletedModule], now: DateTime<Utc>) -> u32 {
    let days: BTreeSet<_> = completed.iter().map(|m| m.completed_at.date_naive()).collect();
    let today = now.date_naive();
    (0..STREAK_WINDOW_DAYS)
        .take_while(|offset| days.contains(&(today - Duration::days(*offset))))
        .count() as u32
}

fn skill_progress(completed: &[CompletedModule]) -> BTreeMap<String, u32> {
    let mut progress = BTreeMap::new();
    for module in completed {
        let id = module.module_id.as_deref().unwrap_or_default().to_lowercase();
        if let Some(skill) = ["python", "javascript"].into_iter().find(|s| id.contains(s)) {
            *progress.entry(skill.to_string()).or_insert(0) += 1;
        }
    }
    progress
}

fn learning_achievements(completed: usize, now: DateTime<Utc>) -> Vec<LearningAchievement> {
    let mut achievements = Vec::new();
    if completed >= 5 {
        achievements.push(LearningAchievement {
            title: "Dedicated Learner",
            description: "Completed 5 learning modules",
            earned_at: now,
        });
    }
    if completed >= 20 {
        achievements.push(LearningAchievement {
            title: "Learning Marathon",
            description: "Completed 20 learning modules",
            earned_at: now,
        });
    }
    achievements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::{BusConfig, Clock, ManualClock};
    use chrono::TimeZone;

    fn skills(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(c, s)| (c.to_string(), s.iter().map(|x| x.to_string()).collect()))
            .collect()
    }

    fn extracted_event(user: &str) -> Event {
        Event::new(
            EventKind::SKILLS_EXTRACTED,
            "ProfileAgent",
            user,
            json!({
                "extracted_skills": { "programming_languages": ["python"] },
                "skill_vector": { "programming_languages": 0.063, "skill_python": 1.0 },
            }),
            Utc::now(),
        )
    }

    #[test]
    fn test_python_skill_ranks_fundamentals_first() {
        let extracted = skills(&[("programming_languages", &["python"])]);
        let vector = BTreeMap::from([("skill_python".to_string(), 1.0)]);
        let recs = recommend_paths(&extracted, &vector);

        let ids: Vec<_> = recs.iter().map(|r| r.curriculum_id.as_str()).collect();
        assert_eq!(ids, vec!["python_fundamentals", "data_structures_algorithms"]);
        assert!((recs[0].match_score - 0.1).abs() < 1e-9);
        assert_eq!(recs[0].recommended_pace, Pace::Accelerated);
        assert!(recs[0].skip_basics);
    }

    #[test]
    fn test_category_mapping_deduplicates() {
        let extracted = skills(&[("web_technologies", &["html", "css"]), ("programming_languages", &["javascript"])]);
        let recs = recommend_paths(&extracted, &BTreeMap::new());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].curriculum_id, "web_development_basics");
        assert_eq!(recs[0].recommended_pace, Pace::Normal);
    }

    #[test]
    fn test_skills_extracted_emits_recommendations() {
        let bus = EventBus::new(100);
        let agent = LearningPathAgent::new(&bus);
        let outcome = agent.process_event(&extracted_event("u1")).unwrap().into_value();
        assert_eq!(outcome["status"], "recommendations_generated");

        let ready = bus.get_events_for_user("u1", Some(&[EventKind::LEARNING_RECOMMENDATIONS_READY.to_string()]), 10);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].payload["total_paths"], 2);
        assert_eq!(ready[0].payload["estimated_time"], 8 + 16);
    }

    #[test]
    fn test_personalized_path_from_assessment() {
        let results = FinalResults {
            user_id: "u1".to_string(),
            average_score: 72.5,
            skill_levels: BTreeMap::from([
                ("javascript".to_string(), SkillLevel::Intermediate),
                ("python".to_string(), SkillLevel::Beginner),
            ]),
            ..Default::default()
        };
        let path = personalized_path("u1", &results, Utc::now());
        let titles: Vec<_> = path.modules.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Python Basics Review", "Modern JavaScript"]);
        assert_eq!(path.difficulty, Some(Difficulty::BeginnerPlus));
        assert_eq!(path.estimated_weeks, Some(4));
        assert!(path.description.contains("Score: 72.5%"));
    }

    #[test]
    fn test_refinement_priorities() {
        let extracted = skills(&[("programming_languages", &["python"])]);
        let recs = recommend_paths(&extracted, &BTreeMap::new());
        let results = FinalResults {
            average_score: 40.0,
            skill_levels: BTreeMap::from([("python".to_string(), SkillLevel::Beginner)]),
            ..Default::default()
        };
        let refined = refine_recommendations(&recs, &results);
        assert_eq!(refined[0].curriculum_id, "python_fundamentals");
        assert_eq!(refined[0].priority_score, Some(3));
        assert_eq!(refined[1].priority_score, Some(1));
        assert!(refined.iter().all(|r| r.foundational_support && r.difficulty == Difficulty::Beginner));
    }

    #[test]
    fn test_custom_path_time_commitment() {
        let request = LearningPathRequestedData {
            path_type: Some("web_development_basics".to_string()),
            learning_goals: vec!["Interview Prep".to_string()],
            time_commitment: 12,
        };
        let path = custom_path(&request, 1, Utc::now());
        let hours: Vec<_> = path.modules.iter().map(|m| m.duration_hours).collect();
        assert_eq!(hours, vec![6, 9, 12, 16, 15]);
        assert_eq!(path.modules[4].title, "Technical Interview Preparation");
        assert!(path.modules[0].accelerated);

        let slow = custom_path(
            &LearningPathRequestedData {
                path_type: Some("unknown".to_string()),
                time_commitment: 2,
                ..Default::default()
            },
            2,
            Utc::now(),
        );
        assert_eq!(slow.title, "Python Programming Fundamentals");
        assert_eq!(slow.modules[0].duration_hours, 9);
        assert!(slow.modules[0].extra_practice);
    }

    #[test]
    fn test_module_completion_finishes_path_once() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let bus = EventBus::with_config(BusConfig::default(), clock.clone());
        let agent = LearningPathAgent::new(&bus);
        agent.process_event(&extracted_event("u1")).unwrap();

        let created = agent
            .process_event(&Event::new(
                EventKind::LEARNING_PATH_REQUESTED,
                "system",
                "u1",
                json!({ "path_type": "data_structures_algorithms", "time_commitment": 10 }),
                start,
            ))
            .unwrap()
            .into_value();
        assert_eq!(created["status"], "custom_path_created");
        let path_id = created["path"]["id"].as_str().unwrap().to_string();

        for day in 0..4 {
            let outcome = agent
                .process_event(&Event::new(
                    EventKind::LEARNING_MODULE_COMPLETED,
                    "system",
                    "u1",
                    json!({ "path_id": path_id, "module_id": format!("python_{day}"), "score": 90.0 }),
                    clock.now(),
                ))
                .unwrap()
                .into_value();
            assert_eq!(outcome["status"], "module_completed");
            clock.advance(Duration::days(1));
        }

        let done = bus.get_events_for_user("u1", Some(&[EventKind::LEARNING_PATH_COMPLETED.to_string()]), 10);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].payload["total_modules"], 3);

        clock.set(start + Duration::days(3));
        let dashboard = agent.get_user_learning_dashboard("u1").into_value();
        assert_eq!(dashboard["completed_modules"], 4);
        assert_eq!(dashboard["learning_streak"], 4);
        assert_eq!(dashboard["total_study_time"], 8.0);
        assert_eq!(dashboard["skill_progress"]["python"], 4);
        assert_eq!(dashboard["next_actions"], json!([]));
        assert_eq!(dashboard["progress"][&path_id]["status"], "completed");
    }

    #[test]
    fn test_progress_update_merges_known_paths() {
        let bus = EventBus::new(100);
        let agent = LearningPathAgent::new(&bus);
        agent.process_event(&extracted_event("u1")).unwrap();
        let created = agent
            .process_event(&Event::new(EventKind::LEARNING_PATH_REQUESTED, "system", "u1", json!({}), Utc::now()))
            .unwrap()
            .into_value();
        let path_id = created["path"]["id"].as_str().unwrap().to_string();

        agent
            .process_event(&Event::new(
                EventKind::LEARNING_PROGRESS_UPDATE,
                "system",
                "u1",
                json!({ "progress_data": { path_id.clone(): { "status": "paused" }, "ghost": { "status": "x" } } }),
                Utc::now(),
            ))
            .unwrap();
        let state = agent.get_learning_state("u1").unwrap();
        assert_eq!(state.progress[&path_id].status, "paused");
        assert!(!state.progress.contains_key("ghost"));

        let dashboard = agent.get_user_learning_dashboard("u1").into_value();
        assert_eq!(dashboard["next_actions"][0]["type"], "continue_path");
        assert_eq!(dashboard["next_actions"][0]["next_module"]["title"], "Python Syntax and Data Types");
    }

    #[test]
    fn test_missing_state_is_rejected() {
        let bus = EventBus::new(100);
        let agent = LearningPathAgent::new(&bus);
        for kind in [
            EventKind::ASSESSMENT_COMPLETED,
            EventKind::LEARNING_PATH_REQUESTED,
            EventKind::LEARNING_MODULE_COMPLETED,
            EventKind::LEARNING_PROGRESS_UPDATE,
        ] {
            let outcome = agent
                .process_event(&Event::new(kind, "system", "ghost", json!({}), Utc::now()))
                .unwrap();
            assert_eq!(outcome, Outcome::rejected("Learning state not found"), "{kind}");
        }
        assert_eq!(
            agent.get_user_learning_dashboard("ghost"),
            Outcome::rejected("Learning state not found")
        );
    }
}
