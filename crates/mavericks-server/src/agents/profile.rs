//! Profile agent: registration, résumé skill extraction and skill-vector refinement.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mavericks_protocol::{
    EventKind, ProfileCreatedData, ProfileUpdateRequestedData, ResumeUploadedData,
    SkillsAssessmentCompletedData, SkillsExtractedData, SkillsRefinedData, UserRegisteredData,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::base::{
    dispatch, subscribe_all, Agent, AgentCore, HandlerResult, Outcome, Route, StateStore,
};
use crate::event_bus::{Event, EventBus};

pub const PROFILE_AGENT: &str = "ProfileAgent";

/// Keyword categories in matching order, with their skill-vector weight.
const SKILL_CATEGORIES: &[(&str, f64, &[&str])] = &[
    (
        "programming_languages",
        1.0,
        &[
            "python", "java", "javascript", "typescript", "c++", "c#", "go", "rust", "swift",
            "kotlin", "scala", "ruby", "php", "perl", "r", "matlab",
        ],
    ),
    (
        "web_technologies",
        0.8,
        &[
            "html", "css", "react", "angular", "vue", "node.js", "express", "django", "flask",
            "spring", "asp.net", "bootstrap", "tailwind", "sass", "less",
        ],
    ),
    (
        "databases",
        0.7,
        &[
            "mysql", "postgresql", "mongodb", "redis", "elasticsearch", "cassandra", "oracle",
            "sql server", "sqlite", "dynamodb", "neo4j", "influxdb",
        ],
    ),
    (
        "cloud_platforms",
        0.9,
        &[
            "aws", "azure", "gcp", "google cloud", "docker", "kubernetes", "terraform",
            "ansible", "jenkins", "gitlab", "github actions", "circleci",
        ],
    ),
    (
        "data_science",
        0.9,
        &[
            "machine learning", "deep learning", "tensorflow", "pytorch", "scikit-learn",
            "pandas", "numpy", "jupyter", "tableau", "power bi", "spark", "hadoop",
        ],
    ),
    (
        "mobile_development",
        0.8,
        &[
            "ios", "android", "react native", "flutter", "xamarin", "ionic", "swift", "kotlin",
            "objective-c", "dart",
        ],
    ),
    (
        "devops_tools",
        0.7,
        &[
            "docker", "kubernetes", "jenkins", "gitlab", "github", "terraform", "ansible", "chef",
            "puppet", "nagios", "prometheus", "grafana",
        ],
    ),
    (
        "frameworks",
        0.6,
        &[
            "spring boot", "django", "flask", "express", "react", "angular", "vue", ".net",
            "laravel", "rails", "symfony", "fastapi",
        ],
    ),
];

const ADDITIONAL_CATEGORY: &str = "additional_technologies";
const ADDITIONAL_WEIGHT: f64 = 0.5;

/// Compiled keyword matchers, one list per category.
static KEYWORD_MATCHERS: Lazy<Vec<Vec<(&'static str, Regex)>>> = Lazy::new(|| {
    SKILL_CATEGORIES
        .iter()
        .map(|(_, _, keywords)| {
            keywords
                .iter()
                .map(|keyword| (*keyword, Regex::new(&keyword_pattern(keyword)).unwrap()))
                .collect()
        })
        .collect()
});

/// Free-form technology mentions outside the keyword lists
static ADDITIONAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b\w+\.js\b",
        r"(?i)\bAPI\b",
        r"(?i)\bREST(?:ful)?\b",
        r"(?i)\bGraphQL\b",
        r"(?i)\bMicroservices?\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Word boundaries only where the keyword edge is itself a word character,
/// so that "c++" and ".net" still match.
fn keyword_pattern(keyword: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let starts = keyword.chars().next().is_some_and(is_word);
    let ends = keyword.chars().last().is_some_and(is_word);
    format!(
        "{}{}{}",
        if starts { r"\b" } else { "" },
        regex::escape(keyword),
        if ends { r"\b" } else { "" }
    )
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileState {
    pub user_id: String,
    pub username: String,
    pub registration_date: Option<DateTime<Utc>>,
    pub profile_completeness: u32,
    pub resume_text: Option<String>,
    pub extracted_skills: BTreeMap<String, Vec<String>>,
    pub skill_vector: BTreeMap<String, f64>,
    pub skills_extraction_date: Option<DateTime<Utc>>,
    pub assessment_date: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Free-form fields from profile updates
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

pub struct ProfileAgent {
    core: AgentCore,
    state: StateStore<ProfileState>,
}

impl ProfileAgent {
    const ROUTES: &'static [Route<Self>] = &[
        (EventKind::USER_REGISTERED, Self::handle_user_registration),
        (EventKind::RESUME_UPLOADED, Self::handle_resume_upload),
        (EventKind::PROFILE_UPDATE_REQUESTED, Self::handle_profile_update),
        (EventKind::SKILLS_ASSESSMENT_COMPLETED, Self::handle_skills_assessment),
    ];

    pub fn new(bus: &Arc<EventBus>) -> Arc<Self> {
        let agent = Arc::new(Self {
            core: AgentCore::new(PROFILE_AGENT, bus),
            state: StateStore::new(),
        });
        subscribe_all(&agent, Self::ROUTES);
        agent
    }

    fn handle_user_registration(&self, event: &Event) -> HandlerResult {
        let data: UserRegisteredData = event.decode()?;
        let now = self.core.now();

        self.state.insert(
            &event.user_id,
            ProfileState {
                user_id: event.user_id.clone(),
                username: data.username.clone(),
                registration_date: Some(now),
                profile_completeness: 20,
                last_updated: Some(now),
                ..Default::default()
            },
        );

        self.core.emit_event(
            EventKind::PROFILE_CREATED,
            None,
            &event.user_id,
            ProfileCreatedData {
                username: data.username,
                profile_completeness: 20,
                skills_extracted: false,
                source: data.source,
            },
        );

        Outcome::ok(json!({ "status": "profile_initialized", "completeness": 20 }))
    }

    fn handle_resume_upload(&self, event: &Event) -> HandlerResult {
        let data: ResumeUploadedData = event.decode()?;
        self.process_resume(&event.user_id, &data.resume_text)
    }

    fn process_resume(&self, user_id: &str, resume_text: &str) -> HandlerResult {
        if resume_text.is_empty() {
            return Ok(Outcome::rejected("No resume text provided"));
        }

        let extracted_skills = extract_skills(resume_text);
        let skill_vector = skill_vector(&extracted_skills);
        let completeness = completeness(&extracted_skills);
        let total_skills: usize = extracted_skills.values().map(Vec::len).sum();
        let now = self.core.now();

        self.state.update(user_id, |profile| {
            profile.user_id = user_id.to_string();
            profile.resume_text = Some(resume_text.to_string());
            profile.extracted_skills = extracted_skills.clone();
            profile.skill_vector = skill_vector.clone();
            profile.profile_completeness = completeness;
            profile.last_updated = Some(now);
            profile.skills_extraction_date = Some(now);
        });

        info!(user_id = %user_id, total_skills, "Extracted skills from resume");

        self.core.emit_event(
            EventKind::SKILLS_EXTRACTED,
            None,
            user_id,
            SkillsExtractedData {
                skill_categories: extracted_skills.keys().cloned().collect(),
                extracted_skills: extracted_skills.clone(),
                skill_vector,
                total_skills,
            },
        );

        Outcome::ok(json!({
            "status": "skills_extracted",
            "extracted_skills": extracted_skills,
            "skill_count": total_skills,
            "completeness": completeness,
        }))
    }

    fn handle_profile_update(&self, event: &Event) -> HandlerResult {
        let data: ProfileUpdateRequestedData = event.decode()?;
        let updates = data.updates;
        let now = self.core.now();

        let updated = self.state.update_existing(&event.user_id, |profile| {
            if let Some(username) = &updates.username {
                profile.username = username.clone();
            }
            for (key, value) in &updates.attributes {
                profile.attributes.insert(key.clone(), value.clone());
            }
            profile.last_updated = Some(now);
        });
        if updated.is_none() {
            return Ok(Outcome::rejected("User profile not found"));
        }

        match &updates.resume_text {
            Some(resume_text) => self.process_resume(&event.user_id, resume_text),
            None => Outcome::ok(json!({ "status": "profile_updated", "updates": updates.keys() })),
        }
    }

    fn handle_skills_assessment(&self, event: &Event) -> HandlerResult {
        let data: SkillsAssessmentCompletedData = event.decode()?;
        let now = self.core.now();

        let refined = self.state.update_existing(&event.user_id, |profile| {
            let refined = refine_skill_vector(&profile.skill_vector, &data.assessment_results);
            profile.skill_vector = refined.clone();
            profile.assessment_date = Some(now);
            profile.last_updated = Some(now);
            profile.profile_completeness = 100;
            refined
        });
        let Some(refined) = refined else {
            return Ok(Outcome::rejected("User profile not found"));
        };

        self.core.emit_event(
            EventKind::SKILLS_REFINED,
            None,
            &event.user_id,
            SkillsRefinedData {
                refined_skill_vector: refined.clone(),
                assessment_scores: data.assessment_results,
                profile_completeness: 100,
            },
        );

        Outcome::ok(json!({ "status": "skills_refined", "skill_vector": refined }))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_user_profile(&self, user_id: &str) -> Option<ProfileState> {
        self.state.get(user_id)
    }

    /// Target skills whose vector weight is below the proficiency threshold.
    pub fn get_skill_gaps(&self, user_id: &str, target_skills: &[String]) -> Outcome {
        let Some(profile) = self.state.get(user_id) else {
            return Outcome::rejected("Profile not found");
        };

        let gaps: Vec<Value> = target_skills
            .iter()
            .filter_map(|skill| {
                let current = profile
                    .skill_vector
                    .get(&format!("skill_{}", skill.to_lowercase()))
                    .copied()
                    .unwrap_or(0.0);
                (current < 0.7).then(|| {
                    json!({
                        "skill": skill,
                        "current_level": current,
                        "gap_severity": if current < 0.3 { "high" } else { "medium" },
                    })
                })
            })
            .collect();

        Outcome::Ok(json!({
            "total_gaps": gaps.len(),
            "skill_gaps": gaps,
            "profile_completeness": profile.profile_completeness,
        }))
    }
}

impl Agent for ProfileAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn process_event(&self, event: &Event) -> HandlerResult {
        dispatch(self, Self::ROUTES, event)
    }

    fn capabilities(&self) -> Value {
        json!({
            "agent_name": PROFILE_AGENT,
            "version": "1.0.0",
            "capabilities": [
                "skill_extraction",
                "resume_analysis",
                "profile_management",
                "skill_vector_generation",
                "gap_analysis",
            ],
            "supported_events": Self::ROUTES.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            "emitted_events": [
                EventKind::PROFILE_CREATED,
                EventKind::SKILLS_EXTRACTED,
                EventKind::SKILLS_REFINED,
            ],
            "skill_categories": SKILL_CATEGORIES.iter().map(|(name, _, _)| *name).collect::<Vec<_>>(),
            "total_skill_keywords": SKILL_CATEGORIES.iter().map(|(_, _, kws)| kws.len()).sum::<usize>(),
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
// Extraction & scoring
// ============================================================================

pub fn extract_skills(text: &str) -> BTreeMap<String, Vec<String>> {
    let lower = text.to_lowercase();
    let mut extracted = BTreeMap::new();

    for ((category, _, _), matchers) in SKILL_CATEGORIES.iter().zip(KEYWORD_MATCHERS.iter()) {
        let found: Vec<String> = matchers
            .iter()
            .filter(|(_, re)| re.is_match(&lower))
            .map(|(keyword, _)| keyword.to_string())
            .collect();
        if !found.is_empty() {
            extracted.insert(category.to_string(), found);
        }
    }

    let mut additional: Vec<String> = ADDITIONAL_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.as_str().to_lowercase()))
        .collect();
    additional.sort();
    additional.dedup();
    if !additional.is_empty() {
        extracted.insert(ADDITIONAL_CATEGORY.to_string(), additional);
    }

    extracted
}

/// Category strengths plus a `skill_<name>` entry per matched skill.
///
/// Categories are visited in keyword-table order, so a skill listed in two
/// categories takes the weight of the later one.
pub fn skill_vector(extracted: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, f64> {
    let mut vector = BTreeMap::new();
    let ordered = SKILL_CATEGORIES
        .iter()
        .map(|(name, weight, keywords)| (*name, *weight, keywords.len()))
        .chain(std::iter::once((ADDITIONAL_CATEGORY, ADDITIONAL_WEIGHT, 0)));

    for (category, weight, max_skills) in ordered {
        let Some(skills) = extracted.get(category) else {
            continue;
        };
        let denominator = if max_skills > 0 { max_skills as f64 } else { 10.0 };
        let strength = (skills.len() as f64 / denominator).min(1.0) * weight;
        vector.insert(category.to_string(), round3(strength));
        for skill in skills {
            vector.insert(format!("skill_{}", skill), weight);
        }
    }
    vector
}

pub fn completeness(extracted: &BTreeMap<String, Vec<String>>) -> u32 {
    let categories = extracted.len() as u32;
    let skills: u32 = extracted.values().map(|s| s.len() as u32).sum();
    (40 + (categories * 10).min(50) + (skills * 2).min(20)).min(100)
}

fn refine_skill_vector(
    current: &BTreeMap<String, f64>,
    results: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let mut refined = current.clone();
    for (area, score) in results {
        let key = format!("skill_{}", area.to_lowercase());
        if let Some(value) = refined.get_mut(&key) {
            if *score >= 0.8 {
                *value = (*value * 1.2).min(1.0);
            } else if *score < 0.6 {
                *value *= 0.8;
            }
        }
    }
    refined
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
