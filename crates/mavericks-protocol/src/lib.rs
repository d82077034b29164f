//! Shared vocabulary for the Mavericks event bus and its agents.
//!
//! Every event kind that travels over the bus has a typed payload defined in
//! [`event_bus`]. The enums below are the small closed sets those payloads
//! refer to.

use serde::{Deserialize, Serialize};

pub mod event_bus;

pub use event_bus::*;

// ============================================================================
// Difficulty
// ============================================================================

/// Difficulty label shared by exercises, curricula and hackathons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Difficulty {
    #[default]
    Beginner,
    BeginnerPlus,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    /// The ladder adaptive assessments move along.
    pub const LADDER: [Difficulty; 4] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::BeginnerPlus => "beginner-plus",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beginner" => Some(Difficulty::Beginner),
            "beginner-plus" => Some(Difficulty::BeginnerPlus),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            "expert" => Some(Difficulty::Expert),
            _ => None,
        }
    }

    /// One step up the ladder, saturating at expert.
    pub fn harder(self) -> Self {
        let idx = self.ladder_index();
        Self::LADDER[(idx + 1).min(Self::LADDER.len() - 1)]
    }

    /// One step down the ladder, saturating at beginner.
    pub fn easier(self) -> Self {
        let idx = self.ladder_index();
        Self::LADDER[idx.saturating_sub(1)]
    }

    fn ladder_index(self) -> usize {
        Self::LADDER.iter().position(|d| *d == self).unwrap_or(0)
    }
}

// ============================================================================
// Skill level
// ============================================================================

/// Per-language level derived from an assessment average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Proficient,
}

impl SkillLevel {
    pub fn from_average(average: f64) -> Self {
        if average >= 80.0 {
            SkillLevel::Proficient
        } else if average >= 60.0 {
            SkillLevel::Intermediate
        } else {
            SkillLevel::Beginner
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Proficient => "proficient",
        }
    }
}

// ============================================================================
// Achievements
// ============================================================================

/// Achievement families tracked by gamification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    FirstSteps,
    SkillMaster,
    SpeedDemon,
    Perfectionist,
    ConsistentLearner,
    Challenger,
}

impl AchievementKind {
    pub const ALL: [AchievementKind; 6] = [
        AchievementKind::FirstSteps,
        AchievementKind::SkillMaster,
        AchievementKind::SpeedDemon,
        AchievementKind::Perfectionist,
        AchievementKind::ConsistentLearner,
        AchievementKind::Challenger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementKind::FirstSteps => "first_steps",
            AchievementKind::SkillMaster => "skill_master",
            AchievementKind::SpeedDemon => "speed_demon",
            AchievementKind::Perfectionist => "perfectionist",
            AchievementKind::ConsistentLearner => "consistent_learner",
            AchievementKind::Challenger => "challenger",
        }
    }
}

/// Ordered badge tiers. Derived `Ord` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl AchievementTier {
    pub const ALL: [AchievementTier; 4] = [
        AchievementTier::Bronze,
        AchievementTier::Silver,
        AchievementTier::Gold,
        AchievementTier::Platinum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementTier::Bronze => "bronze",
            AchievementTier::Silver => "silver",
            AchievementTier::Gold => "gold",
            AchievementTier::Platinum => "platinum",
        }
    }
}

// ============================================================================
// Hackathon status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HackathonStatus {
    #[default]
    Upcoming,
    Active,
    Judging,
    Completed,
    Cancelled,
}

impl HackathonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HackathonStatus::Upcoming => "upcoming",
            HackathonStatus::Active => "active",
            HackathonStatus::Judging => "judging",
            HackathonStatus::Completed => "completed",
            HackathonStatus::Cancelled => "cancelled",
        }
    }
}
