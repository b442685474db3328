//! Built-in quest templates
//!
//! A fixed catalog quests can be created from. Template text may carry
//! `{placeholder}` tokens that callers fill in at creation time.

use std::collections::HashMap;

use serde::Serialize;

use crate::data::{QuestCategory, QuestRank};

/// A reusable quest blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestTemplate {
    pub template_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub requirements: &'static str,
    pub reward: &'static str,
    pub rank: QuestRank,
    pub category: QuestCategory,
    pub placeholders: &'static [&'static str],
}

/// Template text after placeholder substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedTemplate {
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub reward: String,
    pub rank: QuestRank,
    pub category: QuestCategory,
}

impl QuestTemplate {
    /// Replace every `{key}` token with its value
    ///
    /// Unknown tokens are left as written.
    pub fn apply(&self, values: &HashMap<String, String>) -> AppliedTemplate {
        let fill = |text: &str| {
            values.iter().fold(text.to_string(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
        };

        AppliedTemplate {
            title: fill(self.name),
            description: fill(self.description),
            requirements: fill(self.requirements),
            reward: fill(self.reward),
            rank: self.rank,
            category: self.category,
        }
    }
}

static TEMPLATES: &[QuestTemplate] = &[
    QuestTemplate {
        template_id: "hunting_basic",
        name: "Hunting Adventure",
        description: "Embark on a hunting quest to defeat various creatures and prove your combat prowess.",
        requirements: "Defeat 10 monsters\nLocation: Any hunting ground\nProof: Screenshot of defeated enemies",
        reward: "50 Gold Coins",
        rank: QuestRank::Easy,
        category: QuestCategory::Hunting,
        placeholders: &["target", "amount", "location", "reward_amount", "reward_type"],
    },
    QuestTemplate {
        template_id: "gathering_basic",
        name: "Gathering Materials",
        description: "Collect valuable resources from the world to support your community.",
        requirements: "Gather 20 resources\nLocation: Any resource node\nQuality: Standard or better",
        reward: "25 Gold Coins",
        rank: QuestRank::Normal,
        category: QuestCategory::Gathering,
        placeholders: &["resource", "amount", "location", "quality", "reward_amount", "reward_type"],
    },
    QuestTemplate {
        template_id: "combat_basic",
        name: "Combat Challenge",
        description: "Test your fighting skills in intense combat scenarios.",
        requirements: "Win 5 combat encounters\nLocation: Arena or combat zone\nProof: Victory screenshots",
        reward: "100 Gold Coins",
        rank: QuestRank::Medium,
        category: QuestCategory::Combat,
        placeholders: &["encounters", "location", "reward_amount"],
    },
    QuestTemplate {
        template_id: "social_basic",
        name: "Social Event",
        description: "Participate in community activities and build relationships with fellow adventurers.",
        requirements: "Participate in 3 social events\nDuration: This week\nProof: Event participation screenshots",
        reward: "Social Recognition Badge",
        rank: QuestRank::Easy,
        category: QuestCategory::Social,
        placeholders: &["events", "duration", "reward"],
    },
    QuestTemplate {
        template_id: "exploration_basic",
        name: "Exploration Mission",
        description: "Venture into uncharted territories and discover new locations.",
        requirements: "Explore 5 new locations\nDocument findings\nProof: Screenshots with coordinates",
        reward: "Explorer's Map",
        rank: QuestRank::Normal,
        category: QuestCategory::Exploration,
        placeholders: &["locations", "findings", "reward"],
    },
    QuestTemplate {
        template_id: "building_basic",
        name: "Building Project",
        description: "Construct structures that will benefit the community.",
        requirements: "Build 1 community structure\nMaterials: Player provided\nProof: Before and after screenshots",
        reward: "Builder's Tools",
        rank: QuestRank::Medium,
        category: QuestCategory::Building,
        placeholders: &["structure", "materials", "reward"],
    },
    QuestTemplate {
        template_id: "trading_basic",
        name: "Trading Quest",
        description: "Engage in commerce and establish profitable trade relationships.",
        requirements: "Complete 10 trade transactions\nProfit margin: Positive\nProof: Transaction logs",
        reward: "Merchant's License",
        rank: QuestRank::Normal,
        category: QuestCategory::Trading,
        placeholders: &["transactions", "profit", "reward"],
    },
    QuestTemplate {
        template_id: "puzzle_basic",
        name: "Puzzle Challenge",
        description: "Solve complex puzzles that test your intellect and problem-solving skills.",
        requirements: "Solve 3 logic puzzles\nTime limit: 2 hours\nProof: Solution screenshots",
        reward: "Wisdom Scroll",
        rank: QuestRank::Hard,
        category: QuestCategory::Puzzle,
        placeholders: &["puzzles", "time_limit", "reward"],
    },
];

pub fn all_templates() -> &'static [QuestTemplate] {
    TEMPLATES
}

pub fn get_template(template_id: &str) -> Option<&'static QuestTemplate> {
    TEMPLATES
        .iter()
        .find(|template| template.template_id == template_id)
}

pub fn templates_by_category(category: QuestCategory) -> Vec<&'static QuestTemplate> {
    TEMPLATES
        .iter()
        .filter(|template| template.category == category)
        .collect()
}

/// Look up a template and fill in its placeholders
///
/// # Returns
/// `None` if the template does not exist
pub fn apply_template(
    template_id: &str,
    values: &HashMap<String, String>,
) -> Option<AppliedTemplate> {
    get_template(template_id).map(|template| template.apply(values))
}
