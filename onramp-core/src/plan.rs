//! Structured plan draft produced once discovery is complete.
//!
//! The model writes the human-facing plan itself; this draft carries the
//! structured pieces (objectives, active hubs, tier) used for the plan card
//! and the exported document.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use tracing::info;

use crate::history::Answers;
use crate::hubs::{parse_active_hubs, parse_subscription_level};
use crate::topics::Pillar;

/// Objectives kept in a plan.
pub const MAX_OBJECTIVES: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanModule {
    pub name: String,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImplementationPlan {
    pub company: String,
    pub objectives: Vec<String>,
    pub modules: Vec<PlanModule>,
    pub timeline: String,
    pub recommendations: Vec<String>,
}

/// Contact details collected before the interview starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub company: String,
    pub website: String,
}

/// Result of `draft_plan`: the plan plus the summary returned to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDraft {
    pub plan: ImplementationPlan,
    pub summary: serde_json::Value,
}

fn splitter(with_pipe: bool) -> Option<&'static Regex> {
    static PLAIN: OnceLock<Option<Regex>> = OnceLock::new();
    static PIPED: OnceLock<Option<Regex>> = OnceLock::new();
    if with_pipe {
        PIPED
            .get_or_init(|| Regex::new(r"(?i)\||[,;]|\s+and\s+|\n+").ok())
            .as_ref()
    } else {
        PLAIN
            .get_or_init(|| Regex::new(r"(?i)[,;]|\s+and\s+|\n+").ok())
            .as_ref()
    }
}

fn split_parts(text: &str, with_pipe: bool) -> Vec<String> {
    let parts: Vec<&str> = match splitter(with_pipe) {
        Some(re) => re.split(text).collect(),
        None => vec![text],
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| {
            let n = p.chars().count();
            n > 3 && n < 200
        })
        .map(str::to_string)
        .collect()
}

/// Objectives from the overall goals, then from the hub-specific details.
///
/// Goals split on commas, semicolons, "and" and newlines; details also
/// split on the `|` answer separator. Duplicates are dropped ignoring case.
pub fn extract_objectives(answers: &Answers) -> Vec<String> {
    let get = |p: Pillar| answers.get(p.key()).map(|s| s.trim()).unwrap_or("");

    let mut objectives: Vec<String> = Vec::new();
    let candidates = split_parts(get(Pillar::OverallGoals), false)
        .into_iter()
        .chain(split_parts(get(Pillar::HubSpecificDetails), true));
    for part in candidates {
        let lower = part.to_lowercase();
        if !objectives.iter().any(|o| o.to_lowercase() == lower) {
            objectives.push(part);
        }
    }
    objectives.truncate(MAX_OBJECTIVES);
    objectives
}

/// Build the plan draft and the JSON summary handed back to the model.
pub fn draft_plan(company: &str, answers: &Answers, knowledge_available: bool) -> PlanDraft {
    let hubs_text = answers
        .get(Pillar::HubsIncluded.key())
        .map(String::as_str)
        .unwrap_or("");
    let level_text = answers
        .get(Pillar::SubscriptionLevels.key())
        .map(String::as_str)
        .unwrap_or("");

    let active_hubs = parse_active_hubs(hubs_text);
    let plan = ImplementationPlan {
        company: company.to_string(),
        objectives: extract_objectives(answers),
        ..Default::default()
    };

    info!(
        company = %plan.company,
        objectives = plan.objectives.len(),
        ?active_hubs,
        "plan draft built"
    );

    let rag_context = if knowledge_available {
        "Available - use format from knowledge base"
    } else {
        "Not available - use system prompt format"
    };

    let summary = json!({
        "status": "ready",
        "company": plan.company,
        "activeHubs": active_hubs.names(),
        "subscriptionLevel": parse_subscription_level(level_text).as_str(),
        "objectives": plan.objectives,
        "timeline": plan.timeline,
        "ragContext": rag_context,
        "instruction": "Generate the Implementation Plan now using the PHASE 2 format from your system prompt. Do NOT output this message to the user.",
    });

    PlanDraft { plan, summary }
}
