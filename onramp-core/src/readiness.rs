//! Readiness gate: is there enough discovery to generate a plan?
//!
//! This is a best-effort sufficiency signal, not a proof the interview is
//! complete. It never fails; "not ready" always comes with a `missing` list.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::history::Answers;
use crate::hubs::{parse_active_hubs, ActiveHubs};
use crate::topics::Pillar;

/// Minimum number of logged questions before a plan can be generated.
pub const MIN_QUESTIONS: usize = 4;

/// Minimum number of distinct answer keys before a plan can be generated.
pub const MIN_DATA_POINTS: usize = 5;

/// Confidence ceiling while any active hub's discovery is incomplete.
pub const INCOMPLETE_HUB_CONFIDENCE_CAP: u8 = 70;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessMetrics {
    pub total_questions: usize,
    pub total_data_points: usize,
    pub hub_questions_complete: bool,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResult {
    pub ready: bool,
    pub missing: Vec<String>,
    /// 0-100
    pub confidence: u8,
    pub active_hubs: ActiveHubs,
    pub metrics: ReadinessMetrics,
}

/// Per-hub discovery check: question patterns plus how many must match.
struct HubCheck {
    step: &'static str,
    label: &'static str,
    threshold: usize,
    patterns: Vec<Regex>,
}

impl HubCheck {
    fn new(step: &'static str, label: &'static str, threshold: usize, patterns: &[&str]) -> Self {
        Self {
            step,
            label,
            threshold,
            patterns: patterns.iter().filter_map(|p| Regex::new(p).ok()).collect(),
        }
    }

    fn matched(&self, questions_text: &str) -> usize {
        self.patterns
            .iter()
            .filter(|p| p.is_match(questions_text))
            .count()
    }

    fn incomplete_message(&self, found: usize) -> String {
        format!(
            "STEP {} ({}) incomplete: {}/{} patterns matched",
            self.step, self.label, found, self.threshold
        )
    }
}

struct HubChecks {
    sales: HubCheck,
    service: HubCheck,
    marketing: HubCheck,
}

fn hub_checks() -> &'static HubChecks {
    static CHECKS: OnceLock<HubChecks> = OnceLock::new();
    CHECKS.get_or_init(|| HubChecks {
        sales: HubCheck::new(
            "6A",
            "Sales",
            3,
            &[
                r"let.?s talk sales|who do you sell|sell to\?",
                r"more than one sales|sales team|sales process",
                r"deal.*created|when is a deal|deal is created",
                r"repetitive tasks|automate|pieces of info",
            ],
        ),
        service: HubCheck::new(
            "6B",
            "Service",
            3,
            &[
                r"let.?s talk service|service processes",
                r"ticket.*created|when should a ticket",
                r"steps.*ticket|ticket.*through",
                r"knowledge base|surveys",
            ],
        ),
        marketing: HubCheck::new(
            "6C",
            "Marketing",
            4,
            &[
                r"talk about your audience|kinds of people|what kinds",
                r"good lead|makes someone.*lead|lead for your business",
                r"people finding you|finding you right now|how are people",
                r"stay in touch|promote your business|currently stay",
                r"marketing campaigns|campaigns outside|set up any",
                r"content hub",
            ],
        ),
    })
}

/// Outcome of the hub-specific question check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubQuestionCheck {
    pub complete: bool,
    pub missing: Vec<String>,
}

/// Check that each active hub's discovery block has been covered.
pub fn check_hub_questions(questions_asked: &[String], active: ActiveHubs) -> HubQuestionCheck {
    let text = questions_asked.join(" ").to_lowercase();
    let checks = hub_checks();
    let mut missing = Vec::new();

    let selected = [
        (active.sales, &checks.sales),
        (active.service, &checks.service),
        (active.marketing, &checks.marketing),
    ];
    for (enabled, check) in selected {
        if !enabled {
            continue;
        }
        let found = check.matched(&text);
        debug!(hub = check.label, found, threshold = check.threshold, "hub question patterns");
        if found < check.threshold {
            missing.push(check.incomplete_message(found));
        }
    }

    HubQuestionCheck {
        complete: missing.is_empty(),
        missing,
    }
}

/// Pillars with no matching key in the collected answers.
pub fn missing_pillars(answers: &Answers) -> Vec<Pillar> {
    let keys: Vec<String> = answers.keys().map(|k| k.to_lowercase()).collect();
    Pillar::ALL
        .into_iter()
        .filter(|pillar| !keys.iter().any(|k| k.contains(pillar.key())))
        .collect()
}

/// Decide whether discovery is complete enough to generate a plan.
pub fn detect(answers: &Answers, questions_asked: &[String]) -> ReadinessResult {
    let missing = missing_pillars(answers);

    let hubs_text = answers
        .get(Pillar::HubsIncluded.key())
        .map(String::as_str)
        .unwrap_or("");
    let active_hubs = parse_active_hubs(hubs_text);
    let hub_check = check_hub_questions(questions_asked, active_hubs);

    let total = Pillar::ALL.len();
    let present = total - missing.len();
    let base_confidence = ((present as f64 / total as f64) * 100.0).round() as u8;
    let confidence = if hub_check.complete {
        base_confidence
    } else {
        base_confidence.min(INCOMPLETE_HUB_CONFIDENCE_CAP)
    };

    let ready = missing.is_empty()
        && questions_asked.len() >= MIN_QUESTIONS
        && answers.len() >= MIN_DATA_POINTS
        && hub_check.complete;

    let status = if ready {
        "Ready for RAG and Generation"
    } else {
        "More discovery needed"
    };

    info!(
        ready,
        confidence,
        questions = questions_asked.len(),
        data_points = answers.len(),
        ?active_hubs,
        "readiness evaluated"
    );

    let mut all_missing: Vec<String> = missing.iter().map(|p| p.key().to_string()).collect();
    all_missing.extend(hub_check.missing);
    if questions_asked.len() < MIN_QUESTIONS {
        all_missing.push(format!(
            "questions asked: {}/{MIN_QUESTIONS}",
            questions_asked.len()
        ));
    }
    if answers.len() < MIN_DATA_POINTS {
        all_missing.push(format!("data points: {}/{MIN_DATA_POINTS}", answers.len()));
    }

    ReadinessResult {
        ready,
        missing: all_missing,
        confidence,
        active_hubs,
        metrics: ReadinessMetrics {
            total_questions: questions_asked.len(),
            total_data_points: answers.len(),
            hub_questions_complete: hub_check.complete,
            status: status.to_string(),
        },
    }
}
