//! Knowledge-base query building and guidance formatting.
//!
//! Retrieval itself lives behind the CLI's store client; this module only
//! decides what to ask for and how the results are shown to the model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::history::Answers;
use crate::hubs::{detect_mentioned_hubs, extract_level};
use crate::topics::Pillar;

const FEATURE_KEYWORDS: &[&str] = &[
    "pipeline", "deal", "automation", "workflow", "lead scoring", "lead assignment",
    "forms", "landing page", "email", "nurturing", "sequences", "templates",
    "snippets", "documents", "quotes", "forecast", "reporting", "dashboard",
    "ticket", "knowledge base", "chatbot", "live chat", "inbox", "survey",
    "csat", "nps", "contact", "company", "properties", "lifecycle",
    "tracking code", "ads", "social media", "blog", "seo",
];

const GOAL_KEYWORDS: &[&str] = &[
    "organize", "automate", "reduce manual", "qualification", "follow-up",
    "visibility", "reporting", "roi", "conversion", "onboarding",
];

/// Keywords per query beyond which the rest are dropped.
const MAX_QUERY_KEYWORDS: usize = 6;

/// Results requested per generated query.
pub const RESULTS_PER_QUERY: usize = 3;

/// Results requested for the model's own query.
pub const FALLBACK_RESULTS: usize = 2;

/// The model's own query is only searched when longer than this.
pub const FALLBACK_QUERY_MIN_CHARS: usize = 20;

/// Snippets shown in the guidance block.
pub const MAX_GUIDANCE_SNIPPETS: usize = 8;

/// Characters kept per snippet before truncation.
pub const SNIPPET_CHARS: usize = 350;

/// Prefix length used to treat two snippets as duplicates.
pub const DEDUP_PREFIX_CHARS: usize = 100;

struct HubQuery {
    name: &'static str,
    base: &'static [&'static str],
    filter: &'static [&'static str],
}

const SALES_QUERY: HubQuery = HubQuery {
    name: "Sales",
    base: &["pipeline", "deal stages", "automation"],
    filter: &[
        "pipeline", "deal", "automation", "workflow", "lead assignment", "sequences",
        "templates", "snippets", "documents", "quotes", "forecast", "reporting",
        "follow-up", "qualification",
    ],
};

const MARKETING_QUERY: HubQuery = HubQuery {
    name: "Marketing",
    base: &["lead scoring", "forms", "email workflows"],
    filter: &[
        "lead scoring", "forms", "landing page", "email", "nurturing", "workflow",
        "automation", "tracking code", "ads", "social media", "blog", "lifecycle",
        "conversion", "roi",
    ],
};

const SERVICE_QUERY: HubQuery = HubQuery {
    name: "Service",
    base: &["ticket pipeline", "knowledge base", "surveys"],
    filter: &[
        "ticket", "knowledge base", "chatbot", "live chat", "inbox", "survey",
        "csat", "nps", "onboarding",
    ],
};

fn push_unique<'a>(out: &mut Vec<&'a str>, kw: &'a str) {
    if !out.contains(&kw) {
        out.push(kw);
    }
}

/// Curated feature and goal keywords found in `text`, first-seen order.
pub fn extract_keywords(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    let mut out = Vec::new();
    for kw in FEATURE_KEYWORDS.iter().chain(GOAL_KEYWORDS) {
        if lower.contains(kw) {
            push_unique(&mut out, kw);
        }
    }
    out
}

impl HubQuery {
    fn build(&self, level: &str, keywords: &[&'static str]) -> String {
        let mut combined: Vec<&str> = Vec::new();
        for kw in self.base {
            push_unique(&mut combined, kw);
        }
        for kw in keywords {
            if self.filter.iter().any(|f| kw.contains(f)) {
                push_unique(&mut combined, kw);
            }
        }
        combined.truncate(MAX_QUERY_KEYWORDS);
        format!("{} Hub {} {}", self.name, level, combined.join(" "))
    }
}

/// Search queries derived from the discovery answers: one per mentioned
/// hub plus a general implementation query.
pub fn build_queries(answers: &Answers) -> Vec<String> {
    let get = |p: Pillar| answers.get(p.key()).map(String::as_str).unwrap_or("");

    let hubs = detect_mentioned_hubs(get(Pillar::HubsIncluded));
    let level = extract_level(get(Pillar::SubscriptionLevels));

    let mut keywords = extract_keywords(get(Pillar::OverallGoals));
    for kw in extract_keywords(get(Pillar::HubSpecificDetails)) {
        push_unique(&mut keywords, kw);
    }

    let mut queries = Vec::new();
    for (enabled, hub) in [
        (hubs.sales, &SALES_QUERY),
        (hubs.marketing, &MARKETING_QUERY),
        (hubs.service, &SERVICE_QUERY),
    ] {
        if enabled {
            queries.push(hub.build(level.as_str(), &keywords));
        }
    }
    queries.push(format!("HubSpot implementation plan {level} setup configuration"));
    queries
}

/// One retrieved document chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSnippet {
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl KnowledgeSnippet {
    /// Label shown in brackets: guide title, else section type, else "Guide".
    pub fn label(&self) -> String {
        ["guideTitle", "sectionType"]
            .iter()
            .filter_map(|k| self.metadata.get(*k))
            .find_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Null | Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .unwrap_or_else(|| "Guide".to_string())
    }
}

/// Accumulates snippets across several searches, keeping the first copy
/// of each chunk.
#[derive(Debug, Default)]
pub struct SnippetCollector {
    seen: HashSet<String>,
    snippets: Vec<KnowledgeSnippet>,
}

impl SnippetCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, batch: impl IntoIterator<Item = KnowledgeSnippet>) {
        for snippet in batch {
            let key: String = snippet.content.chars().take(DEDUP_PREFIX_CHARS).collect();
            if self.seen.insert(key) {
                self.snippets.push(snippet);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn into_snippets(self) -> Vec<KnowledgeSnippet> {
        self.snippets
    }
}

/// Drop snippets whose first 100 characters repeat an earlier one.
pub fn dedupe_snippets(snippets: Vec<KnowledgeSnippet>) -> Vec<KnowledgeSnippet> {
    let mut collector = SnippetCollector::new();
    collector.extend(snippets);
    collector.into_snippets()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn snippet_text(content: &str) -> String {
    let raw = content.trim();
    if raw.chars().count() > SNIPPET_CHARS {
        let head: String = raw.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", head.trim())
    } else {
        raw.to_string()
    }
}

/// Guidance block handed back to the model after a successful search.
pub fn format_guidance(snippets: &[KnowledgeSnippet]) -> String {
    let mut lines = vec![
        "[INTERNAL USE ONLY - do not quote or show this output to the user.]".to_string(),
        "Implementation guidance from the knowledge base:".to_string(),
        String::new(),
    ];
    for (i, snippet) in snippets.iter().take(MAX_GUIDANCE_SNIPPETS).enumerate() {
        lines.push(format!(
            "({}) [{}]: {}",
            i + 1,
            snippet.label(),
            collapse_whitespace(&snippet_text(&snippet.content))
        ));
    }
    lines.push(String::new());
    lines.push(
        "Use this guidance to refine the implementation plan. Do not quote or show this to the user."
            .to_string(),
    );
    lines.push("Call generate_plan_draft next with the answersCollected from context.".to_string());
    lines.join("\n")
}

/// Why a search produced no guidance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnowledgeFallback {
    /// No store is configured.
    Unavailable { query: String },
    /// Every query came back empty.
    NoResults { queries: Vec<String> },
    /// The store returned an error.
    SearchFailed { error: String },
}

impl KnowledgeFallback {
    /// Text returned to the model instead of guidance.
    pub fn message(&self) -> String {
        let (summary, detail) = match self {
            KnowledgeFallback::Unavailable { query } => (
                "Knowledge base is currently unavailable. Use discovery data and standard HubSpot best practices.",
                format!("LLM provided query: {}", query.chars().take(200).collect::<String>()),
            ),
            KnowledgeFallback::NoResults { queries } => (
                "No specific knowledge chunks were found. Use discovery data and general HubSpot best practices.",
                format!("Queries attempted: {}", queries.join(" | ")),
            ),
            KnowledgeFallback::SearchFailed { error } => (
                "Knowledge search failed. Fall back to standard implementation templates and discovery data.",
                format!("Error: {error}"),
            ),
        };
        ["[INTERNAL USE ONLY]", summary, "", detail.as_str()].join("\n")
    }
}
