//! Derive collected answers and the question log from a chat transcript.
//!
//! The transcript is the only source of truth: clients may send their own
//! view of the discovery state, but derived values win whenever they carry
//! content.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::topics::{classify, Pillar};

/// Pillar key → accumulated answer text.
pub type Answers = BTreeMap<String, String>;

/// Separator used when a pillar collects more than one answer.
pub const ANSWER_SEPARATOR: &str = " | ";

/// Questions longer than this are truncated in the question log.
pub const QUESTION_MAX_CHARS: usize = 120;

/// Prefix length used to treat two logged questions as the same question.
pub const QUESTION_DEDUP_PREFIX: usize = 50;

const CONFIRMATION_TOKENS: &[&str] = &[
    "yes", "no", "ok", "okay", "sure", "correct", "yep", "nope", "si", "sí",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Result of walking a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedContext {
    pub answers_collected: Answers,
    pub questions_asked: Vec<String>,
}

/// True for bare confirmations like "yes" or "ok".
pub fn is_short_confirmation(answer: &str) -> bool {
    let a = answer.trim();
    if a.chars().count() >= 10 {
        return false;
    }
    let lower = a.to_lowercase();
    CONFIRMATION_TOKENS.contains(&lower.as_str())
}

/// Shorten a question for the question log.
pub fn shorten_question(question: &str) -> String {
    if question.chars().count() <= QUESTION_MAX_CHARS {
        return question.to_string();
    }
    let head: String = question.chars().take(QUESTION_MAX_CHARS).collect();
    format!("{}…", head.trim())
}

fn already_asked(asked: &[String], shortened: &str) -> bool {
    let prefix: String = shortened.chars().take(QUESTION_DEDUP_PREFIX).collect();
    asked
        .iter()
        .any(|q| q == shortened || q.starts_with(&prefix))
}

/// Walk adjacent (assistant, user) pairs and accumulate answers per pillar.
///
/// Pairing is strictly adjacent. A user message that follows another user
/// message has no question and is skipped; a run of assistant messages
/// pairs only its last message with the next user reply. System and tool
/// messages break a pair.
pub fn derive(transcript: &[Message]) -> DerivedContext {
    let mut raw: BTreeMap<Pillar, Vec<String>> = BTreeMap::new();
    let mut questions_asked: Vec<String> = Vec::new();

    for pair in transcript.windows(2) {
        let (msg, next) = (&pair[0], &pair[1]);
        if msg.role != Role::Assistant || next.role != Role::User {
            continue;
        }

        let question = msg.content.trim();
        let answer = next.content.trim();
        if question.is_empty() || answer.is_empty() {
            continue;
        }

        if let Some(topic) = classify(question) {
            let pillar = topic.pillar();
            let confirmation = is_short_confirmation(answer);

            if pillar == Pillar::CompanyInfo && confirmation {
                // A bare "yes" to "is this correct?" must not replace the description.
                debug!(topic = %topic, "skipping short confirmation for company_info");
            } else {
                let answers = raw.entry(pillar).or_default();
                if !answers.iter().any(|a| a == answer) {
                    answers.push(answer.to_string());
                }
            }
        }

        let shortened = shorten_question(question);
        if !already_asked(&questions_asked, &shortened) {
            questions_asked.push(shortened);
        }
    }

    let answers_collected = raw
        .into_iter()
        .filter(|(_, answers)| !answers.is_empty())
        .map(|(pillar, answers)| (pillar.key().to_string(), answers.join(ANSWER_SEPARATOR)))
        .collect();

    DerivedContext {
        answers_collected,
        questions_asked,
    }
}

/// Merge transcript-derived answers over answers the client sent.
/// Derived values take precedence when they are non-empty.
pub fn merge_answers(derived: &Answers, client: Option<&Answers>) -> Answers {
    let mut merged = client.cloned().unwrap_or_default();
    for (key, value) in derived {
        if !value.trim().is_empty() {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Drop repeated messages before derivation.
///
/// Removes any message whose (role, trimmed content) was already seen, and
/// any assistant message identical to the assistant message right before it.
pub fn clean_transcript(messages: &[Message]) -> Vec<Message> {
    let mut seen: HashSet<(Role, String)> = HashSet::new();
    let mut unique: Vec<&Message> = Vec::new();
    for m in messages {
        let key = (m.role, m.content.trim().to_string());
        if !seen.insert(key) {
            let preview: String = m.content.chars().take(50).collect();
            warn!(role = ?m.role, %preview, "dropping duplicate message");
            continue;
        }
        unique.push(m);
    }

    let mut cleaned: Vec<Message> = Vec::with_capacity(unique.len());
    for m in unique {
        if let Some(prev) = cleaned.last() {
            if m.role == Role::Assistant
                && prev.role == Role::Assistant
                && m.content.trim() == prev.content.trim()
            {
                warn!("dropping consecutive duplicate assistant message");
                continue;
            }
        }
        cleaned.push(m.clone());
    }
    cleaned
}
