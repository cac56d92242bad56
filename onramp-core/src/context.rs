//! Per-turn discovery state handed to the agent tools.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::{self, Answers, Message, ANSWER_SEPARATOR};
use crate::topics::Pillar;

/// Discovery state as sent by a client alongside the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientContext {
    pub answers_collected: Answers,
    pub questions_asked: Vec<String>,
    pub plan_ready: bool,
}

/// State shared by every tool call within one chat turn.
///
/// Built once from the transcript and passed by reference; tools never
/// reach for ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub answers: Answers,
    pub questions_asked: Vec<String>,
    pub plan_ready: bool,
}

impl RequestContext {
    pub fn from_transcript(messages: &[Message], client: Option<&ClientContext>) -> Self {
        let cleaned = history::clean_transcript(messages);
        let derived = history::derive(&cleaned);
        let merged = history::merge_answers(
            &derived.answers_collected,
            client.map(|c| &c.answers_collected),
        );

        let questions_asked = if derived.questions_asked.is_empty() {
            client.map(|c| c.questions_asked.clone()).unwrap_or_default()
        } else {
            derived.questions_asked
        };
        let plan_ready = client.is_some_and(|c| c.plan_ready) || merged.len() >= 5;

        for (key, value) in &merged {
            let preview: String = value.chars().take(80).collect();
            debug!(%key, %preview, "answer collected");
        }
        debug!(
            messages = cleaned.len(),
            questions = questions_asked.len(),
            plan_ready,
            "request context built"
        );

        Self {
            answers: normalize_answers_to_pillars(&merged),
            questions_asked,
            plan_ready,
        }
    }
}

/// Fold loosely-keyed answers onto the five pillar keys.
///
/// Accepts `plan_levels` for subscription levels and merges the per-hub
/// topic keys (`hub_specific_goals`, `sales_process`, ...) into
/// `hub_specific_details`. Pillars without content are omitted.
pub fn normalize_answers_to_pillars(raw: &Answers) -> Answers {
    let get = |key: &str| {
        raw.get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let mut out = Answers::new();
    let mut put = |pillar: Pillar, value: Option<String>| {
        if let Some(v) = value {
            out.insert(pillar.key().to_string(), v);
        }
    };

    put(Pillar::CompanyInfo, get("company_info").map(str::to_string));
    put(Pillar::HubsIncluded, get("hubs_included").map(str::to_string));
    put(
        Pillar::SubscriptionLevels,
        get("subscription_levels")
            .or_else(|| get("plan_levels"))
            .map(str::to_string),
    );
    put(Pillar::OverallGoals, get("overall_goals").map(str::to_string));

    let hub_parts: Vec<&str> = [
        "hub_specific_details",
        "hub_specific_goals",
        "sales_process",
        "service_process",
        "marketing_process",
    ]
    .into_iter()
    .filter_map(get)
    .collect();
    put(
        Pillar::HubSpecificDetails,
        (!hub_parts.is_empty()).then(|| hub_parts.join(ANSWER_SEPARATOR)),
    );

    out
}

/// System message describing what is already known, or `None` when
/// nothing has been collected yet.
pub fn discovery_state_block(answers: &Answers) -> Option<String> {
    let normalized = normalize_answers_to_pillars(answers);
    if normalized.is_empty() {
        return None;
    }

    let bullets: Vec<String> = Pillar::ALL
        .iter()
        .filter_map(|p| normalized.get(p.key()).map(|v| format!("- {}: {}", p.key(), v)))
        .collect();
    let json = serde_json::to_string(&normalized).unwrap_or_else(|_| "{}".to_string());

    Some(format!(
        "CURRENT DISCOVERY STATE:\n{}\n\nWhen you call detect_plan_ready, search_company_knowledge, or generate_plan_draft, you MUST pass answersCollected. Use this exact object (copy it):\n```json\n{}\n```",
        bullets.join("\n"),
        json
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> Answers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_folds_topic_keys() {
        let raw = answers(&[
            ("plan_levels", "Starter"),
            ("sales_process", "Inbound leads"),
            ("hub_specific_goals", "Sequences"),
            ("company_info", "  "),
        ]);
        let n = normalize_answers_to_pillars(&raw);
        assert_eq!(n["subscription_levels"], "Starter");
        assert_eq!(n["hub_specific_details"], "Sequences | Inbound leads");
        assert!(!n.contains_key("company_info"));
        assert_eq!(n.len(), 2);
    }

    #[test]
    fn test_from_transcript_prefers_derived() {
        let transcript = vec![
            Message::assistant("Which main HubSpot Hubs are you planning to implement?"),
            Message::user("Sales"),
        ];
        let client = ClientContext {
            answers_collected: answers(&[("hubs_included", "Marketing"), ("overall_goals", "Reporting")]),
            questions_asked: vec!["old question".into()],
            plan_ready: false,
        };
        let ctx = RequestContext::from_transcript(&transcript, Some(&client));
        assert_eq!(ctx.answers["hubs_included"], "Sales");
        assert_eq!(ctx.answers["overall_goals"], "Reporting");
        assert_eq!(ctx.questions_asked.len(), 1);
        assert!(!ctx.plan_ready);
    }

    #[test]
    fn test_from_transcript_falls_back_to_client_questions() {
        let client = ClientContext {
            questions_asked: vec!["q1".into(), "q2".into()],
            plan_ready: true,
            ..Default::default()
        };
        let ctx = RequestContext::from_transcript(&[], Some(&client));
        assert_eq!(ctx.questions_asked, vec!["q1".to_string(), "q2".to_string()]);
        assert!(ctx.plan_ready);
    }

    #[test]
    fn test_client_context_deserializes_partial() {
        let c: ClientContext = serde_json::from_str(r#"{"answersCollected":{"company_info":"Acme"}}"#).unwrap();
        assert_eq!(c.answers_collected["company_info"], "Acme");
        assert!(c.questions_asked.is_empty());
        assert!(!c.plan_ready);
    }

    #[test]
    fn test_discovery_state_block() {
        assert!(discovery_state_block(&Answers::new()).is_none());

        let block = discovery_state_block(&answers(&[("hubs_included", "Sales")])).unwrap();
        assert!(block.starts_with("CURRENT DISCOVERY STATE:\n- hubs_included: Sales"));
        assert!(block.contains(r#"{"hubs_included":"Sales"}"#));
        assert!(block.ends_with("```"));
    }
}
