//! The three agent tools, dispatched against an explicit request context.

use onramp_core::knowledge::{FALLBACK_QUERY_MIN_CHARS, FALLBACK_RESULTS};
use onramp_core::{
    build_queries, detect, draft_plan, format_guidance, normalize_answers_to_pillars, Answers,
    ImplementationPlan, KnowledgeFallback, RequestContext, SnippetCollector,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::knowledge_store::{knowledge_filter, KnowledgeStore};

pub const DETECT_PLAN_READY: &str = "detect_plan_ready";
pub const SEARCH_COMPANY_KNOWLEDGE: &str = "search_company_knowledge";
pub const GENERATE_PLAN_DRAFT: &str = "generate_plan_draft";

fn answers_schema() -> Value {
    json!({
        "type": "object",
        "description": "Discovery data keyed by company_info, hubs_included, subscription_levels, overall_goals, hub_specific_details.",
        "additionalProperties": true
    })
}

/// Function declarations sent with every completion request.
pub fn tool_specs() -> Vec<Value> {
    let function = |name: &str, description: &str, parameters: Value| {
        json!({
            "type": "function",
            "function": { "name": name, "description": description, "parameters": parameters }
        })
    };
    vec![
        function(
            DETECT_PLAN_READY,
            "Analyzes if the discovery phase is complete. Checks for company_info, hubs_included, subscription_levels, overall_goals and hub_specific_details, and verifies that the hub-specific questions (6A/6B/6C) were asked for every selected Hub.",
            json!({
                "type": "object",
                "properties": {
                    "questionsAsked": { "type": "array", "items": { "type": "string" } },
                    "answersCollected": answers_schema(),
                    "planReady": { "type": "boolean" }
                }
            }),
        ),
        function(
            SEARCH_COMPANY_KNOWLEDGE,
            "Searches the onboarding knowledge base for implementation guidance. Queries are built automatically from the Hubs, subscription level and goals in the discovery context. Call this after detect_plan_ready and before generate_plan_draft.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "minLength": 5, "description": "Short description of the client profile." }
                },
                "required": ["query"]
            }),
        ),
        function(
            GENERATE_PLAN_DRAFT,
            "Prepares context for generating the Implementation Plan and returns a discovery summary. After calling this tool, YOU must write the full Implementation Plan in your response.",
            json!({
                "type": "object",
                "properties": {
                    "companyName": { "type": "string" },
                    "website": { "type": "string" },
                    "email": { "type": "string" },
                    "knowledgeContext": { "type": "string", "description": "Insights retrieved from search_company_knowledge" },
                    "answersCollected": answers_schema()
                },
                "required": ["companyName", "website", "email", "knowledgeContext"]
            }),
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanDraftArgs {
    company_name: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    knowledge_context: String,
    #[serde(default)]
    answers_collected: Option<BTreeMap<String, Value>>,
}

/// Result of one tool call: the text handed back to the model and, for
/// plan drafts, the structured plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutcome {
    pub output: String,
    pub plan: Option<ImplementationPlan>,
}

impl ToolOutcome {
    fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            plan: None,
        }
    }
}

pub struct ToolBox<'a> {
    ctx: &'a RequestContext,
    store: Option<&'a dyn KnowledgeStore>,
    results_per_query: usize,
}

impl<'a> ToolBox<'a> {
    pub fn new(ctx: &'a RequestContext, store: Option<&'a dyn KnowledgeStore>, results_per_query: usize) -> Self {
        Self {
            ctx,
            store,
            results_per_query,
        }
    }

    pub async fn dispatch(&self, name: &str, arguments: &str) -> ToolOutcome {
        let args = if arguments.trim().is_empty() { "{}" } else { arguments };
        let result = match name {
            DETECT_PLAN_READY => Ok(self.detect_plan_ready()),
            SEARCH_COMPANY_KNOWLEDGE => match serde_json::from_str::<SearchArgs>(args) {
                Ok(a) => Ok(ToolOutcome::text(self.search_company_knowledge(&a.query).await)),
                Err(e) => Err(e.to_string()),
            },
            GENERATE_PLAN_DRAFT => serde_json::from_str::<PlanDraftArgs>(args)
                .map(|a| self.generate_plan_draft(a))
                .map_err(|e| e.to_string()),
            other => Err(format!("unknown tool {other}")),
        };
        result.unwrap_or_else(|e| {
            warn!(tool = name, error = %e, "tool call failed");
            ToolOutcome::text(format!("Error invoking tool {name} with error: Error: {e}"))
        })
    }

    /// Readiness always comes from the transcript, never from arguments
    /// the model supplies.
    fn detect_plan_ready(&self) -> ToolOutcome {
        let result = detect(&self.ctx.answers, &self.ctx.questions_asked);
        ToolOutcome::text(serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string()))
    }

    async fn search_company_knowledge(&self, query: &str) -> String {
        let Some(store) = self.store else {
            return KnowledgeFallback::Unavailable {
                query: query.to_string(),
            }
            .message();
        };

        let queries = build_queries(&self.ctx.answers);
        info!(?queries, "knowledge queries");
        let filter = knowledge_filter();
        let mut collector = SnippetCollector::new();

        for q in &queries {
            match store.similarity_search(q, self.results_per_query, &filter).await {
                Ok(batch) => collector.extend(batch),
                Err(e) => {
                    warn!(query = %q, error = %e, "knowledge search failed");
                    return KnowledgeFallback::SearchFailed { error: e.to_string() }.message();
                }
            }
        }

        if query.chars().count() > FALLBACK_QUERY_MIN_CHARS {
            match store.similarity_search(query, FALLBACK_RESULTS, &filter).await {
                Ok(batch) => collector.extend(batch),
                Err(e) => {
                    warn!(query, error = %e, "knowledge search failed");
                    return KnowledgeFallback::SearchFailed { error: e.to_string() }.message();
                }
            }
        }

        info!(snippets = collector.len(), "knowledge retrieved");
        if collector.is_empty() {
            return KnowledgeFallback::NoResults { queries }.message();
        }
        format_guidance(&collector.into_snippets())
    }

    fn generate_plan_draft(&self, args: PlanDraftArgs) -> ToolOutcome {
        let supplied: Answers = args
            .answers_collected
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s,
                    Value::Null => return None,
                    other => other.to_string(),
                };
                (!text.trim().is_empty()).then_some((k, text))
            })
            .collect();
        let answers = if supplied.is_empty() {
            self.ctx.answers.clone()
        } else {
            normalize_answers_to_pillars(&supplied)
        };

        info!(
            company = %args.company_name,
            website = %args.website,
            email = %args.email,
            "drafting plan"
        );
        let draft = draft_plan(&args.company_name, &answers, !args.knowledge_context.trim().is_empty());
        ToolOutcome {
            output: draft.summary.to_string(),
            plan: Some(draft.plan),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use onramp_core::KnowledgeSnippet;
    use std::sync::Mutex;

    struct FakeStore {
        snippets: Vec<KnowledgeSnippet>,
        fail: bool,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl FakeStore {
        fn with(contents: &[&str]) -> Self {
            Self {
                snippets: contents
                    .iter()
                    .map(|c| KnowledgeSnippet {
                        content: c.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl KnowledgeStore for FakeStore {
        async fn similarity_search(&self, query: &str, k: usize, _filter: &Value) -> Result<Vec<KnowledgeSnippet>> {
            self.calls.lock().unwrap().push((query.to_string(), k));
            if self.fail {
                bail!("index offline");
            }
            Ok(self.snippets.iter().take(k).cloned().collect())
        }
    }

    fn sales_context() -> RequestContext {
        let answers: Answers = [
            ("company_info", "Acme sensors"),
            ("hubs_included", "Sales"),
            ("subscription_levels", "Sales Enterprise"),
            ("overall_goals", "organize pipeline, improve reporting"),
            ("hub_specific_details", "sequences and quotes"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        RequestContext {
            answers,
            questions_asked: Vec::new(),
            plan_ready: true,
        }
    }

    #[tokio::test]
    async fn test_search_without_store_falls_back() {
        let ctx = sales_context();
        let tools = ToolBox::new(&ctx, None, 3);
        let out = tools
            .dispatch(SEARCH_COMPANY_KNOWLEDGE, r#"{"query":"Acme sales implementation"}"#)
            .await;
        assert!(out.output.contains("Knowledge base is currently unavailable"));
        assert!(out.output.contains("LLM provided query: Acme sales implementation"));
    }

    #[tokio::test]
    async fn test_search_dedupes_and_formats() {
        let ctx = sales_context();
        let store = FakeStore::with(&["Create deal stages for each step", "Use sequences for follow-up"]);
        let tools = ToolBox::new(&ctx, Some(&store), 3);
        let out = tools
            .dispatch(SEARCH_COMPANY_KNOWLEDGE, r#"{"query":"Acme industrial sensors sales rollout"}"#)
            .await;

        assert!(out.output.starts_with("[INTERNAL USE ONLY"));
        assert_eq!(out.output.matches("Create deal stages").count(), 1);
        let calls = store.calls.lock().unwrap();
        // Sales hub query, general query, then the model's own query.
        assert_eq!(calls.len(), 3);
        assert!(calls[0].0.starts_with("Sales Hub Enterprise pipeline deal stages automation"));
        assert_eq!(calls[2], ("Acme industrial sensors sales rollout".to_string(), 2));
    }

    #[tokio::test]
    async fn test_short_query_skips_fallback_search() {
        let ctx = sales_context();
        let store = FakeStore::with(&[]);
        let tools = ToolBox::new(&ctx, Some(&store), 3);
        let out = tools.dispatch(SEARCH_COMPANY_KNOWLEDGE, r#"{"query":"Acme sales"}"#).await;
        assert_eq!(store.calls.lock().unwrap().len(), 2);
        assert!(out.output.contains("No specific knowledge chunks were found"));
    }

    #[tokio::test]
    async fn test_search_error_is_reported_as_text() {
        let ctx = sales_context();
        let mut store = FakeStore::with(&["x"]);
        store.fail = true;
        let tools = ToolBox::new(&ctx, Some(&store), 3);
        let out = tools.dispatch(SEARCH_COMPANY_KNOWLEDGE, r#"{"query":"Acme sales"}"#).await;
        assert!(out.output.contains("Knowledge search failed"));
        assert!(out.output.contains("index offline"));
    }

    #[tokio::test]
    async fn test_detect_ignores_model_supplied_questions() {
        let ctx = sales_context();
        let tools = ToolBox::new(&ctx, None, 3);
        let out = tools
            .dispatch(
                DETECT_PLAN_READY,
                r#"{"questionsAsked":["a","b","c","d","Who do you sell to?"]}"#,
            )
            .await;
        let v: Value = serde_json::from_str(&out.output).unwrap();
        assert_eq!(v["ready"], false);
        assert_eq!(v["metrics"]["totalQuestions"], 0);
    }

    #[tokio::test]
    async fn test_plan_draft_uses_context_when_model_sends_nothing() {
        let ctx = sales_context();
        let tools = ToolBox::new(&ctx, None, 3);
        let out = tools
            .dispatch(
                GENERATE_PLAN_DRAFT,
                r#"{"companyName":"Acme","website":"acme.io","email":"a@acme.io","knowledgeContext":"","answersCollected":{}}"#,
            )
            .await;
        let plan = out.plan.unwrap();
        assert_eq!(plan.company, "Acme");
        assert!(plan.objectives.contains(&"organize pipeline".to_string()));
        let v: Value = serde_json::from_str(&out.output).unwrap();
        assert_eq!(v["activeHubs"], json!(["Sales Hub"]));
        assert_eq!(v["subscriptionLevel"], "Enterprise");
    }

    #[tokio::test]
    async fn test_bad_arguments_become_tool_error_text() {
        let ctx = sales_context();
        let tools = ToolBox::new(&ctx, None, 3);
        let out = tools.dispatch(GENERATE_PLAN_DRAFT, "{").await;
        assert!(out.output.starts_with("Error invoking tool generate_plan_draft"));
        assert!(out.plan.is_none());
        let out = tools.dispatch("lookup_weather", "{}").await;
        assert!(out.output.contains("unknown tool"));
    }
}
