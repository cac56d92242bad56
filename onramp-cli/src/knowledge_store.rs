//! Vector search over the onboarding knowledge base.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use onramp_core::KnowledgeSnippet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::KnowledgeSection;

/// Metadata filter applied to every search.
pub fn knowledge_filter() -> Value {
    json!({ "type": "knowledge" })
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn similarity_search(&self, query: &str, k: usize, filter: &Value) -> Result<Vec<KnowledgeSnippet>>;
}

/// Store behind a small HTTP service: `POST <base_url>/query` with
/// `{query, k, filter}`, answered by `{results: [{content, metadata}]}`.
pub struct HttpKnowledgeStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    k: usize,
    filter: &'a Value,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<KnowledgeSnippet>,
}

impl HttpKnowledgeStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `None` when no store is configured.
    pub fn from_config(section: &KnowledgeSection) -> Option<Self> {
        section
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl KnowledgeStore for HttpKnowledgeStore {
    async fn similarity_search(&self, query: &str, k: usize, filter: &Value) -> Result<Vec<KnowledgeSnippet>> {
        let url = format!("{}/query", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&QueryRequest { query, k, filter })
            .send()
            .await
            .with_context(|| format!("knowledge query {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("knowledge store error: {status} {txt}");
        }

        let out: QueryResponse = resp.json().await.context("parse knowledge response")?;
        debug!(query, results = out.results.len(), "knowledge search");
        Ok(out.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_only_built_with_base_url() {
        let mut section = KnowledgeSection::default();
        assert!(HttpKnowledgeStore::from_config(&section).is_none());
        section.base_url = Some("  ".to_string());
        assert!(HttpKnowledgeStore::from_config(&section).is_none());
        section.base_url = Some("http://localhost:8000/".to_string());
        let store = HttpKnowledgeStore::from_config(&section).unwrap();
        assert_eq!(store.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_response_parses_metadata() {
        let raw = r#"{"results":[{"content":"Create deal stages","metadata":{"guideTitle":"Sales setup"}}]}"#;
        let out: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(out.results[0].label(), "Sales setup");
    }
}
