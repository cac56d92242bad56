//! OpenAI-compatible chat completions with function calling.

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth;
use crate::config::LlmSection;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub api_key: String,
}

impl LlmConfig {
    pub fn from_section(section: &LlmSection) -> Result<Self> {
        if section.provider != "openai" {
            bail!(
                "unsupported llm provider {:?}; only OpenAI-compatible endpoints (provider = \"openai\") are supported",
                section.provider
            );
        }
        Ok(Self {
            model: section.model.clone(),
            base_url: section.base_url.trim_end_matches('/').to_string(),
            temperature: section.temperature,
            api_key: auth::resolve_openai_key()?,
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", self.api_key))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as sent by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl WireMessage {
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn tool_result(call_id: &str, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.to_string()),
        }
    }
}

impl From<AssistantReply> for WireMessage {
    fn from(reply: AssistantReply) -> Self {
        Self {
            role: "assistant".to_string(),
            content: reply.content,
            tool_calls: reply.tool_calls,
            tool_call_id: None,
        }
    }
}

/// What the model returned for one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [WireMessage],
    #[serde(skip_serializing_if = "no_tools")]
    pub tools: &'a [Value],
    pub temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

fn no_tools(tools: &&[Value]) -> bool {
    tools.is_empty()
}

pub async fn complete(cfg: &LlmConfig, messages: &[WireMessage], tools: &[Value]) -> Result<AssistantReply> {
    #[derive(Deserialize)]
    struct Resp {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: WireMessage,
    }

    let body = ChatRequest {
        model: &cfg.model,
        messages,
        tools,
        temperature: cfg.temperature,
        stream: false,
    };

    let client = reqwest::Client::new();
    let resp = client
        .post(cfg.completions_url())
        .headers(cfg.headers()?)
        .json(&body)
        .send()
        .await
        .context("chat completion request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("chat completion error: {status} {txt}");
    }

    let out: Resp = resp.json().await.context("parse chat completion response")?;
    let message = out
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .context("chat completion returned no choices")?;

    Ok(AssistantReply {
        content: message.content.filter(|c| !c.trim().is_empty()),
        tool_calls: message.tool_calls,
    })
}
