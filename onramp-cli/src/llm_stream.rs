use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use crate::llm::{AssistantReply, ChatRequest, FunctionCall, LlmConfig, ToolCall, WireMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Started,
    Delta(String),
    Completed,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Builds one assistant reply out of SSE `data:` lines. Tool call
/// fragments are stitched together by their `index`.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    content: String,
    calls: Vec<ToolCall>,
    done: bool,
}

impl ReplyAccumulator {
    /// Feed one line of the event stream. Returns the text delta it
    /// carried, if any.
    pub fn push_line(&mut self, line: &str) -> Result<Option<String>> {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: Chunk = serde_json::from_str(data).context("parse SSE json")?;
        let Some(delta) = chunk.choices.into_iter().next().and_then(|c| c.delta) else {
            return Ok(None);
        };

        for tc in delta.tool_calls.unwrap_or_default() {
            let index = tc.index.unwrap_or(self.calls.len().saturating_sub(1));
            while self.calls.len() <= index {
                self.calls.push(ToolCall {
                    id: String::new(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: String::new(),
                        arguments: String::new(),
                    },
                });
            }
            let call = &mut self.calls[index];
            if let Some(id) = tc.id.filter(|id| !id.is_empty()) {
                call.id = id;
            }
            if let Some(f) = tc.function {
                if let Some(name) = f.name.filter(|n| !n.is_empty()) {
                    call.function.name = name;
                }
                if let Some(args) = f.arguments {
                    call.function.arguments.push_str(&args);
                }
            }
        }

        match delta.content {
            Some(text) if !text.is_empty() => {
                self.content.push_str(&text);
                Ok(Some(text))
            }
            _ => Ok(None),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn finish(self) -> AssistantReply {
        AssistantReply {
            content: (!self.content.trim().is_empty()).then_some(self.content),
            tool_calls: self
                .calls
                .into_iter()
                .filter(|c| !c.function.name.is_empty())
                .collect(),
        }
    }
}

pub async fn stream_chat(
    cfg: &LlmConfig,
    messages: &[WireMessage],
    tools: &[Value],
    mut on_event: impl FnMut(StreamEvent) + Send,
) -> Result<AssistantReply> {
    on_event(StreamEvent::Started);

    let body = ChatRequest {
        model: &cfg.model,
        messages,
        tools,
        temperature: cfg.temperature,
        stream: true,
    };

    let client = reqwest::Client::new();
    let resp = client
        .post(cfg.completions_url())
        .headers(cfg.headers()?)
        .json(&body)
        .send()
        .await
        .context("streaming chat request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("streaming chat error: {status} {txt}");
    }

    let mut stream = resp.bytes_stream();
    // bytes, not text: a chunk boundary may split a multi-byte character
    let mut buf: Vec<u8> = Vec::new();
    let mut acc = ReplyAccumulator::default();

    'read: while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("stream chunk")?;
        buf.extend_from_slice(chunk.as_ref());

        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(text) = acc.push_line(&line)? {
                on_event(StreamEvent::Delta(text));
            }
            if acc.is_done() {
                break 'read;
            }
        }
    }

    on_event(StreamEvent::Completed);
    Ok(acc.finish())
}
