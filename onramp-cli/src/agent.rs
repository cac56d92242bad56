//! The chat agent: one user turn in, up to `max_iterations` tool rounds,
//! filtered assistant text out.

use anyhow::Result;
use onramp_core::{
    detect, discovery_state_block, ClientContext, ImplementationPlan, Message, ReadinessResult,
    RequestContext, Role, UserInfo,
};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::knowledge_store::{HttpKnowledgeStore, KnowledgeStore};
use crate::llm::{self, LlmConfig, WireMessage};
use crate::llm_stream::{self, StreamEvent};
use crate::prompt::system_prompt;
use crate::tools::{tool_specs, ToolBox};

const LEAK_MARKERS: &[&str] = &[
    "[INTERNAL KNOWLEDGE]",
    "TECHNICAL_CONTEXT:",
    "Retrieved knowledge highlights",
    "RAG-based implementation guidance",
    "Implementation guidance from the knowledge base",
    "Use these knowledge excerpts",
    "ImplementationPlanExampleFormat",
    "key excerpt:",
    "[guide]",
    "[INTERNAL USE ONLY",
];

fn tool_error_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bError invoking tool\b|with error:\s*Error:").ok())
        .as_ref()
}

/// True for text that is tool output or tool error text rather than
/// something meant for the user.
pub fn is_leaked_output(chunk: &str) -> bool {
    let trimmed = chunk.trim();
    trimmed.starts_with('{')
        || trimmed.starts_with("[\"")
        || trimmed.contains("\"company\":")
        || LEAK_MARKERS.iter().any(|m| chunk.contains(m))
        || tool_error_re().is_some_and(|re| re.is_match(chunk))
}

/// Drop leaked paragraphs from a complete reply.
pub fn filter_leaks(text: &str) -> String {
    text.split("\n\n")
        .filter(|p| !is_leaked_output(p))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One answered user turn.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    pub plan: Option<ImplementationPlan>,
    pub readiness: ReadinessResult,
}

/// Collects shown text across rounds, separating rounds with a blank line.
struct TextSink<'a> {
    text: String,
    round_started: bool,
    on_text: &'a mut (dyn FnMut(&str) + Send),
}

impl TextSink<'_> {
    fn push(&mut self, chunk: &str) {
        if is_leaked_output(chunk) {
            debug!(len = chunk.len(), "dropped leaked chunk");
            return;
        }
        if !self.round_started && !self.text.is_empty() {
            self.text.push_str("\n\n");
            (self.on_text)("\n\n");
        }
        self.round_started = true;
        self.text.push_str(chunk);
        (self.on_text)(chunk);
    }

    fn next_round(&mut self) {
        self.round_started = false;
    }
}

pub struct Agent {
    llm: LlmConfig,
    store: Option<Box<dyn KnowledgeStore>>,
    user: Option<UserInfo>,
    max_iterations: usize,
    max_turns_context: usize,
    results_per_query: usize,
    stream: bool,
}

impl Agent {
    pub fn from_config(cfg: &Config, user: Option<UserInfo>) -> Result<Self> {
        let store = HttpKnowledgeStore::from_config(&cfg.knowledge)
            .map(|s| Box::new(s) as Box<dyn KnowledgeStore>);
        if store.is_none() {
            info!("no knowledge store configured; searches use fallback guidance");
        }
        Ok(Self {
            llm: LlmConfig::from_section(&cfg.llm)?,
            store,
            user,
            max_iterations: cfg.llm.max_iterations.max(1),
            max_turns_context: cfg.chat.max_turns_context,
            results_per_query: cfg.knowledge.top_k.max(1),
            stream: cfg.chat.stream,
        })
    }

    /// System prompt, discovery state (when anything is known), then the
    /// transcript.
    fn build_messages(&self, ctx: &RequestContext, transcript: &[Message]) -> Vec<WireMessage> {
        let mut messages = vec![WireMessage::system(system_prompt(self.user.as_ref()))];
        if let Some(state) = discovery_state_block(&ctx.answers) {
            messages.push(WireMessage::system(state));
        }

        let start = if self.max_turns_context == 0 {
            0
        } else {
            transcript.len().saturating_sub(self.max_turns_context)
        };
        for m in &transcript[start..] {
            match m.role {
                Role::User => messages.push(WireMessage::text("user", m.content.clone())),
                Role::Assistant => messages.push(WireMessage::text("assistant", m.content.clone())),
                Role::System | Role::Tool => {}
            }
        }
        messages
    }

    /// Answer the last user message of `transcript`.
    pub async fn respond(
        &self,
        transcript: &[Message],
        client: Option<&ClientContext>,
        mut on_text: impl FnMut(&str) + Send,
    ) -> Result<AgentReply> {
        let ctx = RequestContext::from_transcript(transcript, client);
        let mut messages = self.build_messages(&ctx, transcript);
        let tools = tool_specs();
        let toolbox = ToolBox::new(&ctx, self.store.as_deref(), self.results_per_query);

        let mut sink = TextSink {
            text: String::new(),
            round_started: false,
            on_text: &mut on_text,
        };
        let mut plan = None;
        let mut finished = false;

        for round in 0..self.max_iterations {
            sink.next_round();
            let reply = if self.stream {
                llm_stream::stream_chat(&self.llm, &messages, &tools, |ev| {
                    if let StreamEvent::Delta(chunk) = ev {
                        sink.push(&chunk);
                    }
                })
                .await?
            } else {
                let reply = llm::complete(&self.llm, &messages, &tools).await?;
                if let Some(content) = &reply.content {
                    let shown = filter_leaks(content);
                    if !shown.trim().is_empty() {
                        sink.push(&shown);
                    }
                }
                reply
            };

            if reply.tool_calls.is_empty() {
                finished = true;
                break;
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply.into());
            for call in &calls {
                info!(round, tool = %call.function.name, "tool call");
                let outcome = toolbox.dispatch(&call.function.name, &call.function.arguments).await;
                if outcome.plan.is_some() {
                    plan = outcome.plan;
                }
                messages.push(WireMessage::tool_result(&call.id, outcome.output));
            }
        }

        if !finished {
            warn!(max_iterations = self.max_iterations, "agent stopped at the tool round limit");
        }

        Ok(AgentReply {
            text: sink.text,
            plan,
            readiness: detect(&ctx.answers, &ctx.questions_asked),
        })
    }
}
