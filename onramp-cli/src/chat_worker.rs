use std::sync::Arc;
use tokio::sync::mpsc;

use onramp_core::{ImplementationPlan, Message, ReadinessResult};

use crate::agent::Agent;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub request_id: u64,
    pub transcript: Vec<Message>,
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    Started {
        request_id: u64,
    },
    Delta {
        request_id: u64,
        text: String,
    },
    Completed {
        request_id: u64,
        text: String,
        plan: Option<ImplementationPlan>,
        readiness: ReadinessResult,
    },
    Error {
        request_id: u64,
        message: String,
    },
}

pub async fn run_worker(
    agent: Result<Arc<Agent>, String>,
    mut rx: mpsc::UnboundedReceiver<ChatRequest>,
    tx: std::sync::mpsc::Sender<ChatEvent>,
) {
    let mut current: Option<tokio::task::JoinHandle<()>> = None;

    while let Some(req) = rx.recv().await {
        // a newer message supersedes the one in flight
        if let Some(h) = current.take() {
            h.abort();
        }

        let agent = match &agent {
            Ok(a) => Arc::clone(a),
            Err(e) => {
                let _ = tx.send(ChatEvent::Error {
                    request_id: req.request_id,
                    message: e.clone(),
                });
                continue;
            }
        };

        let tx2 = tx.clone();
        current = Some(tokio::spawn(async move {
            let request_id = req.request_id;
            let _ = tx2.send(ChatEvent::Started { request_id });

            let delta_tx = tx2.clone();
            let res = agent
                .respond(&req.transcript, None, move |text: &str| {
                    let _ = delta_tx.send(ChatEvent::Delta {
                        request_id,
                        text: text.to_string(),
                    });
                })
                .await;

            let event = match res {
                Ok(reply) => ChatEvent::Completed {
                    request_id,
                    text: reply.text,
                    plan: reply.plan,
                    readiness: reply.readiness,
                },
                Err(e) => ChatEvent::Error {
                    request_id,
                    message: format!("LLM error: {e:#}"),
                },
            };
            let _ = tx2.send(event);
        }));
    }
}
