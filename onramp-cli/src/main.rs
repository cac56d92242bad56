use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use onramp_core::{detect, ImplementationPlan, Message, RequestContext, UserInfo};
use onramp_render::{export_plan, normalize_markdown, LayoutConfig};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod agent;
mod auth;
mod chat;
mod chat_worker;
mod config;
mod knowledge_store;
mod llm;
mod llm_stream;
mod logging;
mod prompt;
mod state;
mod tools;

use logging::LogTarget;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("ONRAMP_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "onramp", version = VERSION, about = "HubSpot onboarding discovery assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive discovery interview (TUI)
    Chat {
        /// Company name shown to the assistant
        #[arg(long)]
        company: Option<String>,

        /// Company website
        #[arg(long)]
        website: Option<String>,

        /// Contact email
        #[arg(long)]
        email: Option<String>,
    },

    /// Print discovery readiness for a saved transcript (JSON array of messages)
    Readiness {
        #[arg(long)]
        transcript: PathBuf,
    },

    /// Repair the markdown of a streamed plan and print it
    Normalize { file: PathBuf },

    /// Lay out a plan for export and print the document as JSON
    Render {
        file: PathBuf,

        /// Company name for the cover (overrides the plan JSON)
        #[arg(long)]
        company: Option<String>,

        /// Company website, linked from the cover
        #[arg(long)]
        website: Option<String>,

        /// Wrap width in characters
        #[arg(long)]
        max_chars: Option<usize>,

        /// Structured plan saved next to the markdown by `onramp chat`
        #[arg(long)]
        plan: Option<PathBuf>,
    },

    /// Write the default config to ~/.onramp/config.toml
    InitConfig,

    /// Credentials for the LLM provider
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Paste an OpenAI API key and store it in ~/.onramp/auth.json
    PasteOpenaiApiKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    let target = match cli.command {
        Command::Chat { .. } => LogTarget::File,
        _ => LogTarget::Stderr,
    };
    let _log_guard = logging::init(&cfg.log, target)?;

    match cli.command {
        Command::Chat {
            company,
            website,
            email,
        } => {
            let user = user_info(company, website, email);
            // The TUI reports a missing key inside the session instead of exiting.
            let agent = agent::Agent::from_config(&cfg, user)
                .map(Arc::new)
                .map_err(|e| format!("{e:#}"));
            if let Err(e) = &agent {
                tracing::warn!(error = %e, "agent unavailable");
            }
            chat::run_chat(agent)?;
        }

        Command::Readiness { transcript } => {
            let messages: Vec<Message> = read_json(&transcript)?;
            let ctx = RequestContext::from_transcript(&messages, None);
            let readiness = detect(&ctx.answers, &ctx.questions_asked);
            let out = json!({
                "readiness": readiness,
                "answersCollected": ctx.answers,
                "questionsAsked": ctx.questions_asked,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Normalize { file } => {
            let md = read_text(&file)?;
            println!("{}", normalize_markdown(&md));
        }

        Command::Render {
            file,
            company,
            website,
            max_chars,
            plan,
        } => {
            let md = read_text(&file)?;
            let mut structured: ImplementationPlan = match plan {
                Some(p) => read_json(&p)?,
                None => ImplementationPlan::default(),
            };
            if let Some(c) = company {
                structured.company = c;
            }
            let mut layout = LayoutConfig::default();
            if let Some(n) = max_chars {
                layout.max_chars_per_line = n.max(1);
            }
            let exported = export_plan(&md, &structured, website.as_deref(), &layout);
            println!("{}", serde_json::to_string_pretty(&exported)?);
        }

        Command::InitConfig => {
            config::init_config()?;
        }

        Command::Auth { command } => match command {
            AuthCommand::PasteOpenaiApiKey => {
                auth::openai_paste_api_key()?;
            }
        },
    }

    Ok(())
}

fn user_info(company: Option<String>, website: Option<String>, email: Option<String>) -> Option<UserInfo> {
    if company.is_none() && website.is_none() && email.is_none() {
        return None;
    }
    Some(UserInfo {
        company: company.unwrap_or_default(),
        website: website.unwrap_or_default(),
        email: email.unwrap_or_default(),
        ..Default::default()
    })
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let s = read_text(path)?;
    serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_render_flags() {
        let cli = Cli::try_parse_from([
            "onramp", "render", "plan.md", "--company", "Acme", "--max-chars", "60",
        ])
        .unwrap();
        match cli.command {
            Command::Render {
                file,
                company,
                website,
                max_chars,
                plan,
            } => {
                assert_eq!(file, PathBuf::from("plan.md"));
                assert_eq!(company.as_deref(), Some("Acme"));
                assert!(website.is_none());
                assert_eq!(max_chars, Some(60));
                assert!(plan.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_user_info_only_when_flags_given() {
        assert!(user_info(None, None, None).is_none());
        let u = user_info(Some("Acme".into()), None, None).unwrap();
        assert_eq!(u.company, "Acme");
        assert!(u.website.is_empty());
    }
}
