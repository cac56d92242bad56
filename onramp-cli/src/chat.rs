use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use onramp_core::{detect, ImplementationPlan, Message, ReadinessResult, RequestContext, Role};
use onramp_render::normalize_markdown;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::chat_worker::{self, ChatEvent, ChatRequest};
use crate::state;

const GREETING: &str = "👋 Hi! Let's get started. What's your company's website (domain)?\n\
If you don't have one, you can tell me your business name and what your business does.";

struct ChatLog {
    path: PathBuf,
}

impl ChatLog {
    fn open_today() -> Result<Self> {
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let path = state::chat_dir()?.join(format!("{today}.md"));
        Ok(Self { path })
    }

    fn append(&mut self, role: &str, msg: &str) -> Result<()> {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        writeln!(
            f,
            "- {} [{}] {}",
            chrono::Utc::now().to_rfc3339(),
            role,
            msg.replace('\n', " ")
        )?;
        Ok(())
    }
}

/// Write the plan text and its structured form side by side so
/// `onramp render <plan.md> --plan <plan.json>` can export them.
fn save_plan(text: &str, plan: &ImplementationPlan) -> Result<(PathBuf, PathBuf)> {
    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let dir = state::plans_dir()?;
    let md = dir.join(format!("plan-{stamp}.md"));
    std::fs::write(&md, text).with_context(|| format!("write {}", md.display()))?;
    let json = dir.join(format!("plan-{stamp}.json"));
    std::fs::write(&json, serde_json::to_string_pretty(plan)?)
        .with_context(|| format!("write {}", json.display()))?;
    Ok((md, json))
}

fn export_hint(md: &Path, json: &Path) -> String {
    format!(
        "Plan saved to {}. Export it with: onramp render {} --plan {}",
        md.display(),
        md.display(),
        json.display()
    )
}

struct ChatState {
    messages: Vec<Message>,
    readiness: ReadinessResult,
    input: String,
    show_help: bool,
    pending: Option<u64>,
    /// The last message is a reply still being streamed.
    streaming: bool,
    next_request: u64,
}

impl ChatState {
    fn new() -> Self {
        let messages = vec![Message::assistant(GREETING)];
        Self {
            readiness: readiness_of(&messages),
            messages,
            input: String::new(),
            show_help: true,
            pending: None,
            streaming: false,
            next_request: 1,
        }
    }

    fn system(&mut self, text: impl Into<String>) {
        self.messages.push(Message::new(Role::System, text));
    }

    /// Conversation the agent sees: user and assistant turns only.
    fn transcript(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .filter(|m| !m.content.trim().is_empty())
            .cloned()
            .collect()
    }

    /// A reply cut off by a newer message stays on screen as a system line
    /// and is no longer part of the transcript.
    fn interrupt_streaming(&mut self) {
        if !std::mem::take(&mut self.streaming) {
            return;
        }
        if self.messages.last().is_some_and(|m| m.role == Role::Assistant) {
            if let Some(partial) = self.messages.pop() {
                if !partial.content.trim().is_empty() {
                    self.system(format!("(interrupted) {}", partial.content));
                }
            }
        }
    }

    /// Record a user message and build the request for it.
    fn submit(&mut self, text: String) -> ChatRequest {
        self.interrupt_streaming();
        self.messages.push(Message::user(text));
        self.readiness = readiness_of(&self.transcript());
        let request_id = self.next_request;
        self.next_request += 1;
        self.pending = Some(request_id);
        ChatRequest {
            request_id,
            transcript: self.transcript(),
        }
    }

    fn streaming_reply(&mut self) -> Option<&mut Message> {
        self.messages
            .last_mut()
            .filter(|m| m.role == Role::Assistant)
    }
}

fn readiness_of(messages: &[Message]) -> ReadinessResult {
    let ctx = RequestContext::from_transcript(messages, None);
    detect(&ctx.answers, &ctx.questions_asked)
}

fn header_line(r: &ReadinessResult) -> String {
    let hubs = r.active_hubs.names();
    let hubs = if hubs.is_empty() {
        "no hubs yet".to_string()
    } else {
        hubs.join(", ")
    };
    format!(
        "readiness {}% · {} data points · {} · {}",
        r.confidence, r.metrics.total_data_points, hubs, r.metrics.status
    )
}

pub fn run_chat(agent: Result<Arc<Agent>, String>) -> Result<()> {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (ev_tx, ev_rx) = std::sync::mpsc::channel();
    let worker = tokio::spawn(chat_worker::run_worker(agent, req_rx, ev_tx));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = chat_loop(&mut terminal, &req_tx, &ev_rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    worker.abort();

    res
}

fn draw(terminal: &mut Terminal<CrosstermBackend<Stdout>>, st: &ChatState) -> Result<()> {
    terminal.draw(|f| {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(5), Constraint::Length(3)])
            .split(f.area());

        let ready_color = if st.readiness.ready { Color::Green } else { Color::Yellow };
        let splash = Paragraph::new(Text::from(vec![
            Line::from(Span::styled(
                "Onramp",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(header_line(&st.readiness), Style::default().fg(ready_color))),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(splash, chunks[0]);

        let mut lines: Vec<Line> = Vec::new();
        if st.show_help {
            lines.push(Line::from(Span::styled(
                "Shortcuts: Enter=send, Esc=quit, F1=help",
                Style::default().fg(Color::Gray),
            )));
            lines.push(Line::raw("Commands: /help /status /reset"));
            lines.push(Line::raw(""));
        }

        for m in &st.messages {
            let (tag, color) = match m.role {
                Role::User => ("you", Color::Cyan),
                Role::Assistant => ("onramp", Color::Magenta),
                Role::System | Role::Tool => ("system", Color::Gray),
            };
            let mut body = m.content.lines();
            lines.push(Line::from(vec![
                Span::styled(format!("{}: ", tag), Style::default().fg(color)),
                Span::raw(body.next().unwrap_or("").to_string()),
            ]));
            lines.extend(body.map(|l| Line::raw(l.to_string())));
            lines.push(Line::raw(""));
        }

        let title = if st.pending.is_some() { "conversation (thinking…)" } else { "conversation" };
        // keep the newest lines in view
        let visible = chunks[1].height.saturating_sub(2) as usize;
        let scroll = lines.len().saturating_sub(visible) as u16;
        let history = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        f.render_widget(history, chunks[1]);

        let input = Paragraph::new(st.input.as_str())
            .block(Block::default().borders(Borders::ALL).title("message"))
            .style(Style::default().fg(Color::White));
        f.render_widget(input, chunks[2]);
    })?;
    Ok(())
}

fn chat_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    req_tx: &mpsc::UnboundedSender<ChatRequest>,
    ev_rx: &std::sync::mpsc::Receiver<ChatEvent>,
) -> Result<()> {
    let mut st = ChatState::new();
    let mut log = ChatLog::open_today()?;
    log.append("system", "session_start")?;
    log.append("assistant", GREETING)?;

    loop {
        while let Ok(ev) = ev_rx.try_recv() {
            handle_event(&mut st, &mut log, ev)?;
        }

        draw(terminal, &st)?;

        if !event::poll(std::time::Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Esc => break,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::F(1) => st.show_help = !st.show_help,
            KeyCode::Enter => {
                let trimmed = st.input.trim().to_string();
                st.input.clear();
                if trimmed.is_empty() {
                    continue;
                }
                log.append("user", &trimmed)?;

                if let Some(reply) = handle_slash(&mut st, &trimmed) {
                    log.append("system", &reply)?;
                    st.system(reply);
                    continue;
                }

                let request = st.submit(trimmed);
                req_tx.send(request).context("chat worker stopped")?;
            }
            KeyCode::Backspace => {
                st.input.pop();
            }
            KeyCode::Char(c) => st.input.push(c),
            _ => {}
        }
    }

    log.append("system", "session_end")?;
    Ok(())
}

fn handle_event(st: &mut ChatState, log: &mut ChatLog, ev: ChatEvent) -> Result<()> {
    match ev {
        ChatEvent::Started { request_id } if st.pending == Some(request_id) => {
            st.messages.push(Message::assistant(""));
            st.streaming = true;
        }
        ChatEvent::Delta { request_id, text } if st.pending == Some(request_id) => {
            if let Some(reply) = st.streaming_reply() {
                reply.content.push_str(&text);
            }
        }
        ChatEvent::Completed {
            request_id,
            text,
            plan,
            readiness,
        } if st.pending == Some(request_id) => {
            st.pending = None;
            st.streaming = false;
            let shown = normalize_markdown(&text);
            match st.streaming_reply() {
                Some(reply) => reply.content = shown.clone(),
                None => st.messages.push(Message::assistant(shown.clone())),
            }
            // drop the placeholder when the turn produced no text
            if shown.trim().is_empty() {
                st.messages.pop();
            } else {
                log.append("assistant", &shown)?;
            }
            st.readiness = readiness;

            if let Some(plan) = plan {
                match save_plan(&shown, &plan) {
                    Ok((md, json)) => {
                        info!(path = %md.display(), "plan saved");
                        st.system(export_hint(&md, &json));
                    }
                    Err(e) => {
                        warn!(error = %e, "could not save plan");
                        st.system(format!("Could not save plan: {e:#}"));
                    }
                }
            }
        }
        ChatEvent::Error { request_id, message } if st.pending == Some(request_id) => {
            st.pending = None;
            let streamed = std::mem::take(&mut st.streaming);
            if streamed && st.streaming_reply().is_some_and(|m| m.content.is_empty()) {
                st.messages.pop();
            }
            warn!(%message, "chat turn failed");
            log.append("system", &message)?;
            st.system(message);
        }
        // events from a superseded request
        _ => {}
    }
    Ok(())
}

fn handle_slash(st: &mut ChatState, input: &str) -> Option<String> {
    if !input.starts_with('/') {
        return None;
    }
    let reply = match input {
        "/help" => "Commands:\n\
- /help\n\
- /status (discovery readiness)\n\
- /reset (start a new interview)\n\
\nShortcuts: Enter=send, Esc=quit, F1=toggle help"
            .to_string(),
        "/status" => {
            let r = &st.readiness;
            let missing = if r.missing.is_empty() {
                "nothing".to_string()
            } else {
                r.missing.join("; ")
            };
            format!(
                "Status: {}\nConfidence: {}%\nQuestions asked: {}\nMissing: {}\nChat logs: ~/.onramp/chat/YYYY-MM-DD.md",
                r.metrics.status, r.confidence, r.metrics.total_questions, missing
            )
        }
        "/reset" => {
            *st = ChatState::new();
            "Started a new interview.".to_string()
        }
        _ => "Unknown command. Try /help".to_string(),
    };
    Some(reply)
}
