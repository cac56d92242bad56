//! Tracing setup. Batch commands log to stderr; the chat TUI owns the
//! terminal, so it logs to `~/.onramp/onramp.log` instead.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogSection;
use crate::state;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File,
}

/// Keeps the file writer flushing until dropped.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

fn filter(section: &LogSection) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&section.level))
}

pub fn init(section: &LogSection, target: LogTarget) -> Result<LoggingGuard> {
    let guard = match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter(section))
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init()
                .ok();
            None
        }
        LogTarget::File => {
            let path = state::log_path()?;
            let dir = path.parent().context("log path has no parent")?;
            let file_name = path.file_name().context("log path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter(section))
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .ok();
            tracing::info!(log = %path.display(), level = %section.level, "logging initialized");
            Some(guard)
        }
    };
    Ok(LoggingGuard { _guard: guard })
}
