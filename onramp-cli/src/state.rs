use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub fn onramp_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".onramp"))
}

pub fn ensure_onramp_home() -> Result<PathBuf> {
    let dir = onramp_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

fn ensure_subdir(name: &str) -> Result<PathBuf> {
    let dir = ensure_onramp_home()?.join(name);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Daily chat transcripts.
pub fn chat_dir() -> Result<PathBuf> {
    ensure_subdir("chat")
}

/// Plans captured from chat sessions.
pub fn plans_dir() -> Result<PathBuf> {
    ensure_subdir("plans")
}

pub fn log_path() -> Result<PathBuf> {
    Ok(ensure_onramp_home()?.join("onramp.log"))
}
