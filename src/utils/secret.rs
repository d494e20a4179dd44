//! Secret loading (storage key, SFTP password): env var → .env in dir → secure prompt.

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;
use std::path::Path;

fn non_empty_env(env_key: &str) -> Option<String> {
    std::env::var(env_key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn try_env_then_dotenv(env_key: &str, dir: &Path) -> Option<String> {
    if let Some(s) = non_empty_env(env_key) {
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        return non_empty_env(env_key);
    }
    None
}

/// Read a secret: `env_key` in the environment → `.env` in `dir` → secure prompt labelled `what`.
pub fn resolve_secret(env_key: &str, dir: &Path, what: &str) -> Result<String> {
    if let Some(s) = try_env_then_dotenv(env_key, dir) {
        info!("{} found in environment ({})", what, env_key);
        return Ok(s);
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let secret = rpassword::prompt_password(format!("{} Enter {}: ", label, what))
        .with_context(|| format!("read {what}"))?;
    let secret = secret.trim().to_string();
    if secret.is_empty() {
        anyhow::bail!("{} is required (set {} or enter it at the prompt)", what, env_key);
    }
    Ok(secret)
}
