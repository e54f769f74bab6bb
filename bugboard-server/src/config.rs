use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// Prefix for report identifiers, e.g. `BUG` yields `BUG-001`.
    pub id_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let id_prefix = parse_id_prefix(env::var("BUGBOARD_ID_PREFIX").ok())?;

        Ok(Config {
            port,
            state_dir,
            id_prefix,
        })
    }

    /// Path of the SQLite database inside the state directory.
    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join("bugboard.db")
    }
}

/// Parse BUGBOARD_ID_PREFIX from an optional string value.
///
/// Defaults to `BUG`. Rejects empty/whitespace values and anything containing
/// the `-` separator, which would make ids ambiguous.
pub fn parse_id_prefix(value: Option<String>) -> Result<String> {
    match value {
        None => Ok("BUG".to_string()),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                anyhow::bail!("BUGBOARD_ID_PREFIX must not be empty");
            }
            if trimmed.contains('-') {
                anyhow::bail!("BUGBOARD_ID_PREFIX must not contain '-'");
            }
            Ok(trimmed.to_string())
        }
    }
}
