use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Base WebSocket URL; the updates namespace is appended to it.
    pub updates_url: String,
    pub access_token: Option<String>,
    pub reconnect_delay: Duration,
    pub db_path: PathBuf,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let updates_url = get("BACKOFFICE_UPDATES_URL").unwrap_or_else(|| "ws://127.0.0.1:3000".into());
        let access_token = get("BACKOFFICE_ACCESS_TOKEN").filter(|t| !t.trim().is_empty());
        let reconnect_ms: u64 = get("BACKOFFICE_RECONNECT_MS")
            .unwrap_or_else(|| "2000".into())
            .parse()
            .context("BACKOFFICE_RECONNECT_MS must be a whole number of milliseconds")?;
        let db_path = get("BACKOFFICE_DB_PATH").unwrap_or_else(|| "backoffice.db".into());

        Ok(Self {
            updates_url,
            access_token,
            reconnect_delay: Duration::from_millis(reconnect_ms),
            db_path: PathBuf::from(db_path),
        })
    }
}
