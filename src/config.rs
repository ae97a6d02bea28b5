//! Process-level configuration, loaded from the environment.
//!
//! Per-source configuration lives in the database (see `sources`); this is
//! only what the binary needs to come up.

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    /// Scheduler wake interval in seconds.
    pub scheduler_tick_secs: u64,
    /// HTTP timeout for feed downloads, in seconds.
    pub fetch_timeout_secs: u64,
    pub advisor_api_key: Option<String>,
    pub advisor_model: String,
    pub advisor_timeout_ms: u64,
    pub marketplace_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./stockflow.db".to_string());

        let scheduler_tick_secs = std::env::var("SCHEDULER_TICK_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let fetch_timeout_secs = std::env::var("FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .unwrap_or(120);

        let advisor_api_key = std::env::var("COLOR_ADVISOR_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let advisor_model = std::env::var("COLOR_ADVISOR_MODEL")
            .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let advisor_timeout_ms = std::env::var("COLOR_ADVISOR_TIMEOUT_MS")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .unwrap_or(8000);

        let marketplace_base_url = std::env::var("MARKETPLACE_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());

        Ok(Self {
            database_path,
            scheduler_tick_secs,
            fetch_timeout_secs,
            advisor_api_key,
            advisor_model,
            advisor_timeout_ms,
            marketplace_base_url,
        })
    }
}
