//! Environment configuration. Only secrets and env-specific values live here.

use anyhow::{Context, Result};

const DEFAULT_STATE_PATH: &str = "santa_state.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub state_path: String,
    /// Presence selects webhook mode; absent means long polling.
    pub webhook_addr: Option<String>,
    pub webhook_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            bot_token: std::env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?,
            state_path: std::env::var("STATE_PATH")
                .unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string()),
            webhook_addr: std::env::var("WEBHOOK_ADDR").ok(),
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
        })
    }
}
