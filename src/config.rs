// src/config.rs
use std::env;

use crate::error::ConfigError;

/// Process configuration, loaded once at startup. Every field is required;
/// a missing or malformed value aborts the process before any service starts.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_chat_id: i64,

    // Groq (narrative analysis)
    pub groq_api_key: String,

    // Database
    pub database_url: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let chat_id_raw = require("TELEGRAM_CHAT_ID")?;

        Ok(Config {
            telegram_bot_token: require("TELEGRAM_BOT_TOKEN")?,

            telegram_chat_id: chat_id_raw
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    ConfigError::Invalid("TELEGRAM_CHAT_ID", e.to_string())
                })?,

            groq_api_key: require("GROQ_API_KEY")?,

            database_url: require("DATABASE_URL")?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}
