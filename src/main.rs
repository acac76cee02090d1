// src/main.rs
use anyhow::Result;
use log::{error, info};

mod config;
mod database;
mod error;
mod filter;
mod models;
mod narrative;
mod price_tracker;
mod scanners;
mod scheduler;
mod telegram;
mod utils;

use config::Config;
use database::Database;
use scheduler::Scheduler;
use telegram::TelegramBot;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    info!("🚀 Starting Dexscreener Alert Bot");

    // Missing configuration is the only fatal error class.
    let config = Config::load()?;
    info!("✅ Configuration loaded");

    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;
    info!("✅ Database initialized");

    let telegram = TelegramBot::new(&config.telegram_bot_token, config.telegram_chat_id).await?;

    let scheduler = Scheduler::new(&config, db.clone(), telegram.clone());

    let mut handles = vec![];

    // Command listener and polling loop run side by side.
    handles.push(tokio::spawn({
        let telegram = telegram.clone();
        let db = db.clone();
        async move { telegram.run_command_listener(db).await }
    }));

    handles.push(tokio::spawn(async move { scheduler.run().await }));

    info!("🔥 Bot is now running...");

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Service error: {}", e);
        }
    }

    Ok(())
}
