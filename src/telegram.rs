// src/telegram.rs
use anyhow::Result;
use log::{error, info};
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::utils::command::BotCommands;
use teloxide::Bot;

use crate::database::Database;
use crate::error::DispatchError;
use crate::models::{MilestoneAlert, NarrativeResult, PairRecord};
use crate::utils::format_usd;

/// Thin wrapper over the teloxide bot, pinned to a single alert channel.
#[derive(Clone)]
pub struct TelegramBot {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramBot {
    pub async fn new(token: &str, chat_id: i64) -> Result<Self> {
        let bot = Bot::new(token);

        // Fail fast on a bad token; everything after startup is recoverable.
        match bot.get_me().await {
            Ok(me) => info!("✅ Telegram bot connected: @{}", me.username()),
            Err(e) => {
                error!("❌ Failed to connect to Telegram: {}", e);
                return Err(anyhow::anyhow!("Telegram connection failed: {}", e));
            }
        }

        Ok(Self {
            bot,
            chat_id: ChatId(chat_id),
        })
    }

    /// Render and deliver a new-token alert.
    pub async fn send_alert(
        &self,
        record: &PairRecord,
        narrative: &NarrativeResult,
    ) -> Result<(), DispatchError> {
        let message = format_alert_message(record, narrative);
        // Plain text; the summary is model output and not markdown-safe.
        self.bot.send_message(self.chat_id, message).await?;

        info!("📤 Alert sent for {}", record.symbol);
        Ok(())
    }

    pub async fn send_startup_message(&self) -> Result<(), DispatchError> {
        self.bot
            .send_message(
                self.chat_id,
                "🤖 Dexscreener Alert Bot Started\n\nMonitoring for new tokens...",
            )
            .await?;
        Ok(())
    }

    pub async fn send_milestone_alert(&self, alert: &MilestoneAlert) -> Result<(), DispatchError> {
        let message = format_milestone_message(alert);
        self.bot.send_message(self.chat_id, message).await?;

        info!(
            "📤 Milestone {} sent for {}",
            alert.milestone, alert.token.symbol
        );
        Ok(())
    }

    /// Long-poll for /status and /help. Runs until the process exits.
    pub async fn run_command_listener(&self, db: Database) {
        info!("🤖 Starting Telegram command listener...");

        let handler = Update::filter_message()
            .filter_command::<Command>()
            .endpoint(answer_command);

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![db])
            .default_handler(|upd| async move {
                log::debug!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Dexscreener Alert Bot commands:")]
enum Command {
    #[command(description = "Show tokens alerted today")]
    Status,
    #[command(description = "Show this help message")]
    Help,
}

async fn answer_command(bot: Bot, msg: Message, cmd: Command, db: Database) -> ResponseResult<()> {
    let response = match cmd {
        Command::Status => match status_text(&db).await {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to build /status reply: {}", e);
                "❌ Failed to load status".to_string()
            }
        },
        Command::Help => Command::descriptions().to_string(),
    };

    bot.send_message(msg.chat.id, response).await?;
    Ok(())
}

async fn status_text(db: &Database) -> Result<String> {
    let count = db.seen_count().await?;
    let recent = db.recent_tokens(15).await?;

    let mut text = format!("📊 Dexscreener Alert Bot Status\n\n📈 Tokens seen today: {count}\n\n");

    if recent.is_empty() {
        text.push_str("📭 No tokens stored yet today.\n");
    } else {
        text.push_str("🔥 Recent tokens:\n");
        for (i, token) in recent.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} ({})\n   💰 {} | 📊 {} | ⛓️ {}\n",
                i + 1,
                token.symbol,
                token.name,
                format_usd(token.liquidity_usd),
                format_usd(token.market_cap),
                token.chain.to_uppercase()
            ));
        }
    }

    text.push_str("\n💡 Database resets at midnight UTC.");
    Ok(text)
}

/// Fixed alert layout; abbreviated numbers, signed change percentages, and a
/// Twitter line only when the listing carries one.
pub fn format_alert_message(record: &PairRecord, narrative: &NarrativeResult) -> String {
    let change_24h_icon = if record.price_change_24h >= 0.0 { "🟢" } else { "🔴" };
    let change_6h_icon = if record.price_change_6h >= 0.0 { "🟢" } else { "🔴" };

    let mut message = format!(
        "🚨 New Token Alert: {name} (${symbol})\n\
         ⛓️ Chain: {chain}\n\n\
         💰 Liquidity: {liquidity}\n\
         📊 Market Cap: {market_cap}\n\
         📈 24h Volume: {volume}\n\
         {icon_24h} 24h Change: {change_24h:+.1}%\n\
         {icon_6h} 6h Change: {change_6h:+.1}%\n\n\
         📖 Narrative: {narrative}\n\
         🧠 Verdict: {verdict}\n\n\
         📝 {summary}\n\n\
         🔗 Dexscreener: {url}\n",
        name = record.name,
        symbol = record.symbol,
        chain = record.chain.to_uppercase(),
        liquidity = format_usd(record.liquidity_usd),
        market_cap = format_usd(record.market_cap_usd),
        volume = format_usd(record.volume_24h_usd),
        icon_24h = change_24h_icon,
        change_24h = record.price_change_24h,
        icon_6h = change_6h_icon,
        change_6h = record.price_change_6h,
        narrative = narrative.narrative,
        verdict = narrative.verdict,
        summary = narrative.summary,
        url = record.url,
    );

    if let Some(twitter) = &record.twitter_url {
        message.push_str(&format!("🐦 Twitter: {twitter}\n"));
    }

    message
}

fn format_milestone_message(alert: &MilestoneAlert) -> String {
    if alert.is_dump {
        format!(
            "📉 Dump Warning: {name} (${symbol})\n\n\
             🔻 Down {change:.0}% from alert price\n\
             💵 Alert price: ${alert_price}\n\
             💵 Current price: ${current_price}",
            name = alert.token.name,
            symbol = alert.token.symbol,
            change = alert.change_percent.abs(),
            alert_price = alert.token.alert_price,
            current_price = alert.current_price,
        )
    } else {
        format!(
            "🚀 {milestone} Milestone: {name} (${symbol})\n\n\
             📈 {multiplier:.1}x since alert ({change:+.0}%)\n\
             💵 Alert price: ${alert_price}\n\
             💵 Current price: ${current_price}",
            milestone = alert.milestone,
            name = alert.token.name,
            symbol = alert.token.symbol,
            multiplier = alert.multiplier,
            change = alert.change_percent,
            alert_price = alert.token.alert_price,
            current_price = alert.current_price,
        )
    }
}
