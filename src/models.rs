// src/models.rs
use chrono::{DateTime, Utc};

/// One trading pair as extracted from a scrape. Built fresh every cycle and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PairRecord {
    pub name: String,
    pub symbol: String,
    pub chain: String,
    pub token_address: String,
    pub pair_address: String,
    pub liquidity_usd: f64,
    pub market_cap_usd: f64,
    pub fdv_usd: f64,
    pub buys_24h: u64,
    pub sells_24h: u64,
    pub volume_24h_usd: f64,
    pub price_change_24h: f64,
    pub price_change_6h: f64,
    pub price_usd: f64,
    pub twitter_url: Option<String>,
    pub url: String,
}

/// Output of the narrative enrichment stage. Lives only as long as the alert
/// it accompanies.
#[derive(Debug, Clone)]
pub struct NarrativeResult {
    pub narrative: String,
    pub verdict: String,
    pub summary: String,
}

impl NarrativeResult {
    /// Stand-in used when enrichment fails; the alert still goes out.
    pub fn placeholder() -> Self {
        Self {
            narrative: "Unknown".to_string(),
            verdict: "Unknown".to_string(),
            summary: "No analysis available.".to_string(),
        }
    }
}

/// A previously alerted token as stored in the database.
#[derive(Debug, Clone)]
pub struct SeenToken {
    pub token_address: String,
    pub symbol: String,
    pub name: String,
    pub chain: String,
    pub liquidity_usd: f64,
    pub market_cap: f64,
    pub alerted_at: DateTime<Utc>,
}

/// Subset of a seen token used by the price tracker.
#[derive(Debug, Clone)]
pub struct TrackedToken {
    pub token_address: String,
    pub symbol: String,
    pub name: String,
    pub alert_price: f64,
    pub milestones_hit: String,
}

/// A price milestone crossing on a tracked token.
#[derive(Debug, Clone)]
pub struct MilestoneAlert {
    pub token: TrackedToken,
    pub milestone: &'static str,
    pub is_dump: bool,
    pub current_price: f64,
    pub multiplier: f64,
    pub change_percent: f64,
}
