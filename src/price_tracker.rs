// src/price_tracker.rs
//
// Re-prices previously alerted tokens once per cycle and surfaces milestone
// crossings. Batched requests keep the public API happy.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use reqwest::Client;

use crate::database::Database;
use crate::models::{MilestoneAlert, TrackedToken};
use crate::scanners::dex_screener::PairsResponse;

const MILESTONES: [(&str, f64); 3] = [("2x", 2.0), ("5x", 5.0), ("10x", 10.0)];
const DUMP_MILESTONE: &str = "-50%";
const DUMP_THRESHOLD: f64 = -0.50;

const TOKEN_API_BASE: &str = "https://api.dexscreener.com/latest/dex/tokens";
const BATCH_SIZE: usize = 30;
const BATCH_DELAY: Duration = Duration::from_secs(1);

pub struct PriceTracker {
    client: Client,
}

impl Default for PriceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceTracker {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Check every tracked token and return the milestone alerts to send.
    /// Each milestone fires at most once per token; hits are persisted before
    /// the alert is dispatched.
    pub async fn check_all(&self, db: &Database) -> Result<Vec<MilestoneAlert>> {
        let tokens = db.tokens_for_price_tracking().await?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        info!("💹 Checking price movements on {} tracked tokens", tokens.len());

        let mut alerts = Vec::new();
        for (i, batch) in tokens.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }

            let addresses: Vec<&str> = batch.iter().map(|t| t.token_address.as_str()).collect();
            let prices = self.current_prices(&addresses).await;

            for token in batch {
                let Some(&price) = prices.get(&token.token_address.to_lowercase()) else {
                    continue;
                };
                for alert in check_milestones(token, price) {
                    db.update_milestone(&token.token_address, alert.milestone)
                        .await?;
                    alerts.push(alert);
                }
            }
        }

        if alerts.is_empty() {
            info!("💹 No new milestones hit");
        } else {
            info!("💹 Found {} milestone alert(s)", alerts.len());
        }

        Ok(alerts)
    }

    /// Batch price lookup. Dexscreener can return several pairs per token;
    /// the highest-liquidity pair wins.
    async fn current_prices(&self, addresses: &[&str]) -> HashMap<String, f64> {
        let url = format!("{TOKEN_API_BASE}/{}", addresses.join(","));

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Price batch request failed: {}", e);
                return HashMap::new();
            }
        };

        let parsed: PairsResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Price batch response malformed: {}", e);
                return HashMap::new();
            }
        };

        let mut best: HashMap<String, (f64, f64)> = HashMap::new();
        for pair in parsed.pairs.unwrap_or_default() {
            let address = pair.base_token.address.to_lowercase();
            if address.is_empty() {
                continue;
            }

            let liquidity = pair.liquidity_usd();
            let price = pair.price_usd_value();
            if price <= 0.0 {
                continue;
            }

            let entry = best.entry(address).or_insert((liquidity, price));
            if liquidity > entry.0 {
                *entry = (liquidity, price);
            }
        }

        best.into_iter().map(|(a, (_, price))| (a, price)).collect()
    }
}

/// Pure milestone evaluation against a known current price.
pub fn check_milestones(token: &TrackedToken, current_price: f64) -> Vec<MilestoneAlert> {
    let mut alerts = Vec::new();

    if token.alert_price <= 0.0 || current_price <= 0.0 {
        return alerts;
    }

    let multiplier = current_price / token.alert_price;
    let change = (current_price - token.alert_price) / token.alert_price;
    let already_hit =
        |milestone: &str| token.milestones_hit.split(',').any(|m| m == milestone);

    for (milestone, threshold) in MILESTONES {
        if multiplier >= threshold && !already_hit(milestone) {
            alerts.push(MilestoneAlert {
                token: token.clone(),
                milestone,
                is_dump: false,
                current_price,
                multiplier,
                change_percent: change * 100.0,
            });
        }
    }

    if change <= DUMP_THRESHOLD && !already_hit(DUMP_MILESTONE) {
        alerts.push(MilestoneAlert {
            token: token.clone(),
            milestone: DUMP_MILESTONE,
            is_dump: true,
            current_price,
            multiplier,
            change_percent: change * 100.0,
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(alert_price: f64, milestones_hit: &str) -> TrackedToken {
        TrackedToken {
            token_address: "addr".to_string(),
            symbol: "EXT".to_string(),
            name: "Example Token".to_string(),
            alert_price,
            milestones_hit: milestones_hit.to_string(),
        }
    }

    #[test]
    fn crossing_a_milestone_fires_once() {
        let token = tracked(0.01, "");
        let alerts = check_milestones(&token, 0.025);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].milestone, "2x");
        assert!(!alerts[0].is_dump);
        assert!((alerts[0].multiplier - 2.5).abs() < 1e-9);
    }

    #[test]
    fn a_big_jump_fires_every_unhit_milestone() {
        let token = tracked(0.01, "2x");
        let alerts = check_milestones(&token, 0.12);

        let milestones: Vec<&str> = alerts.iter().map(|a| a.milestone).collect();
        assert_eq!(milestones, vec!["5x", "10x"]);
    }

    #[test]
    fn already_hit_milestones_stay_silent() {
        let token = tracked(0.01, "2x,5x,10x");
        assert!(check_milestones(&token, 0.5).is_empty());
    }

    #[test]
    fn dump_threshold_fires_at_half_price() {
        let token = tracked(0.01, "");
        let alerts = check_milestones(&token, 0.005);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].milestone, "-50%");
        assert!(alerts[0].is_dump);
    }

    #[test]
    fn small_moves_fire_nothing() {
        let token = tracked(0.01, "");
        assert!(check_milestones(&token, 0.015).is_empty());
        assert!(check_milestones(&token, 0.008).is_empty());
    }

    #[test]
    fn zero_prices_are_ignored() {
        assert!(check_milestones(&tracked(0.0, ""), 0.05).is_empty());
        assert!(check_milestones(&tracked(0.01, ""), 0.0).is_empty());
    }
}
