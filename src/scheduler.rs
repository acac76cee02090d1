// src/scheduler.rs
//
// Wall-clock scheduler: one scrape-filter-enrich-alert cycle at each fixed
// UTC boundary, with a full store reset at the midnight tick.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::config::Config;
use crate::database::Database;
use crate::filter::{self, FilterCriteria};
use crate::models::NarrativeResult;
use crate::narrative::NarrativeAnalyzer;
use crate::price_tracker::PriceTracker;
use crate::scanners::DexScreenerScraper;
use crate::telegram::TelegramBot;

/// Cycle boundaries, UTC.
pub const POLL_HOURS: [u32; 6] = [0, 4, 8, 12, 16, 20];

/// Pause between consecutive alerts within a cycle.
const ALERT_PACING: Duration = Duration::from_secs(5);
const MILESTONE_PACING: Duration = Duration::from_secs(1);

pub struct Scheduler {
    db: Database,
    scraper: DexScreenerScraper,
    analyzer: NarrativeAnalyzer,
    price_tracker: PriceTracker,
    telegram: TelegramBot,
    criteria: FilterCriteria,
}

impl Scheduler {
    pub fn new(config: &Config, db: Database, telegram: TelegramBot) -> Self {
        Self {
            db,
            scraper: DexScreenerScraper::new(),
            analyzer: NarrativeAnalyzer::new(&config.groq_api_key),
            price_tracker: PriceTracker::new(),
            telegram,
            criteria: FilterCriteria::default(),
        }
    }

    pub async fn run(self) {
        info!("⏰ Poll times (UTC): {:?}", POLL_HOURS);
        info!(
            "🎯 Filters: minLiq=${:.0}, minMcap=${:.0}, min24hVol=${:.0}, min24hChg={}%, min6hChg={}%",
            self.criteria.min_liquidity_usd,
            self.criteria.min_market_cap_usd,
            self.criteria.min_volume_24h_usd,
            self.criteria.min_change_24h_pct,
            self.criteria.min_change_6h_pct
        );

        if let Err(e) = self.telegram.send_startup_message().await {
            warn!("Failed to send startup message: {}", e);
        }

        // Initial check right away; scheduled ticks follow.
        self.run_cycle(false).await;

        loop {
            let next = next_poll_time(Utc::now());
            let wait = (next - Utc::now())
                .to_std()
                .unwrap_or(Duration::from_secs(0));
            info!(
                "⏳ Next check at {} (in {:.1} minutes)",
                next.format("%Y-%m-%d %H:%M:%S"),
                wait.as_secs_f64() / 60.0
            );

            sleep(wait).await;

            // The midnight tick clears the store before scraping.
            self.run_cycle(next.hour() == 0).await;
        }
    }

    /// One Idle -> Running -> Idle transition. Every failure is caught here;
    /// nothing below this function takes the process down.
    async fn run_cycle(&self, reset_store: bool) {
        info!("{}", "=".repeat(40));
        info!("🔄 Starting check at {}", Utc::now().format("%H:%M:%S"));

        if reset_store {
            match self.db.clear_all().await {
                Ok(cleared) => info!("🌙 Midnight reset: cleared {} tracked tokens", cleared),
                Err(e) => error!("❌ Midnight reset failed: {}", e),
            }
        }

        if let Err(e) = self.cycle().await {
            error!("❌ Cycle failed: {:#}", e);
        }
    }

    async fn cycle(&self) -> Result<()> {
        let pairs = match self.scraper.fetch_new_pairs().await {
            Ok(pairs) => pairs,
            Err(e) => {
                error!("❌ Scrape failed, skipping cycle: {}", e);
                return Ok(());
            }
        };

        let mut alerted = 0usize;
        let mut already_seen = 0usize;

        for pair in &pairs {
            if self.db.is_seen(&pair.token_address).await? {
                already_seen += 1;
                continue;
            }

            if !filter::passes(pair, &self.criteria) {
                debug!("Filtered out {} ({})", pair.symbol, pair.token_address);
                continue;
            }

            let narrative = match self.analyzer.enrich(pair).await {
                Ok(narrative) => narrative,
                Err(e) => {
                    // Enrichment failure never suppresses the alert.
                    warn!(
                        "⚠️ Enrichment failed for {} ({}): {}",
                        pair.symbol, pair.token_address, e
                    );
                    NarrativeResult::placeholder()
                }
            };

            match self.telegram.send_alert(pair, &narrative).await {
                Ok(()) => {
                    // Recorded only after a successful send, so a failed
                    // dispatch can retry when the pair is scraped again.
                    self.db.mark_seen(pair).await?;
                    alerted += 1;
                }
                Err(e) => {
                    error!(
                        "❌ Dispatch failed for {} ({}): {}",
                        pair.symbol, pair.token_address, e
                    );
                }
            }

            sleep(ALERT_PACING).await;
        }

        info!(
            "✅ Cycle done: {} scraped, {} already seen, {} alerted",
            pairs.len(),
            already_seen,
            alerted
        );

        self.check_price_movements().await;

        let total = self.db.seen_count().await?;
        info!("💾 Total tokens in database: {}", total);

        Ok(())
    }

    async fn check_price_movements(&self) {
        let alerts = match self.price_tracker.check_all(&self.db).await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!("❌ Price tracking failed: {}", e);
                return;
            }
        };

        for alert in alerts {
            if let Err(e) = self.telegram.send_milestone_alert(&alert).await {
                error!(
                    "❌ Milestone dispatch failed for {}: {}",
                    alert.token.symbol, e
                );
            }
            sleep(MILESTONE_PACING).await;
        }
    }
}

/// Earliest poll boundary strictly after `now`.
pub fn next_poll_time(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();

    for &hour in POLL_HOURS.iter() {
        if let Some(at) = today.and_hms_opt(hour, 0, 0) {
            let candidate = Utc.from_utc_datetime(&at);
            if candidate > now {
                return candidate;
            }
        }
    }

    // Wrapped past the last slot; the first slot tomorrow is midnight.
    let tomorrow = today + chrono::Duration::days(1);
    Utc.from_utc_datetime(&tomorrow.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, h, m, s).unwrap()
    }

    #[test]
    fn mid_window_waits_for_next_boundary() {
        assert_eq!(next_poll_time(at(13, 30, 0)), at(16, 0, 0));
        assert_eq!(next_poll_time(at(0, 0, 1)), at(4, 0, 0));
    }

    #[test]
    fn exactly_on_a_boundary_targets_the_following_slot() {
        assert_eq!(next_poll_time(at(8, 0, 0)), at(12, 0, 0));
    }

    #[test]
    fn late_evening_wraps_to_midnight() {
        let next = next_poll_time(at(23, 59, 59));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap());
        assert_eq!(next.hour(), 0);
    }

    #[test]
    fn boundaries_land_exactly_on_the_hour() {
        let next = next_poll_time(at(3, 59, 59));
        assert_eq!((next.hour(), next.minute(), next.second()), (4, 0, 0));
    }
}
