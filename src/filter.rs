// src/filter.rs
use crate::models::PairRecord;

/// Thresholds a pair must clear before it is worth an alert. The listing page
/// URL encodes the same values, so this is also the backstop against stale or
/// partially rendered page state.
#[derive(Debug, Clone)]
pub struct FilterCriteria {
    pub min_liquidity_usd: f64,
    pub min_market_cap_usd: f64,
    pub max_fdv_usd: f64,
    pub min_buys_24h: u64,
    pub min_sells_24h: u64,
    pub min_volume_24h_usd: f64,
    pub min_change_24h_pct: f64,
    pub min_change_6h_pct: f64,
    pub require_social: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_liquidity_usd: 60_000.0,
            min_market_cap_usd: 300_000.0,
            max_fdv_usd: 10_000_000_000.0,
            min_buys_24h: 2,
            min_sells_24h: 2,
            min_volume_24h_usd: 2_000_000.0,
            min_change_24h_pct: 20.0,
            min_change_6h_pct: 5.0,
            require_social: true,
        }
    }
}

/// All bounds are inclusive and combined with logical AND.
pub fn passes(record: &PairRecord, criteria: &FilterCriteria) -> bool {
    record.liquidity_usd >= criteria.min_liquidity_usd
        && record.market_cap_usd >= criteria.min_market_cap_usd
        && record.fdv_usd <= criteria.max_fdv_usd
        && record.buys_24h >= criteria.min_buys_24h
        && record.sells_24h >= criteria.min_sells_24h
        && record.volume_24h_usd >= criteria.min_volume_24h_usd
        && record.price_change_24h >= criteria.min_change_24h_pct
        && record.price_change_6h >= criteria.min_change_6h_pct
        && (!criteria.require_social || record.twitter_url.is_some())
}
