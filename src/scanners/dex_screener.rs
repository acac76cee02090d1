// src/scanners/dex_screener.rs
//
// Two-step scrape: headless Chrome renders the filtered new-pairs listing to
// collect pair addresses, then the public pairs API fills in the numbers the
// table does not expose.

use std::thread;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::error::ScrapeError;
use crate::models::PairRecord;

/// Dexscreener new-pairs view with the alert thresholds encoded in the query.
const LISTING_URL: &str = "https://dexscreener.com/new-pairs?rankBy=pairAge&order=asc\
&minLiq=60000\
&minMarketCap=300000\
&maxFdv=10000000000\
&min24HBuys=2\
&min24HSells=2\
&min24HVol=2000000\
&min24HChg=20\
&min6HChg=5\
&profile=1";

const PAIR_API_BASE: &str = "https://api.dexscreener.com/latest/dex/pairs";

const ROW_SELECTOR: &str = "a.ds-dex-table-row";

/// Pulls href, symbol and name out of every rendered table row in one pass.
const ROW_EXTRACT_JS: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('a.ds-dex-table-row')).map(function (row) {
    var symbol = row.querySelector('.ds-dex-table-row-base-token-symbol');
    var name = row.querySelector('.ds-dex-table-row-base-token-name');
    return {
        href: row.getAttribute('href') || '',
        symbol: symbol ? symbol.textContent : '',
        name: name ? name.textContent : ''
    };
}))
"#;

pub struct DexScreenerScraper {
    client: Client,
}

impl Default for DexScreenerScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl DexScreenerScraper {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Scrape the listing page and hydrate every row into a full record.
    pub async fn fetch_new_pairs(&self) -> Result<Vec<PairRecord>, ScrapeError> {
        info!("🌐 Opening Dexscreener listing page...");

        let rows = tokio::task::spawn_blocking(scrape_listing_rows)
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))??;

        info!("🎯 Extracted {} pair rows, fetching details...", rows.len());

        let mut records = Vec::new();
        for row in rows {
            let pair = match self.fetch_pair_details(&row.chain, &row.pair_address).await? {
                Some(pair) => pair,
                None => continue,
            };

            let record = into_record(&row, &pair);
            info!(
                "✓ {}: Liq=${:.0}, Vol=${:.0}, 24h={:+.0}%",
                record.symbol, record.liquidity_usd, record.volume_24h_usd, record.price_change_24h
            );
            records.push(record);
        }

        Ok(records)
    }

    async fn fetch_pair_details(
        &self,
        chain: &str,
        pair_address: &str,
    ) -> Result<Option<DexPair>, ScrapeError> {
        let url = format!("{PAIR_API_BASE}/{chain}/{pair_address}");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!(
                "Pair details request for {} returned {}",
                pair_address,
                response.status()
            );
            return Ok(None);
        }

        let parsed: PairsResponse = response.json().await?;
        Ok(parsed.pairs.and_then(|pairs| pairs.into_iter().next()))
    }
}

/// One row of the rendered listing table.
#[derive(Debug, Deserialize)]
struct RawRow {
    href: String,
    symbol: String,
    name: String,
}

#[derive(Debug)]
struct ListingRow {
    chain: String,
    pair_address: String,
    symbol: String,
    name: String,
}

/// Blocking: drives a Chrome session against the listing page. Always called
/// through `spawn_blocking`.
fn scrape_listing_rows() -> Result<Vec<ListingRow>, ScrapeError> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .window_size(Some((1920, 1080)))
        .build()
        .map_err(|e| ScrapeError::Browser(e.to_string()))?;

    let browser = Browser::new(options).map_err(|e| ScrapeError::Browser(e.to_string()))?;
    let tab = browser
        .new_tab()
        .map_err(|e| ScrapeError::Browser(e.to_string()))?;

    tab.navigate_to(LISTING_URL)
        .map_err(|e| ScrapeError::PageLoad(e.to_string()))?;
    tab.wait_until_navigated()
        .map_err(|e| ScrapeError::PageLoad(e.to_string()))?;

    if let Err(e) = tab.wait_for_element_with_custom_timeout(ROW_SELECTOR, Duration::from_secs(10))
    {
        warn!("Table rows not present after page load: {}", e);
    }

    // Rows below the fold are lazy-loaded; scroll through twice so the full
    // result set is in the DOM.
    for _ in 0..6 {
        let _ = tab.evaluate("window.scrollBy(0, 1000);", false);
        thread::sleep(Duration::from_millis(800));
    }
    let _ = tab.evaluate("window.scrollTo(0, 0);", false);
    thread::sleep(Duration::from_millis(500));
    for _ in 0..6 {
        let _ = tab.evaluate("window.scrollBy(0, 1000);", false);
        thread::sleep(Duration::from_millis(500));
    }

    let extracted = tab
        .evaluate(ROW_EXTRACT_JS, false)
        .map_err(|e| ScrapeError::PageLoad(e.to_string()))?;

    let raw = match extracted.value {
        Some(serde_json::Value::String(json)) => json,
        _ => return Err(ScrapeError::NoRows),
    };

    let raw_rows: Vec<RawRow> = serde_json::from_str(&raw).map_err(|_| ScrapeError::NoRows)?;

    let mut rows = Vec::new();
    for raw_row in raw_rows {
        let Some((chain, pair_address)) = parse_pair_href(&raw_row.href) else {
            continue;
        };
        rows.push(ListingRow {
            chain,
            pair_address,
            symbol: raw_row.symbol.trim().to_string(),
            name: raw_row.name.trim().to_string(),
        });
    }

    if rows.is_empty() {
        return Err(ScrapeError::NoRows);
    }

    Ok(rows)
}

/// Parse a row href of the shape `/{chain}/{pairAddress}` (absolute or
/// relative, optional query string).
fn parse_pair_href(href: &str) -> Option<(String, String)> {
    let path = href
        .trim()
        .trim_start_matches("https://dexscreener.com")
        .trim_start_matches('/');

    let mut parts = path.splitn(2, '/');
    let chain = parts.next()?.trim();
    let pair = parts.next()?.split(['?', '#']).next()?.trim();

    if chain.is_empty() || pair.is_empty() {
        return None;
    }

    Some((chain.to_string(), pair.to_string()))
}

fn into_record(row: &ListingRow, pair: &DexPair) -> PairRecord {
    let chain = pair
        .chain_id
        .clone()
        .unwrap_or_else(|| row.chain.clone())
        .to_lowercase();

    let name = pair
        .base_token
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            if row.name.is_empty() {
                "Unknown".to_string()
            } else {
                row.name.clone()
            }
        });

    let symbol = pair
        .base_token
        .symbol
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            if row.symbol.is_empty() {
                "???".to_string()
            } else {
                row.symbol.clone()
            }
        });

    PairRecord {
        name,
        symbol,
        url: format!("https://dexscreener.com/{}/{}", chain, row.pair_address),
        chain,
        token_address: pair.base_token.address.clone(),
        pair_address: row.pair_address.clone(),
        liquidity_usd: pair.liquidity_usd(),
        market_cap_usd: pair.market_cap.or(pair.fdv).unwrap_or(0.0),
        fdv_usd: pair.fdv.or(pair.market_cap).unwrap_or(0.0),
        buys_24h: pair.buys_24h(),
        sells_24h: pair.sells_24h(),
        volume_24h_usd: pair.volume.as_ref().and_then(|v| v.h24).unwrap_or(0.0),
        price_change_24h: pair.price_change.as_ref().and_then(|c| c.h24).unwrap_or(0.0),
        price_change_6h: pair.price_change.as_ref().and_then(|c| c.h6).unwrap_or(0.0),
        price_usd: pair.price_usd_value(),
        twitter_url: twitter_from_pair(pair),
    }
}

/// Prefer an explicit Twitter link; fall back to the first social the
/// listing carries (the profile filter already required one).
fn twitter_from_pair(pair: &DexPair) -> Option<String> {
    let socials = pair.info.as_ref()?.socials.as_deref()?;

    socials
        .iter()
        .find(|s| s.kind.as_deref() == Some("twitter"))
        .or_else(|| socials.first())
        .and_then(|s| s.url.clone())
        .filter(|url| !url.is_empty())
}

// Dexscreener API response types.
#[derive(Debug, Deserialize)]
pub(crate) struct PairsResponse {
    pub(crate) pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DexPair {
    pub(crate) chain_id: Option<String>,
    pub(crate) base_token: BaseToken,
    // priceUsd comes over the wire as a string
    pub(crate) price_usd: Option<String>,
    pub(crate) market_cap: Option<f64>,
    pub(crate) fdv: Option<f64>,
    pub(crate) liquidity: Option<Liquidity>,
    pub(crate) volume: Option<Volume>,
    pub(crate) price_change: Option<PriceChange>,
    pub(crate) txns: Option<Txns>,
    pub(crate) info: Option<PairInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BaseToken {
    pub(crate) address: String,
    pub(crate) name: Option<String>,
    pub(crate) symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Liquidity {
    pub(crate) usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Volume {
    pub(crate) h24: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PriceChange {
    pub(crate) h24: Option<f64>,
    pub(crate) h6: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Txns {
    pub(crate) h24: Option<TxnWindow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TxnWindow {
    pub(crate) buys: Option<u64>,
    pub(crate) sells: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PairInfo {
    pub(crate) socials: Option<Vec<SocialLink>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SocialLink {
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
    pub(crate) url: Option<String>,
}

impl DexPair {
    pub(crate) fn price_usd_value(&self) -> f64 {
        self.price_usd
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0.0)
    }

    pub(crate) fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    fn buys_24h(&self) -> u64 {
        self.txns
            .as_ref()
            .and_then(|t| t.h24.as_ref())
            .and_then(|w| w.buys)
            .unwrap_or(0)
    }

    fn sells_24h(&self) -> u64 {
        self.txns
            .as_ref()
            .and_then(|t| t.h24.as_ref())
            .and_then(|w| w.sells)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAIR: &str = r#"{
        "chainId": "solana",
        "baseToken": {"address": "ExT111", "name": "Example Token", "symbol": "EXT"},
        "priceUsd": "0.0025",
        "marketCap": 2500000,
        "fdv": 50000000,
        "liquidity": {"usd": 150000},
        "volume": {"h24": 5000000, "h6": 900000},
        "priceChange": {"h24": 45.2, "h6": 12.3},
        "txns": {"h24": {"buys": 10, "sells": 8}},
        "info": {"socials": [
            {"type": "telegram", "url": "https://t.me/example"},
            {"type": "twitter", "url": "https://x.com/example"}
        ]}
    }"#;

    fn sample_row() -> ListingRow {
        ListingRow {
            chain: "solana".to_string(),
            pair_address: "PaIr111".to_string(),
            symbol: "EXT".to_string(),
            name: "Example Token".to_string(),
        }
    }

    #[test]
    fn href_parsing_handles_absolute_and_relative() {
        assert_eq!(
            parse_pair_href("/solana/PaIr111"),
            Some(("solana".to_string(), "PaIr111".to_string()))
        );
        assert_eq!(
            parse_pair_href("https://dexscreener.com/ethereum/0xabc?embed=1"),
            Some(("ethereum".to_string(), "0xabc".to_string()))
        );
        assert_eq!(parse_pair_href("/solana"), None);
        assert_eq!(parse_pair_href(""), None);
    }

    #[test]
    fn pair_details_deserialize() {
        let pair: DexPair = serde_json::from_str(SAMPLE_PAIR).unwrap();

        assert_eq!(pair.price_usd_value(), 0.0025);
        assert_eq!(pair.liquidity_usd(), 150_000.0);
        assert_eq!(pair.buys_24h(), 10);
        assert_eq!(pair.sells_24h(), 8);
    }

    #[test]
    fn record_conversion_fills_every_field() {
        let pair: DexPair = serde_json::from_str(SAMPLE_PAIR).unwrap();
        let record = into_record(&sample_row(), &pair);

        assert_eq!(record.token_address, "ExT111");
        assert_eq!(record.market_cap_usd, 2_500_000.0);
        assert_eq!(record.fdv_usd, 50_000_000.0);
        assert_eq!(record.volume_24h_usd, 5_000_000.0);
        assert_eq!(record.price_change_6h, 12.3);
        assert_eq!(record.url, "https://dexscreener.com/solana/PaIr111");
        assert_eq!(
            record.twitter_url.as_deref(),
            Some("https://x.com/example")
        );
    }

    #[test]
    fn twitter_falls_back_to_first_social() {
        let mut pair: DexPair = serde_json::from_str(SAMPLE_PAIR).unwrap();
        if let Some(info) = pair.info.as_mut() {
            if let Some(socials) = info.socials.as_mut() {
                socials.retain(|s| s.kind.as_deref() != Some("twitter"));
            }
        }

        assert_eq!(
            twitter_from_pair(&pair).as_deref(),
            Some("https://t.me/example")
        );
    }

    #[test]
    fn missing_socials_yield_no_link() {
        let mut pair: DexPair = serde_json::from_str(SAMPLE_PAIR).unwrap();
        pair.info = None;

        assert_eq!(twitter_from_pair(&pair), None);
    }

    #[test]
    fn market_cap_falls_back_to_fdv() {
        let mut pair: DexPair = serde_json::from_str(SAMPLE_PAIR).unwrap();
        pair.market_cap = None;
        let record = into_record(&sample_row(), &pair);

        assert_eq!(record.market_cap_usd, 50_000_000.0);
    }
}
