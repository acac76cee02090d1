// src/error.rs
use thiserror::Error;

/// Startup configuration failures. The only error class that terminates the
/// process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Failures while driving the listing page or hydrating pair details.
/// Caught per cycle; the scheduler skips to the next tick.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser session failed: {0}")]
    Browser(String),
    #[error("listing page failed to load: {0}")]
    PageLoad(String),
    #[error("no pair rows found on listing page")]
    NoRows,
    #[error("pair details request failed: {0}")]
    Api(#[from] reqwest::Error),
}

/// Failures in the search or model stage of enrichment. The alert is still
/// sent with a placeholder narrative.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("web search failed: {0}")]
    Search(#[source] reqwest::Error),
    #[error("web search returned no results")]
    NoResults,
    #[error("model call failed: {0}")]
    Model(#[source] reqwest::Error),
    #[error("model returned status {0}")]
    ModelStatus(reqwest::StatusCode),
    #[error("model response contained no completion text")]
    EmptyCompletion,
}

/// Telegram delivery failures. Logged; the pair is not recorded so a later
/// scrape of the same pair can retry.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("telegram send failed: {0}")]
    Send(#[from] teloxide::RequestError),
}
