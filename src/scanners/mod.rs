// src/scanners/mod.rs
pub mod dex_screener;

pub use dex_screener::DexScreenerScraper;
