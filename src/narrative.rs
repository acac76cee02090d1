// src/narrative.rs
//
// Web search via DuckDuckGo's HTML endpoint (no API key), then a Groq chat
// completion turns the snippets into a category label and a short summary.

use std::time::Duration;

use log::{info, warn};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::json;

use crate::error::EnrichmentError;
use crate::models::{NarrativeResult, PairRecord};
use crate::utils::format_usd;

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const MAX_SEARCH_RESULTS: usize = 10;
const PROMPT_SNIPPETS: usize = 5;

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const GROQ_MODEL: &str = "llama-3.1-8b-instant";

pub struct NarrativeAnalyzer {
    client: Client,
    api_key: String,
}

#[derive(Debug)]
struct SearchResult {
    title: String,
    snippet: String,
}

impl NarrativeAnalyzer {
    pub fn new(api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    /// Full enrichment pipeline: search, then model call. Callers degrade to
    /// `NarrativeResult::placeholder()` on error; failure here never drops an
    /// alert.
    pub async fn enrich(&self, record: &PairRecord) -> Result<NarrativeResult, EnrichmentError> {
        info!(
            "🔎 Searching mentions of {} ({})...",
            record.symbol, record.name
        );
        let results = self.search_mentions(&record.symbol, &record.name).await?;
        if results.is_empty() {
            return Err(EnrichmentError::NoResults);
        }

        info!("🧠 Analyzing {} with Groq...", record.symbol);
        self.analyze(record, &results).await
    }

    async fn search_mentions(
        &self,
        symbol: &str,
        name: &str,
    ) -> Result<Vec<SearchResult>, EnrichmentError> {
        let query = format!("{symbol} {name} crypto twitter");

        let body = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query.as_str())])
            .send()
            .await
            .map_err(EnrichmentError::Search)?
            .text()
            .await
            .map_err(EnrichmentError::Search)?;

        let results = parse_search_results(&body);
        info!("🔎 Found {} search results", results.len());
        Ok(results)
    }

    async fn analyze(
        &self,
        record: &PairRecord,
        results: &[SearchResult],
    ) -> Result<NarrativeResult, EnrichmentError> {
        let prompt = build_prompt(record, results);

        let request = json!({
            "model": GROQ_MODEL,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 150,
            "temperature": 0.2
        });

        let mut response = self
            .client
            .post(GROQ_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(EnrichmentError::Model)?;

        // One retry on rate limiting.
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Groq rate limited, retrying in 2s...");
            tokio::time::sleep(Duration::from_secs(2)).await;
            response = self
                .client
                .post(GROQ_URL)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(EnrichmentError::Model)?;
        }

        if !response.status().is_success() {
            return Err(EnrichmentError::ModelStatus(response.status()));
        }

        let completion: ChatResponse = response.json().await.map_err(EnrichmentError::Model)?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(EnrichmentError::EmptyCompletion)?;

        Ok(parse_completion(text.trim()))
    }
}

/// Scrape result blocks out of the DuckDuckGo HTML page.
fn parse_search_results(body: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(body);
    let result_selector = Selector::parse(".result").expect("valid selector");
    let title_selector = Selector::parse(".result__a").expect("valid selector");
    let snippet_selector = Selector::parse(".result__snippet").expect("valid selector");

    let mut results = Vec::new();
    for element in document.select(&result_selector).take(MAX_SEARCH_RESULTS) {
        let title = element
            .select(&title_selector)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let snippet = element
            .select(&snippet_selector)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        if title.is_empty() && snippet.is_empty() {
            continue;
        }
        results.push(SearchResult { title, snippet });
    }

    results
}

fn build_prompt(record: &PairRecord, results: &[SearchResult]) -> String {
    let snippets = results
        .iter()
        .take(PROMPT_SNIPPETS)
        .map(|r| format!("- {}: {}", r.title, r.snippet))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze this cryptocurrency token briefly.\n\n\
         Token: {name} (${symbol})\n\
         Chain: {chain}\n\
         Liquidity: {liquidity}\n\
         Market cap: {market_cap}\n\
         24h volume: {volume}\n\
         24h change: {change_24h:+.1}%\n\
         6h change: {change_6h:+.1}%\n\n\
         Search results:\n{snippets}\n\n\
         Answer in this exact format:\n\
         VERDICT: [Product/Meme/Unclear]\n\
         NARRATIVE: [1-2 words: AI, Gaming, DeFi, Meme, Political, etc.]\n\
         SUMMARY: [One sentence about what this token is]",
        name = record.name,
        symbol = record.symbol,
        chain = record.chain,
        liquidity = format_usd(record.liquidity_usd),
        market_cap = format_usd(record.market_cap_usd),
        volume = format_usd(record.volume_24h_usd),
        change_24h = record.price_change_24h,
        change_6h = record.price_change_6h,
        snippets = snippets,
    )
}

/// Pick the VERDICT/NARRATIVE/SUMMARY lines out of the completion. Unmatched
/// fields stay "Unknown"; a completely free-form reply becomes the summary.
fn parse_completion(text: &str) -> NarrativeResult {
    let mut result = NarrativeResult {
        narrative: "Unknown".to_string(),
        verdict: "Unknown".to_string(),
        summary: text.to_string(),
    };

    for line in text.lines() {
        let line = line.trim();

        if let Some(value) = field_value(line, "VERDICT:") {
            result.verdict = value;
        } else if let Some(value) = field_value(line, "NARRATIVE:") {
            result.narrative = value;
        } else if let Some(value) = field_value(line, "SUMMARY:") {
            result.summary = value;
        }
    }

    result
}

fn field_value(line: &str, prefix: &str) -> Option<String> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(line[prefix.len()..].trim().to_string())
    } else {
        None
    }
}

// Groq chat-completions response types.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_completion_parses() {
        let result = parse_completion(
            "VERDICT: Product\nNARRATIVE: AI\nSUMMARY: An agent framework token.",
        );

        assert_eq!(result.verdict, "Product");
        assert_eq!(result.narrative, "AI");
        assert_eq!(result.summary, "An agent framework token.");
    }

    #[test]
    fn line_order_does_not_matter() {
        let result = parse_completion(
            "SUMMARY: A dog-themed meme coin.\nNARRATIVE: Meme\nVERDICT: Meme",
        );

        assert_eq!(result.verdict, "Meme");
        assert_eq!(result.narrative, "Meme");
        assert_eq!(result.summary, "A dog-themed meme coin.");
    }

    #[test]
    fn prefix_matching_is_case_insensitive() {
        let result = parse_completion("verdict: Unclear\nnarrative: Gaming\nsummary: Unclear.");

        assert_eq!(result.verdict, "Unclear");
        assert_eq!(result.narrative, "Gaming");
    }

    #[test]
    fn free_form_reply_becomes_summary() {
        let text = "This token appears to be a gaming project.";
        let result = parse_completion(text);

        assert_eq!(result.narrative, "Unknown");
        assert_eq!(result.verdict, "Unknown");
        assert_eq!(result.summary, text);
    }

    #[test]
    fn placeholder_carries_no_analysis() {
        let placeholder = NarrativeResult::placeholder();

        assert_eq!(placeholder.narrative, "Unknown");
        assert_eq!(placeholder.verdict, "Unknown");
        assert_eq!(placeholder.summary, "No analysis available.");
    }

    #[test]
    fn search_results_parse_from_html() {
        let body = r#"
            <html><body>
              <div class="result">
                <a class="result__a">Example Token launches</a>
                <a class="result__snippet">EXT is a new AI agent token.</a>
              </div>
              <div class="result">
                <a class="result__a">EXT price</a>
                <a class="result__snippet">Chart and liquidity data.</a>
              </div>
              <div class="result"></div>
            </body></html>
        "#;

        let results = parse_search_results(body);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Example Token launches");
        assert_eq!(results[1].snippet, "Chart and liquidity data.");
    }

    #[test]
    fn prompt_contains_numeric_fields_and_snippets() {
        let record = PairRecord {
            name: "Example Token".to_string(),
            symbol: "EXT".to_string(),
            chain: "solana".to_string(),
            token_address: "addr".to_string(),
            pair_address: "pair".to_string(),
            liquidity_usd: 150_000.0,
            market_cap_usd: 2_500_000.0,
            fdv_usd: 50_000_000.0,
            buys_24h: 10,
            sells_24h: 8,
            volume_24h_usd: 5_000_000.0,
            price_change_24h: 45.2,
            price_change_6h: 12.3,
            price_usd: 0.0025,
            twitter_url: None,
            url: String::new(),
        };
        let results = vec![SearchResult {
            title: "Example Token launches".to_string(),
            snippet: "EXT is a new AI agent token.".to_string(),
        }];

        let prompt = build_prompt(&record, &results);
        assert!(prompt.contains("Example Token ($EXT)"));
        assert!(prompt.contains("Liquidity: $150.0K"));
        assert!(prompt.contains("24h change: +45.2%"));
        assert!(prompt.contains("- Example Token launches: EXT is a new AI agent token."));
        assert!(prompt.contains("VERDICT:"));
    }
}
