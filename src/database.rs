// src/database.rs
use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::models::{PairRecord, SeenToken, TrackedToken};

/// Duplicate-tracking store. One table keyed by token address, cleared in
/// full at every midnight tick.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to database: {}", database_url);
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Single connection: the scheduler is the only writer, and one
        // connection keeps `sqlite::memory:` coherent in tests.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Database { pool })
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token_address TEXT UNIQUE NOT NULL,
                symbol TEXT NOT NULL,
                name TEXT NOT NULL,
                chain TEXT NOT NULL,
                liquidity_usd REAL NOT NULL DEFAULT 0,
                market_cap REAL NOT NULL DEFAULT 0,
                alert_price REAL NOT NULL DEFAULT 0,
                milestones_hit TEXT NOT NULL DEFAULT '',
                alerted_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_seen_tokens_address
            ON seen_tokens (token_address)
        "#,
        )
        .execute(&self.pool)
        .await?;

        info!("✅ Database migrations completed");
        Ok(())
    }

    /// True if this token was already alerted since the last reset.
    pub async fn is_seen(&self, token_address: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM seen_tokens WHERE token_address = ?")
            .bind(token_address.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Record a dispatched alert. Idempotent: re-recording the same address
    /// is a no-op.
    pub async fn mark_seen(&self, record: &PairRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO seen_tokens
            (token_address, symbol, name, chain, liquidity_usd, market_cap, alert_price, milestones_hit, alerted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, '', ?)
        "#,
        )
        .bind(record.token_address.to_lowercase())
        .bind(&record.symbol)
        .bind(&record.name)
        .bind(&record.chain)
        .bind(record.liquidity_usd)
        .bind(record.market_cap_usd)
        .bind(record.price_usd)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Daily reset: drop every tracked token.
    pub async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM seen_tokens")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn seen_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM seen_tokens")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Most recently alerted tokens, newest first. Backs the /status command.
    pub async fn recent_tokens(&self, limit: i64) -> Result<Vec<SeenToken>> {
        let rows = sqlx::query(
            r#"
            SELECT token_address, symbol, name, chain, liquidity_usd, market_cap, alerted_at
            FROM seen_tokens
            ORDER BY alerted_at DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut tokens = Vec::new();
        for row in rows {
            tokens.push(SeenToken {
                token_address: row.get("token_address"),
                symbol: row.get("symbol"),
                name: row.get("name"),
                chain: row.get("chain"),
                liquidity_usd: row.get("liquidity_usd"),
                market_cap: row.get("market_cap"),
                alerted_at: row.get::<String, _>("alerted_at").parse()?,
            });
        }

        Ok(tokens)
    }

    /// Tokens with a recorded alert price, for milestone tracking.
    pub async fn tokens_for_price_tracking(&self) -> Result<Vec<TrackedToken>> {
        let rows = sqlx::query(
            r#"
            SELECT token_address, symbol, name, alert_price, milestones_hit
            FROM seen_tokens
            WHERE alert_price > 0
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tokens = Vec::new();
        for row in rows {
            tokens.push(TrackedToken {
                token_address: row.get("token_address"),
                symbol: row.get("symbol"),
                name: row.get("name"),
                alert_price: row.get("alert_price"),
                milestones_hit: row.get("milestones_hit"),
            });
        }

        Ok(tokens)
    }

    /// Append a milestone to a token's hit list, once.
    pub async fn update_milestone(&self, token_address: &str, milestone: &str) -> Result<()> {
        let address = token_address.to_lowercase();

        let row = sqlx::query("SELECT milestones_hit FROM seen_tokens WHERE token_address = ?")
            .bind(&address)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(());
        };

        let current: String = row.get("milestones_hit");
        if current.split(',').any(|m| m == milestone) {
            return Ok(());
        }

        let updated = if current.is_empty() {
            milestone.to_string()
        } else {
            format!("{current},{milestone}")
        };

        sqlx::query("UPDATE seen_tokens SET milestones_hit = ? WHERE token_address = ?")
            .bind(updated)
            .bind(&address)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn record(address: &str) -> PairRecord {
        PairRecord {
            name: "Example Token".to_string(),
            symbol: "EXT".to_string(),
            chain: "solana".to_string(),
            token_address: address.to_string(),
            pair_address: "pair".to_string(),
            liquidity_usd: 150_000.0,
            market_cap_usd: 2_500_000.0,
            fdv_usd: 50_000_000.0,
            buys_24h: 10,
            sells_24h: 8,
            volume_24h_usd: 5_000_000.0,
            price_change_24h: 45.2,
            price_change_6h: 12.3,
            price_usd: 0.05,
            twitter_url: None,
            url: String::new(),
        }
    }

    #[tokio::test]
    async fn mark_seen_is_idempotent() {
        let db = test_db().await;

        db.mark_seen(&record("AbC123")).await.unwrap();
        db.mark_seen(&record("AbC123")).await.unwrap();

        assert!(db.is_seen("AbC123").await.unwrap());
        assert_eq!(db.seen_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let db = test_db().await;

        db.mark_seen(&record("AbC123")).await.unwrap();

        assert!(db.is_seen("abc123").await.unwrap());
        assert!(db.is_seen("ABC123").await.unwrap());
    }

    #[tokio::test]
    async fn clear_all_forgets_everything() {
        let db = test_db().await;

        for i in 0..5 {
            db.mark_seen(&record(&format!("addr{i}"))).await.unwrap();
        }
        assert_eq!(db.seen_count().await.unwrap(), 5);

        let cleared = db.clear_all().await.unwrap();
        assert_eq!(cleared, 5);

        for i in 0..5 {
            assert!(!db.is_seen(&format!("addr{i}")).await.unwrap());
        }
        assert_eq!(db.seen_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unseen_token_is_not_seen() {
        let db = test_db().await;
        assert!(!db.is_seen("never-alerted").await.unwrap());
    }

    #[tokio::test]
    async fn recent_tokens_returns_stored_fields() {
        let db = test_db().await;

        db.mark_seen(&record("addr1")).await.unwrap();

        let recent = db.recent_tokens(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].token_address, "addr1");
        assert_eq!(recent[0].symbol, "EXT");
        assert_eq!(recent[0].liquidity_usd, 150_000.0);
    }

    #[tokio::test]
    async fn milestones_accumulate_without_duplicates() {
        let db = test_db().await;

        db.mark_seen(&record("addr1")).await.unwrap();

        db.update_milestone("addr1", "2x").await.unwrap();
        db.update_milestone("addr1", "2x").await.unwrap();
        db.update_milestone("addr1", "5x").await.unwrap();

        let tracked = db.tokens_for_price_tracking().await.unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].milestones_hit, "2x,5x");
    }

    #[tokio::test]
    async fn zero_price_tokens_are_not_tracked() {
        let db = test_db().await;

        let mut no_price = record("addr1");
        no_price.price_usd = 0.0;
        db.mark_seen(&no_price).await.unwrap();

        assert!(db.tokens_for_price_tracking().await.unwrap().is_empty());
    }
}
