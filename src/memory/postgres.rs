//! Postgres-backed memory store
//!
//! Tables are created lazily on first use. Turns keep insertion order via a
//! serial column; snapshots are upserted per user.

use crate::error::AdvisorError;
use crate::memory::store::MemoryStore;
use crate::models::{ConversationTurn, MemoryContext, PortfolioSnapshot};
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

pub struct PostgresMemoryStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresMemoryStore {
    /// Create a store over a lazily-connecting pool. No connection is made
    /// until the first query.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                AdvisorError::DatabaseError(format!("Failed to configure postgres pool: {}", e))
            })?;

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS advisor_turns (
                      seq BIGSERIAL PRIMARY KEY,
                      turn_id UUID NOT NULL,
                      user_id TEXT NOT NULL,
                      input_text TEXT NOT NULL,
                      output_text TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_advisor_turns_user_seq
                    ON advisor_turns (user_id, seq);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS advisor_portfolios (
                      user_id TEXT PRIMARY KEY,
                      stocks JSONB NOT NULL,
                      digest TEXT NOT NULL,
                      last_updated TIMESTAMPTZ NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AdvisorError::DatabaseError(format!(
                    "Failed to initialize advisor memory schema: {}",
                    e
                ))
            })?;

        Ok(())
    }

    async fn fetch_portfolio(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>> {
        let row = sqlx::query(
            "SELECT stocks, digest, last_updated FROM advisor_portfolios WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AdvisorError::DatabaseError(format!("Failed to load portfolio snapshot: {}", e))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stocks: Value = row.try_get("stocks")?;
        let last_updated: DateTime<Utc> = row.try_get("last_updated")?;

        Ok(Some(PortfolioSnapshot {
            user_id: user_id.to_string(),
            stocks,
            last_updated,
            digest: row.try_get("digest")?,
        }))
    }
}

#[async_trait::async_trait]
impl MemoryStore for PostgresMemoryStore {
    async fn save(
        &self,
        user_id: &str,
        input_text: &str,
        output_text: &str,
        extra: Option<&Value>,
    ) -> Result<()> {
        self.ensure_schema().await?;

        let turn = ConversationTurn::new(user_id, input_text, output_text);
        let snapshot = extra.and_then(|payload| PortfolioSnapshot::from_payload(user_id, payload));

        let mut tx = self.pool.begin().await.map_err(|e| {
            AdvisorError::DatabaseError(format!("Failed to begin memory transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO advisor_turns (turn_id, user_id, input_text, output_text, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(turn.turn_id)
        .bind(&turn.user_id)
        .bind(&turn.input_text)
        .bind(&turn.output_text)
        .bind(turn.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| AdvisorError::DatabaseError(format!("Failed to insert turn: {}", e)))?;

        if let Some(snapshot) = snapshot {
            sqlx::query(
                r#"
                INSERT INTO advisor_portfolios (user_id, stocks, digest, last_updated)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id)
                DO UPDATE SET stocks = EXCLUDED.stocks,
                              digest = EXCLUDED.digest,
                              last_updated = EXCLUDED.last_updated
                "#,
            )
            .bind(user_id)
            .bind(&snapshot.stocks)
            .bind(&snapshot.digest)
            .bind(snapshot.last_updated)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AdvisorError::DatabaseError(format!("Failed to upsert portfolio snapshot: {}", e))
            })?;

            debug!(user_id = %user_id, digest = %snapshot.digest, "Portfolio snapshot replaced");
        }

        tx.commit().await.map_err(|e| {
            AdvisorError::DatabaseError(format!("Failed to commit memory transaction: {}", e))
        })?;

        Ok(())
    }

    async fn load(&self, user_id: &str) -> Result<MemoryContext> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT turn_id, input_text, output_text, created_at
            FROM advisor_turns
            WHERE user_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AdvisorError::DatabaseError(format!("Failed to load turns: {}", e)))?;

        let turns = rows
            .into_iter()
            .map(|row| ConversationTurn {
                turn_id: row.try_get("turn_id").unwrap_or_else(|_| Uuid::new_v4()),
                user_id: user_id.to_string(),
                input_text: row.try_get("input_text").unwrap_or_default(),
                output_text: row.try_get("output_text").unwrap_or_default(),
                timestamp: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
            })
            .collect();

        let portfolio = self.fetch_portfolio(user_id).await?;

        Ok(MemoryContext { turns, portfolio })
    }

    async fn get_portfolio(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>> {
        self.ensure_schema().await?;
        self.fetch_portfolio(user_id).await
    }
}
