//! PostgreSQL transaction store.
//!
//! Reads and patches the ledger indexer's `transactions` table in place.
//! Uses `sqlx` with connection pooling.
//!
//! # Feature Flag
//! Requires the `postgres` feature:
//! ```toml
//! ibcdecode-storage = { version = "0.2", features = ["postgres"] }
//! ```
//!
//! # Schema
//! The table is owned by the ledger indexer; this backend never creates it.
//! Expected columns:
//! - `"blockHeight"`: integer block height
//! - `"txHash"`: transaction hash
//! - `"txData"`: JSONB with `data.sections` and `data.content` arrays

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use ibcdecode_core::error::PipelineError;
use ibcdecode_core::store::{CandidateQuery, RowStream, TransactionStore};
use ibcdecode_core::types::TransactionRow;

// ─── SQL ──────────────────────────────────────────────────────────────────────

const SELECT_COLUMNS: &str = r#"
    "blockHeight"::BIGINT         AS block_height,
    "txHash"                      AS tx_hash,
    "txData"->'data'->'sections'  AS sections,
    "txData"->'data'->'content'   AS content
"#;

/// `$1` = content type, `$2` = decoder version.
/// `IS DISTINCT FROM` so a missing stamp counts as undecoded.
const CANDIDATES_SQL: &str = r#"
    SELECT "blockHeight"::BIGINT         AS block_height,
           "txHash"                      AS tx_hash,
           "txData"->'data'->'sections'  AS sections,
           "txData"->'data'->'content'   AS content
    FROM transactions
    WHERE EXISTS (
        SELECT 1
        FROM jsonb_path_query("txData", '$.data.content[*]') AS c(entry)
        WHERE entry->>'type' = $1
          AND (entry->'data'->>'decoderVersion') IS DISTINCT FROM $2
    )
    ORDER BY "blockHeight" DESC
"#;

fn by_hash_sql() -> String {
    format!(r#"SELECT {SELECT_COLUMNS} FROM transactions WHERE "txHash" = $1"#)
}

/// `$2` = path of `content[i].data`, `$3` = patch. Drops a stale
/// `decoded`/`error` before merging; other keys are kept.
const MERGED_SLOT: &str = r#"
    (CASE WHEN jsonb_typeof("txData" #> $2::text[]) = 'object'
          THEN ("txData" #> $2::text[]) - 'decoded' - 'error'
          ELSE '{}'::jsonb
     END) || $3::jsonb
"#;

fn preview_sql() -> String {
    format!(r#"SELECT {MERGED_SLOT} AS data FROM transactions WHERE "txHash" = $1"#)
}

fn merge_sql() -> String {
    format!(
        r#"UPDATE transactions
           SET "txData" = jsonb_set("txData", $2::text[], {MERGED_SLOT})
           WHERE "txHash" = $1"#
    )
}

fn slot_path(index: usize) -> Vec<String> {
    vec![
        "data".to_string(),
        "content".to_string(),
        index.to_string(),
        "data".to_string(),
    ]
}

fn storage(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Storage(e.to_string())
}

fn row_from_pg(row: &PgRow) -> Result<TransactionRow, PipelineError> {
    let block_height: i64 = row.try_get("block_height").map_err(storage)?;
    let tx_hash: String = row.try_get("tx_hash").map_err(storage)?;
    let sections: Option<Value> = row.try_get("sections").map_err(storage)?;
    let content: Option<Value> = row.try_get("content").map_err(storage)?;

    TransactionRow::from_json_parts(block_height.max(0) as u64, tx_hash, sections, content)
}

// ─── Connection options ───────────────────────────────────────────────────────

/// Connection options for the Postgres backend.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of connections in the pool (default: 5).
    /// The candidate stream holds one while write-back uses another.
    pub max_connections: u32,
    /// Minimum number of idle connections to keep open (default: 1)
    pub min_connections: u32,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

// ─── PostgresTransactionStore ─────────────────────────────────────────────────

/// PostgreSQL-backed transaction store.
///
/// Cheaply cloneable: wraps a connection pool internally.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    /// Connect with default pool options.
    ///
    /// The URL format follows libpq convention:
    /// `postgresql://[user[:password]@][host][:port][/dbname]`
    pub async fn connect(database_url: &str) -> Result<Self, PipelineError> {
        Self::connect_with_options(database_url, PostgresOptions::default()).await
    }

    /// Connect with custom pool options.
    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, PipelineError> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections.max(2))
            .min_connections(opts.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| PipelineError::Storage(format!("postgres connect: {e}")))?;

        info!(max_connections = opts.max_connections, "PostgresTransactionStore connected");
        Ok(Self { pool })
    }

    /// Wrap an existing pool. The caller keeps ownership of its lifecycle.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool (for custom queries).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    fn stream_candidates<'a>(&'a self, query: &'a CandidateQuery) -> RowStream<'a> {
        debug!(
            content_type = %query.content_type,
            decoder_version = %query.decoder_version,
            "querying undecoded transactions"
        );
        sqlx::query(CANDIDATES_SQL)
            .bind(query.content_type.clone())
            .bind(query.decoder_version.clone())
            .fetch(&self.pool)
            .map(|result| result.map_err(storage).and_then(|row| row_from_pg(&row)))
            .boxed()
    }

    async fn fetch_transaction(&self, tx_hash: &str) -> Result<TransactionRow, PipelineError> {
        let rows = sqlx::query(&by_hash_sql())
            .bind(tx_hash)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        match rows.as_slice() {
            [] => Err(PipelineError::RowNotFound {
                tx_hash: tx_hash.to_string(),
            }),
            [row] => row_from_pg(row),
            _ => Err(PipelineError::AmbiguousRow {
                tx_hash: tx_hash.to_string(),
                count: rows.len() as u64,
            }),
        }
    }

    async fn preview_content_data(
        &self,
        tx_hash: &str,
        index: usize,
        patch: &Value,
    ) -> Result<Value, PipelineError> {
        let rows = sqlx::query(&preview_sql())
            .bind(tx_hash)
            .bind(slot_path(index))
            .bind(patch.clone())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        match rows.as_slice() {
            [] => Err(PipelineError::RowNotFound {
                tx_hash: tx_hash.to_string(),
            }),
            [row] => row.try_get::<Value, _>("data").map_err(storage),
            _ => Err(PipelineError::AmbiguousRow {
                tx_hash: tx_hash.to_string(),
                count: rows.len() as u64,
            }),
        }
    }

    async fn merge_content_data(
        &self,
        tx_hash: &str,
        index: usize,
        patch: &Value,
    ) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let result = sqlx::query(&merge_sql())
            .bind(tx_hash)
            .bind(slot_path(index))
            .bind(patch.clone())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        // Dropping `tx` without commit rolls the update back.
        match result.rows_affected() {
            0 => Err(PipelineError::RowNotFound {
                tx_hash: tx_hash.to_string(),
            }),
            1 => {
                tx.commit()
                    .await
                    .map_err(|e| PipelineError::Storage(format!("commit merge: {e}")))?;
                Ok(())
            }
            n => Err(PipelineError::AmbiguousRow {
                tx_hash: tx_hash.to_string(),
                count: n,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    // Integration tests require a running PostgreSQL instance.
    // Set DATABASE_URL environment variable to enable.
    // Example: DATABASE_URL=postgresql://localhost/ibcdecode_test cargo test --features postgres

    use super::*;
    use futures::TryStreamExt;
    use ibcdecode_core::types::IBC_TX_TAG;
    use serde_json::json;

    async fn seeded_store() -> PostgresTransactionStore {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for integration tests");
        let store = PostgresTransactionStore::connect(&url).await.unwrap();
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS transactions (
                "blockHeight" INTEGER NOT NULL,
                "txHash"      TEXT    NOT NULL,
                "txData"      JSONB   NOT NULL
            )"#,
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(r#"DELETE FROM transactions WHERE "txHash" = '0xpgtest'"#)
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query(r#"INSERT INTO transactions VALUES (7, '0xpgtest', $1)"#)
            .bind(json!({
                "data": {
                    "sections": [
                        { "type": "Code", "tag": IBC_TX_TAG },
                        { "type": "Data", "data": "0a01" }
                    ],
                    "content": [ { "type": IBC_TX_TAG, "data": {} } ]
                }
            }))
            .execute(store.pool())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL (set DATABASE_URL to enable)"]
    async fn test_postgres_stamp_removes_candidate() {
        let store = seeded_store().await;
        let query = CandidateQuery::new(IBC_TX_TAG, "pg-test");

        let before: Vec<_> = store.stream_candidates(&query).try_collect().await.unwrap();
        assert!(before.iter().any(|r| r.tx_hash == "0xpgtest"));

        let patch = json!({ "decoderVersion": "pg-test", "error": "boom" });
        let preview = store.preview_content_data("0xpgtest", 0, &patch).await.unwrap();
        assert_eq!(preview, patch);

        store.merge_content_data("0xpgtest", 0, &patch).await.unwrap();
        let row = store.fetch_transaction("0xpgtest").await.unwrap();
        assert_eq!(row.content[0].data, patch);

        let after: Vec<_> = store.stream_candidates(&query).try_collect().await.unwrap();
        assert!(!after.iter().any(|r| r.tx_hash == "0xpgtest"));
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL (set DATABASE_URL to enable)"]
    async fn test_postgres_missing_row() {
        let store = seeded_store().await;
        let patch = json!({ "decoderVersion": "pg-test", "error": "boom" });
        assert!(matches!(
            store.merge_content_data("0xnope", 0, &patch).await,
            Err(PipelineError::RowNotFound { .. })
        ));
    }
}
