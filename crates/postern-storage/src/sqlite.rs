use std::str::FromStr;

use async_trait::async_trait;
use postern_core::{DeleteRequest, Result, Store, StoreError, UrlRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

/// SQLite implementation of the `Store` contract via sqlx.
///
/// Live-uniqueness is enforced by partial unique indexes over non-deleted
/// rows, so the engine's constraint check is the source of truth under
/// concurrent writers; any application-level pre-check is an optimization
/// only. Bulk calls run inside a single transaction each, which bounds
/// their size to one chunk and keeps a chunk from being half-applied.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS urls (
        original   TEXT NOT NULL,
        short      TEXT NOT NULL,
        user_id    TEXT NOT NULL,
        is_deleted INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_urls_live_original
        ON urls(original) WHERE is_deleted = 0",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_urls_live_short
        ON urls(short) WHERE is_deleted = 0",
    "CREATE INDEX IF NOT EXISTS idx_urls_owner ON urls(user_id)",
];

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StoreError::InvalidData(message),
        _ => StoreError::Query(message),
    }
}

impl SqliteStore {
    /// Creates a store from an existing connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (or creates) the database at `url` and ensures the schema
    /// exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(map_sqlx_error)?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        info!(url, "sqlite store ready");
        Ok(store)
    }

    /// Opens a private in-memory database on a single-connection pool,
    /// so every handle sees the same data. Intended for tests and local
    /// experiments.
    pub async fn in_memory() -> Result<Self> {
        // one long-lived connection: recycling it would discard the
        // in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(map_sqlx_error)?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn insert_one(&self, record: UrlRecord) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO urls (original, short, user_id, is_deleted) VALUES (?, ?, ?, 0)",
        )
        .bind(&record.original)
        .bind(&record.short)
        .bind(&record.owner)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::AlreadyExists(record.original))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for record in &records {
            let result = sqlx::query(
                "INSERT INTO urls (original, short, user_id, is_deleted) VALUES (?, ?, ?, 0)",
            )
            .bind(&record.original)
            .bind(&record.short)
            .bind(&record.owner)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                // the dropped transaction rolls back the staged rows
                Err(err) if is_unique_violation(&err) => {
                    return Err(StoreError::AlreadyExists(record.original.clone()));
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn select_original(&self, short: &str) -> Result<String> {
        // prefer the live row when a re-derived code shadows a deleted one
        let row = sqlx::query(
            "SELECT original, is_deleted FROM urls WHERE short = ?
             ORDER BY is_deleted ASC LIMIT 1",
        )
        .bind(short)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StoreError::NotExist(short.to_string()));
        };

        let deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;
        if deleted {
            return Err(StoreError::AlreadyDeleted(short.to_string()));
        }
        row.try_get("original").map_err(map_sqlx_error)
    }

    async fn select_short(&self, original: &str) -> Result<String> {
        let row = sqlx::query(
            "SELECT short FROM urls WHERE original = ? AND is_deleted = 0 LIMIT 1",
        )
        .bind(original)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StoreError::NotExist(original.to_string()));
        };
        row.try_get("short").map_err(map_sqlx_error)
    }

    async fn select_all(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            "SELECT original, short, user_id FROM urls
             WHERE user_id = ? AND is_deleted = 0",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(UrlRecord::new(
                    row.try_get::<String, _>("user_id").map_err(map_sqlx_error)?,
                    row.try_get::<String, _>("original").map_err(map_sqlx_error)?,
                    row.try_get::<String, _>("short").map_err(map_sqlx_error)?,
                ))
            })
            .collect()
    }

    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()> {
        if requests.is_empty() {
            return Err(StoreError::NoData("empty delete batch".into()));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for request in requests {
            sqlx::query(
                "UPDATE urls SET is_deleted = 1
                 WHERE short = ? AND user_id = ? AND is_deleted = 0",
            )
            .bind(&request.short)
            .bind(&request.owner)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: &str, original: &str, short: &str) -> UrlRecord {
        UrlRecord::new(owner, original, short)
    }

    #[tokio::test]
    async fn ping_round_trips() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn insert_and_select() {
        let store = SqliteStore::in_memory().await.unwrap();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();

        assert_eq!(
            store.select_original("abc12345").await.unwrap(),
            "https://example.com/a"
        );
        assert_eq!(
            store.select_short("https://example.com/a").await.unwrap(),
            "abc12345"
        );
    }

    #[tokio::test]
    async fn engine_enforces_live_uniqueness() {
        let store = SqliteStore::in_memory().await.unwrap();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();

        let err = store
            .insert_one(record("u2", "https://example.com/a", "zzz99999"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let err = store
            .insert_one(record("u2", "https://example.com/b", "abc12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn batch_rolls_back_on_conflict() {
        let store = SqliteStore::in_memory().await.unwrap();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();

        let err = store
            .insert_batch(vec![
                record("u1", "https://example.com/b", "bbb11111"),
                record("u1", "https://example.com/a", "dup00000"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        // the first row of the failed call is not visible either
        let err = store.select_short("https://example.com/b").await.unwrap_err();
        assert!(matches!(err, StoreError::NotExist(_)));
    }

    #[tokio::test]
    async fn soft_delete_and_reinsert() {
        let store = SqliteStore::in_memory().await.unwrap();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();
        store
            .delete_batch(&[DeleteRequest::new("abc12345", "u1")])
            .await
            .unwrap();

        let err = store.select_original("abc12345").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyDeleted(_)));
        let err = store.select_short("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, StoreError::NotExist(_)));

        // the partial index frees the original for a new live record
        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();
        assert_eq!(
            store.select_original("abc12345").await.unwrap(),
            "https://example.com/a"
        );
    }

    #[tokio::test]
    async fn delete_checks_ownership() {
        let store = SqliteStore::in_memory().await.unwrap();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();
        store
            .delete_batch(&[DeleteRequest::new("abc12345", "someone-else")])
            .await
            .unwrap();

        // foreign pair was a no-op
        assert_eq!(store.select_all("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_delete_batch_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();

        let err = store.delete_batch(&[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NoData(_)));
    }

    #[tokio::test]
    async fn select_all_filters_owner_and_deleted() {
        let store = SqliteStore::in_memory().await.unwrap();

        store
            .insert_batch(vec![
                record("u1", "https://example.com/a", "aaa11111"),
                record("u1", "https://example.com/b", "bbb22222"),
                record("u2", "https://example.com/c", "ccc33333"),
            ])
            .await
            .unwrap();
        store
            .delete_batch(&[DeleteRequest::new("aaa11111", "u1")])
            .await
            .unwrap();

        let mut owned = store.select_all("u1").await.unwrap();
        owned.sort_by(|a, b| a.short.cmp(&b.short));
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].short, "bbb22222");
        assert!(store.select_all("nobody").await.unwrap().is_empty());
    }
}
