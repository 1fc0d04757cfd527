//! SQLite storage backend for the outbox.

use super::{check_record, QueueStore, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use sync_types::{ExpensePayload, QueuedRecord, RecordId};
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-based outbox storage.
///
/// The database is opened on first use, not at construction, so building
/// a store never blocks and a failed open is retried on the next call.
/// Uses WAL mode with full fsync on commit; queue order is the insertion
/// sequence.
#[derive(Debug)]
pub struct SqliteQueueStore {
    location: Location,
    pool: OnceCell<SqlitePool>,
}

impl SqliteQueueStore {
    /// Create a store backed by the database file at `path`.
    ///
    /// Creates the database file on first use if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            location: Location::File(path.as_ref().to_path_buf()),
            pool: OnceCell::new(),
        }
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            pool: OnceCell::new(),
        }
    }

    /// Whether the database has been opened yet.
    pub fn is_open(&self) -> bool {
        self.pool.initialized()
    }

    async fn pool(&self) -> Result<&SqlitePool, StoreError> {
        self.pool.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<SqlitePool, StoreError> {
        let pool = match &self.location {
            Location::File(path) => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                    .synchronous(sqlx::sqlite::SqliteSynchronous::Full)
                    .busy_timeout(std::time::Duration::from_secs(5));

                let pool = SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        StoreError::Unavailable(format!("{}: {}", path.display(), e))
                    })?;
                tracing::info!("Opened outbox at {}", path.display());
                pool
            }
            Location::Memory => {
                let options = SqliteConnectOptions::from_str(":memory:")
                    .map_err(StoreError::Database)?;

                // One connection that never idles out, or the database vanishes.
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?
            }
        };

        Self::run_migrations(&pool).await?;
        Ok(pool)
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                note TEXT,
                date INTEGER NOT NULL,
                enqueued_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(())
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn enqueue(&self, record: QueuedRecord) -> Result<(), StoreError> {
        check_record(&record)?;
        let pool = self.pool().await?;

        // Upsert keeps the original seq, so a replaced record keeps its place.
        sqlx::query(
            r#"
            INSERT INTO outbox (id, amount, category, note, date, enqueued_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                amount = excluded.amount,
                category = excluded.category,
                note = excluded.note,
                date = excluded.date,
                enqueued_at = excluded.enqueued_at
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.payload.amount)
        .bind(&record.payload.category)
        .bind(record.payload.note.as_deref())
        .bind(record.payload.date)
        .bind(record.enqueued_at)
        .execute(pool)
        .await
        .map_err(StoreError::Database)?;

        tracing::debug!("Queued record {}", record.id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<QueuedRecord>, StoreError> {
        let pool = self.pool().await?;

        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, amount, category, note, date, enqueued_at
            FROM outbox
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(StoreError::Database)?;

        // One unreadable row must not hold back the rest of the queue.
        let records = rows
            .into_iter()
            .filter_map(|row| match QueuedRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::error!("Skipping outbox entry: {}", e);
                    None
                }
            })
            .collect();
        Ok(records)
    }

    async fn remove(&self, id: &RecordId) -> Result<(), StoreError> {
        let pool = self.pool().await?;

        sqlx::query("DELETE FROM outbox WHERE id = ?1")
            .bind(id.as_str())
            .execute(pool)
            .await
            .map_err(StoreError::Database)?;

        Ok(())
    }

    async fn remove_delivered(&self, delivered: &[QueuedRecord]) -> Result<usize, StoreError> {
        if delivered.is_empty() {
            return Ok(0);
        }

        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(StoreError::Database)?;
        let mut removed = 0;

        for record in delivered {
            let result = sqlx::query(
                r#"
                DELETE FROM outbox
                WHERE id = ?1 AND amount = ?2 AND category = ?3 AND note IS ?4
                    AND date = ?5 AND enqueued_at = ?6
                "#,
            )
            .bind(record.id.as_str())
            .bind(record.payload.amount)
            .bind(&record.payload.category)
            .bind(record.payload.note.as_deref())
            .bind(record.payload.date)
            .bind(record.enqueued_at)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Database)?;
            removed += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(StoreError::Database)?;

        let kept = delivered.len() - removed;
        if kept > 0 {
            tracing::debug!("Kept {} records replaced while in flight", kept);
        }
        Ok(removed)
    }

    async fn remove_all(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(StoreError::Database)?;

        for id in ids {
            sqlx::query("DELETE FROM outbox WHERE id = ?1")
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(StoreError::Database)?;
        }

        tx.commit().await.map_err(StoreError::Database)?;
        tracing::debug!("Removed {} records from outbox", ids.len());
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let pool = self.pool().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox")
            .fetch_one(pool)
            .await
            .map_err(StoreError::Database)?;

        Ok(count as usize)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: String,
    amount: f64,
    category: String,
    note: Option<String>,
    date: i64,
    enqueued_at: i64,
}

impl TryFrom<OutboxRow> for QueuedRecord {
    type Error = StoreError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        if row.id.is_empty() {
            return Err(StoreError::Corrupt {
                id: row.id,
                reason: "empty id".to_string(),
            });
        }

        let mut payload = ExpensePayload::new(row.amount, row.category, row.date);
        payload.note = row.note;
        Ok(QueuedRecord::new(
            RecordId::from(row.id),
            payload,
            row.enqueued_at,
        ))
    }
}
