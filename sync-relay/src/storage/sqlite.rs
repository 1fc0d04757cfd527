//! SQLite storage backend for sync-relay.

use super::{ExpenseStorage, InsertOutcome, StoredExpense};
use crate::error::StorageError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use sync_types::{ExpensePayload, QueuedRecord, RecordId};

/// SQLite-based expense storage.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        if path.is_dir() {
            return Err(StorageError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:").map_err(StorageError::Database)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS expenses (
                id TEXT PRIMARY KEY,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                note TEXT,
                date INTEGER NOT NULL,
                enqueued_at INTEGER NOT NULL,
                received_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(())
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn insert_query(
        record: &QueuedRecord,
        received_at: i64,
    ) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
        sqlx::query(
            r#"
            INSERT INTO expenses (id, amount, category, note, date, enqueued_at, received_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.payload.amount)
        .bind(record.payload.category.as_str())
        .bind(record.payload.note.as_deref())
        .bind(record.payload.date)
        .bind(record.enqueued_at)
        .bind(received_at)
    }

    fn outcome(rows_affected: u64) -> InsertOutcome {
        if rows_affected == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        }
    }
}

#[async_trait]
impl ExpenseStorage for SqliteStorage {
    async fn insert_expense(&self, record: &QueuedRecord) -> Result<InsertOutcome, StorageError> {
        let result = Self::insert_query(record, Self::current_timestamp())
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(Self::outcome(result.rows_affected()))
    }

    async fn insert_batch(
        &self,
        records: &[QueuedRecord],
    ) -> Result<Vec<InsertOutcome>, StorageError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let now = Self::current_timestamp();
        let mut outcomes = Vec::with_capacity(records.len());

        // One transaction: either the whole batch is stored or none of it.
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        for record in records {
            let result = Self::insert_query(record, now)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
            outcomes.push(Self::outcome(result.rows_affected()));
        }

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(outcomes)
    }

    async fn get_expense(&self, id: &RecordId) -> Result<Option<StoredExpense>, StorageError> {
        let row = sqlx::query_as::<_, ExpenseRow>(
            r#"
            SELECT id, amount, category, note, date, enqueued_at, received_at
            FROM expenses
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(row.map(StoredExpense::from))
    }

    async fn all_ids(&self) -> Result<Vec<RecordId>, StorageError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM expenses ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(ids.into_iter().map(RecordId::from).collect())
    }

    async fn count_expenses(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expenses")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(count as u64)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct ExpenseRow {
    id: String,
    amount: f64,
    category: String,
    note: Option<String>,
    date: i64,
    enqueued_at: i64,
    received_at: i64,
}

impl From<ExpenseRow> for StoredExpense {
    fn from(row: ExpenseRow) -> Self {
        let mut payload = ExpensePayload::new(row.amount, row.category, row.date);
        payload.note = row.note;
        StoredExpense {
            record: QueuedRecord::new(RecordId::from(row.id), payload, row.enqueued_at),
            received_at: row.received_at,
        }
    }
}
