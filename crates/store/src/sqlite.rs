//! SQLite-backed [`QueueStore`].
//!
//! One connection behind a mutex per store handle; blocking calls run on
//! the tokio blocking pool. Several processes may open the same file: the
//! status guard lives in the `UPDATE ... WHERE` clause, so the affected-row
//! count decides who won.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inbox_core::{ItemId, ItemStatus, MessageMetadata, Payload, QueueItem, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema::{CREATE_TABLES, ITEM_COLUMNS};
use crate::store::{QueueStore, StatusCounts, StatusUpdate, UpdateResult};

const CAS_UPDATE: &str = r"
UPDATE queue_items
SET status = ?1,
    result = ?2,
    error = ?3,
    attempt_count = CASE
        WHEN ?4 THEN 0
        WHEN ?1 = 'processing' THEN attempt_count + 1
        ELSE attempt_count
    END,
    claimed_by = COALESCE(?5, claimed_by),
    updated_ts = ?6
WHERE id = ?7 AND status = ?8 AND (?9 IS NULL OR attempt_count = ?9)
";

/// SQLite queue store.
///
/// Create with [`SqliteQueueStore::open`] for a database file or
/// [`SqliteQueueStore::in_memory`] for tests. Clones share the connection.
#[derive(Clone)]
pub struct SqliteQueueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteQueueStore {
    /// Open or create the queue database described by `config`.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        info!(path = ?config.path, "Opening queue store");

        let conn = if config.is_memory() {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(&config.path)?
        };

        Self::configure(&conn, &config)?;
        conn.execute_batch(CREATE_TABLES)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(StoreConfig::memory())
    }

    fn configure(conn: &Connection, config: &StoreConfig) -> StoreResult<()> {
        debug!("Configuring SQLite pragmas");

        if config.wal_mode {
            // journal_mode returns the resulting mode as a row.
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        }
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await?
    }
}

/// Row as stored, before JSON columns are decoded.
struct RawItem {
    id: i64,
    payload: String,
    metadata: String,
    status: String,
    result: Option<String>,
    error: Option<String>,
    attempt_count: i64,
    claimed_by: Option<String>,
    arrival_ts: i64,
    updated_ts: i64,
}

impl RawItem {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            payload: row.get(1)?,
            metadata: row.get(2)?,
            status: row.get(3)?,
            result: row.get(4)?,
            error: row.get(5)?,
            attempt_count: row.get(6)?,
            claimed_by: row.get(7)?,
            arrival_ts: row.get(8)?,
            updated_ts: row.get(9)?,
        })
    }

    fn decode(self) -> StoreResult<QueueItem> {
        let id = self.id;
        let status = parse_status(id, &self.status)?;
        let claimed_by = self
            .claimed_by
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| StoreError::corrupt(id, format!("claimed_by: {}", e)))?;
        let attempt_count = u32::try_from(self.attempt_count)
            .map_err(|_| StoreError::corrupt(id, "negative attempt_count"))?;

        Ok(QueueItem {
            id: ItemId(id),
            payload: serde_json::from_str(&self.payload)?,
            metadata: serde_json::from_str(&self.metadata)?,
            status,
            result: self.result.as_deref().map(serde_json::from_str).transpose()?,
            error: self.error.as_deref().map(serde_json::from_str).transpose()?,
            attempt_count,
            claimed_by,
            arrival_at: from_millis(id, self.arrival_ts)?,
            updated_at: from_millis(id, self.updated_ts)?,
        })
    }
}

fn parse_status(id: i64, raw: &str) -> StoreResult<ItemStatus> {
    raw.parse()
        .map_err(|_| StoreError::corrupt(id, format!("unknown status {:?}", raw)))
}

fn from_millis(id: i64, ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::corrupt(id, format!("timestamp {} out of range", ms)))
}

fn query_items<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StoreResult<Vec<QueueItem>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, RawItem::from_row)?;
    let items = rows
        .map(|row| row.map_err(StoreError::from).and_then(RawItem::decode))
        .collect::<StoreResult<Vec<_>>>();
    items
}

fn load_item(conn: &Connection, id: i64) -> StoreResult<Option<QueueItem>> {
    let sql = format!("SELECT {} FROM queue_items WHERE id = ?1", ITEM_COLUMNS);
    conn.query_row(&sql, [id], RawItem::from_row)
        .optional()?
        .map(RawItem::decode)
        .transpose()
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn enqueue(&self, payload: Payload, metadata: MessageMetadata) -> Result<ItemId> {
        let payload_json = serde_json::to_string(&payload)?;
        let metadata_json = serde_json::to_string(&metadata)?;
        let arrival_ts = metadata.received_at.timestamp_millis();

        let id = self
            .blocking(move |conn| {
                conn.execute(
                    "INSERT INTO queue_items \
                     (payload, metadata, status, attempt_count, arrival_ts, updated_ts) \
                     VALUES (?1, ?2, 'pending', 0, ?3, ?4)",
                    params![
                        payload_json,
                        metadata_json,
                        arrival_ts,
                        Utc::now().timestamp_millis()
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(item_id = id, "Enqueued item");
        Ok(ItemId(id))
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let items = self
            .blocking(move |conn| {
                let sql = format!(
                    "SELECT {} FROM queue_items WHERE status = 'pending' \
                     ORDER BY arrival_ts ASC, id ASC LIMIT ?1",
                    ITEM_COLUMNS
                );
                query_items(conn, &sql, [sql_limit(limit)])
            })
            .await?;
        Ok(items)
    }

    async fn update_status(&self, update: StatusUpdate) -> Result<UpdateResult> {
        update.validate()?;

        let id = update.id.get();
        let to = update.to.as_str();
        let from = update.from.as_str();
        let result_json = update.result.as_ref().map(serde_json::to_string).transpose()?;
        let error_json = update.error.as_ref().map(serde_json::to_string).transpose()?;
        let claimed_by = update.claimed_by.map(|worker| worker.to_string());
        let expected_attempt = update.expected_attempt.map(i64::from);
        let reset_attempts = update.reset_attempts;

        let outcome = self
            .blocking(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let changed = tx.execute(
                    CAS_UPDATE,
                    params![
                        to,
                        result_json,
                        error_json,
                        reset_attempts,
                        claimed_by,
                        Utc::now().timestamp_millis(),
                        id,
                        from,
                        expected_attempt
                    ],
                )?;

                let outcome = if changed == 0 {
                    let current: Option<String> = tx
                        .query_row("SELECT status FROM queue_items WHERE id = ?1", [id], |row| {
                            row.get(0)
                        })
                        .optional()?;
                    let current = current
                        .as_deref()
                        .map(|raw| parse_status(id, raw))
                        .transpose()?;
                    UpdateResult::Conflict { current }
                } else {
                    let item = load_item(&tx, id)?
                        .ok_or_else(|| StoreError::corrupt(id, "row vanished after update"))?;
                    UpdateResult::Applied(item)
                };

                tx.commit()?;
                Ok(outcome)
            })
            .await?;

        match &outcome {
            UpdateResult::Applied(_) => {
                debug!(item_id = id, from = from, to = to, "Status updated")
            }
            UpdateResult::Conflict { current } => debug!(
                item_id = id,
                expected = from,
                current = ?current,
                "Status update lost compare-and-swap"
            ),
        }
        Ok(outcome)
    }

    async fn get(&self, id: ItemId) -> Result<Option<QueueItem>> {
        let item = self.blocking(move |conn| load_item(conn, id.get())).await?;
        Ok(item)
    }

    async fn list(&self, status: Option<ItemStatus>, limit: usize) -> Result<Vec<QueueItem>> {
        let status = status.map(|s| s.as_str());
        let items = self
            .blocking(move |conn| {
                let sql = format!(
                    "SELECT {} FROM queue_items WHERE (?1 IS NULL OR status = ?1) \
                     ORDER BY id DESC LIMIT ?2",
                    ITEM_COLUMNS
                );
                query_items(conn, &sql, params![status, sql_limit(limit)])
            })
            .await?;
        Ok(items)
    }

    async fn fetch_stale(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueueItem>> {
        let cutoff = older_than.timestamp_millis();
        let items = self
            .blocking(move |conn| {
                let sql = format!(
                    "SELECT {} FROM queue_items WHERE status = 'processing' AND updated_ts < ?1 \
                     ORDER BY updated_ts ASC, id ASC LIMIT ?2",
                    ITEM_COLUMNS
                );
                query_items(conn, &sql, params![cutoff, sql_limit(limit)])
            })
            .await?;
        Ok(items)
    }

    async fn counts(&self) -> Result<StatusCounts> {
        let counts = self
            .blocking(|conn| {
                let mut stmt = conn
                    .prepare_cached("SELECT status, COUNT(*) FROM queue_items GROUP BY status")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;

                let mut counts = StatusCounts::default();
                for row in rows {
                    let (status, count) = row?;
                    let count = u64::try_from(count).unwrap_or(0);
                    match parse_status(0, &status)? {
                        ItemStatus::Pending => counts.pending = count,
                        ItemStatus::Processing => counts.processing = count,
                        ItemStatus::Completed => counts.completed = count,
                        ItemStatus::Failed => counts.failed = count,
                    }
                }
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    async fn ping(&self) -> Result<()> {
        self.blocking(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}
