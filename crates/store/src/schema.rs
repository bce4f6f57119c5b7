//! Queue table schema.

/// Idempotent DDL for the queue table.
///
/// `payload`, `metadata`, `result` and `error` hold JSON. Timestamps are
/// milliseconds since the Unix epoch.
pub const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS queue_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payload TEXT NOT NULL,
    metadata TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
    result TEXT,
    error TEXT,
    attempt_count INTEGER NOT NULL DEFAULT 0,
    claimed_by TEXT,
    arrival_ts INTEGER NOT NULL,
    updated_ts INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_items_status_arrival
    ON queue_items (status, arrival_ts, id);

CREATE INDEX IF NOT EXISTS idx_queue_items_status_updated
    ON queue_items (status, updated_ts);
";

/// Column list shared by every item query, in `Row` decode order.
pub const ITEM_COLUMNS: &str = "id, payload, metadata, status, result, error, \
     attempt_count, claimed_by, arrival_ts, updated_ts";
