//! Durable queue storage for the inbox engine.
//!
//! All cross-worker coordination goes through [`QueueStore::update_status`],
//! a compare-and-swap on the item's status.

pub mod config;
pub mod error;
pub mod health;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use config::*;
pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteQueueStore;
pub use store::*;
