//! SQLite storage layer.
//!
//! State store implementation backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod pool;
pub mod state;

pub use pool::{DatabasePool, database_url};
pub use state::SqliteStateStore;
