//! ibcdecode-storage: transaction store backends.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - `postgres`: PostgreSQL via `sqlx` (feature: `postgres`)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{InMemoryTransactionStore, StatementCounts};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresOptions, PostgresTransactionStore};
