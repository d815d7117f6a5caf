//! Postgres access for pgshift.
//!
//! The group store talks to Postgres only through the [`executor::QueryExecutor`] trait, which
//! runs a raw statement and hands back every row as text. [`executor::PgQueryExecutor`] is the
//! tokio-postgres implementation.

pub mod error;
pub mod executor;
pub mod row;
pub mod time;
#[cfg(feature = "test-utils")]
pub mod tokio;

pub use error::QueryError;
pub use executor::{PgQueryExecutor, QueryExecutor};
pub use row::QueryRow;
