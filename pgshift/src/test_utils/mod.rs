//! Helpers shared by the unit and integration tests of the group store.

#[cfg(feature = "test-utils")]
pub mod database;
pub mod executor;
