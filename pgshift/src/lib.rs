//! Bookkeeping for replication runs.
//!
//! A replication run is tracked as a [`group::Group`] row in the `groups` table of an internal
//! schema. [`group::GroupStore`] owns that table: it creates and drops it and records when a
//! run is created, started and completed.

pub mod group;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
