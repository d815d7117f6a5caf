use pgshift_config::shared::GroupStoreConfig;
use pgshift_postgres::PgQueryExecutor;
use pgshift_postgres::tokio::test_utils::PgDatabase;

use crate::group::GroupStore;

/// Internal schema used by tests, distinct from the default one.
pub const TEST_INTERNAL_SCHEMA: &str = "pgshift_test";

/// Creates a throwaway database and a [`GroupStore`] pointing at it.
///
/// The groups table is not set up. Keep the returned [`PgDatabase`] alive for the duration of
/// the test, dropping it drops the database.
pub async fn spawn_group_store() -> (PgDatabase, GroupStore<PgQueryExecutor>) {
    let database = PgDatabase::new().await;
    let store = GroupStore::new(
        database.executor(),
        &GroupStoreConfig::new(TEST_INTERNAL_SCHEMA),
    );

    (database, store)
}
