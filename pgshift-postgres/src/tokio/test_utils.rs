use pgshift_config::shared::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls};
use tracing::info;
use uuid::Uuid;

use crate::executor::PgQueryExecutor;

/// Returns the [`PgConnectionConfig`] of the Postgres instance used by tests.
///
/// Defaults to `postgres:postgres@localhost:5430` and can be overridden with the
/// `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME` and
/// `TESTS_DATABASE_PASSWORD` environment variables. The database name is random so that
/// tests never share state.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    let host = std::env::var("TESTS_DATABASE_HOST").unwrap_or_else(|_| "localhost".to_owned());
    let port = std::env::var("TESTS_DATABASE_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(5430);
    let username =
        std::env::var("TESTS_DATABASE_USERNAME").unwrap_or_else(|_| "postgres".to_owned());
    let password =
        std::env::var("TESTS_DATABASE_PASSWORD").unwrap_or_else(|_| "postgres".to_owned());

    PgConnectionConfig {
        host,
        port,
        name: Uuid::new_v4().to_string(),
        username,
        password: Some(password.into()),
        tls: TlsConfig::disabled(),
    }
}

/// A throwaway Postgres database.
///
/// The database is created by [`PgDatabase::new`] and dropped, together with every open
/// connection to it, when the value is dropped. Dropping requires a multi threaded runtime.
pub struct PgDatabase {
    pub config: PgConnectionConfig,
    pub client: Client,
}

impl PgDatabase {
    /// Creates a database with a random name on the local test instance.
    pub async fn new() -> Self {
        Self::with_config(local_pg_connection_config()).await
    }

    /// Creates the database described by `config`.
    pub async fn with_config(config: PgConnectionConfig) -> Self {
        let client = create_pg_database(&config).await;

        Self { config, client }
    }

    /// Returns an executor connected to this database.
    pub fn executor(&self) -> PgQueryExecutor {
        PgQueryExecutor::new(&self.config).expect("Failed to build the query executor")
    }
}

impl Drop for PgDatabase {
    fn drop(&mut self) {
        // `block_in_place` needs a multi threaded runtime so that other tasks can be moved
        // to another worker while we block.
        tokio::task::block_in_place(move || {
            Handle::current().block_on(async move { drop_pg_database(&self.config).await });
        });
    }
}

/// Connects with `options` and drives the connection on a background task.
async fn connect(options: tokio_postgres::Config) -> Client {
    let (client, connection) = options
        .connect(NoTls)
        .await
        .expect("Failed to connect to Postgres");

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            info!("connection error: {e}");
        }
    });

    client
}

/// Creates a new Postgres database and returns a client connected to it.
///
/// # Panics
/// Panics if connection or database creation fails.
pub async fn create_pg_database(config: &PgConnectionConfig) -> Client {
    let client = connect(config.without_db()).await;

    client
        .execute(&*format!(r#"create database "{}";"#, config.name), &[])
        .await
        .expect("Failed to create database");

    connect(config.with_db()).await
}

/// Drops a Postgres database after terminating every connection to it.
///
/// # Panics
/// Panics if any database operation fails.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let client = connect(config.without_db()).await;

    client
        .execute(
            &format!(
                r#"
                select pg_terminate_backend(pg_stat_activity.pid)
                from pg_stat_activity
                where pg_stat_activity.datname = '{}'
                and pid <> pg_backend_pid();"#,
                config.name
            ),
            &[],
        )
        .await
        .expect("Failed to terminate database connections");

    client
        .execute(
            &format!(r#"drop database if exists "{}";"#, config.name),
            &[],
        )
        .await
        .expect("Failed to destroy database");
}
