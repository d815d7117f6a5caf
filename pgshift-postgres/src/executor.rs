use pg_escape::quote_identifier;
use pgshift_config::shared::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
use rustls::ClientConfig;
use std::future::Future;
use std::io::BufReader;
use std::sync::Arc;
use tokio_postgres::config::SslMode;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, Connection, NoTls, SimpleQueryMessage, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error};

use crate::error::QueryError;
use crate::row::QueryRow;

/// `DateStyle` of every session, matching [`crate::time::TIMESTAMP_FORMAT`].
const ISO_DATESTYLE: &str = "'ISO, YMD'";

/// Executes raw statements against a database and returns the produced rows as text.
///
/// The connection target is owned by the implementation. `schema`, when given, is used as the
/// `search_path` of the statement so unqualified names resolve inside it. Timestamps are
/// returned in ISO format regardless of the server `DateStyle`.
pub trait QueryExecutor {
    /// Runs `query` and returns every row it produced, in order.
    ///
    /// Statements without a result set return an empty vector.
    fn run(
        &self,
        query: &str,
        schema: Option<&str>,
    ) -> impl Future<Output = Result<Vec<QueryRow>, QueryError>> + Send;
}

/// Spawns a background task driving a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        if let Err(e) = connection.await {
            error!("an error occurred during the Postgres connection: {}", e);
            return;
        }

        debug!("postgres connection terminated successfully")
    }
    .instrument(span);

    tokio::spawn(task);
}

/// Builds a rustls client configuration trusting the PEM encoded `trusted_root_certs`.
fn build_tls_config(trusted_root_certs: &str) -> Result<ClientConfig, QueryError> {
    let mut root_store = rustls::RootCertStore::empty();
    let mut root_certs_reader = BufReader::new(trusted_root_certs.as_bytes());
    for cert in rustls_pemfile::certs(&mut root_certs_reader) {
        root_store.add(cert?)?;
    }

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

/// [`QueryExecutor`] backed by tokio-postgres and the simple query protocol.
///
/// Every call opens its own connection. Bookkeeping statements are infrequent, so paying the
/// connection setup per statement is preferred over holding an idle connection open on the
/// source database.
#[derive(Debug, Clone)]
pub struct PgQueryExecutor {
    config: Config,
    tls: Option<ClientConfig>,
}

impl PgQueryExecutor {
    /// Creates an executor for the database described by `pg_connection_config`.
    ///
    /// When TLS is enabled the server certificate is verified against the configured roots.
    pub fn new(pg_connection_config: &PgConnectionConfig) -> Result<Self, QueryError> {
        let tls = if pg_connection_config.tls.enabled {
            Some(build_tls_config(
                &pg_connection_config.tls.trusted_root_certs,
            )?)
        } else {
            None
        };

        Ok(Self {
            config: pg_connection_config.with_db(),
            tls,
        })
    }

    /// Creates an executor from a libpq style connection string or `postgres://` url.
    ///
    /// When `tls` is enabled the connection requires TLS and the server certificate is
    /// verified against its roots. A url asking for `sslmode=require` without an enabled `tls`
    /// is rejected since there would be no certificates to verify against.
    pub fn from_connection_url(connection_url: &str, tls: &TlsConfig) -> Result<Self, QueryError> {
        let mut config = connection_url
            .parse::<Config>()
            .map_err(QueryError::InvalidConnectionUrl)?;

        if !tls.enabled {
            if config.get_ssl_mode() == SslMode::Require {
                return Err(QueryError::MissingTrustedRootCerts);
            }

            return Ok(Self { config, tls: None });
        }

        config.ssl_mode(SslMode::Require);

        Ok(Self {
            config,
            tls: Some(build_tls_config(&tls.trusted_root_certs)?),
        })
    }

    async fn connect(&self) -> Result<Client, QueryError> {
        match &self.tls {
            Some(tls_config) => {
                let (client, connection) = self
                    .config
                    .connect(MakeRustlsConnect::new(tls_config.clone()))
                    .await
                    .map_err(QueryError::Connection)?;
                spawn_postgres_connection::<MakeRustlsConnect>(connection);

                Ok(client)
            }
            None => {
                let (client, connection) = self
                    .config
                    .connect(NoTls)
                    .await
                    .map_err(QueryError::Connection)?;
                spawn_postgres_connection::<NoTls>(connection);

                Ok(client)
            }
        }
    }
}

impl QueryExecutor for PgQueryExecutor {
    async fn run(&self, query: &str, schema: Option<&str>) -> Result<Vec<QueryRow>, QueryError> {
        let client = self.connect().await?;

        // Timestamps are decoded from their ISO text form whatever the server default is.
        let mut session = vec![format!("set datestyle to {ISO_DATESTYLE}")];
        if let Some(schema) = schema {
            session.push(format!("set search_path to {}", quote_identifier(schema)));
        }
        client.batch_execute(&session.join("; ")).await?;

        debug!(schema, query, "running query");

        let messages = client.simple_query(query).await?;
        let rows = messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(QueryRow::from(row)),
                _ => None,
            })
            .collect();

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_connection_url() {
        let executor = PgQueryExecutor::from_connection_url(
            "postgres://postgres@localhost:5430/orders",
            &TlsConfig::disabled(),
        )
        .unwrap();

        assert_eq!(executor.config.get_dbname(), Some("orders"));
        assert!(executor.tls.is_none());
    }

    #[test]
    fn test_from_invalid_connection_url() {
        let err = PgQueryExecutor::from_connection_url(
            "postgres://localhost:notaport",
            &TlsConfig::disabled(),
        )
        .unwrap_err();

        assert!(matches!(err, QueryError::InvalidConnectionUrl(_)));
    }

    #[test]
    fn test_connection_url_requiring_tls_needs_roots() {
        let url = "postgres://postgres@localhost:5430/orders?sslmode=require";

        let err = PgQueryExecutor::from_connection_url(url, &TlsConfig::disabled()).unwrap_err();
        assert!(matches!(err, QueryError::MissingTrustedRootCerts));

        let tls = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };
        let executor = PgQueryExecutor::from_connection_url(url, &tls).unwrap();
        assert!(executor.tls.is_some());
        assert_eq!(executor.config.get_ssl_mode(), SslMode::Require);
    }

    #[test]
    fn test_enabled_tls_upgrades_connection_url() {
        let tls = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };

        let executor =
            PgQueryExecutor::from_connection_url("postgres://postgres@localhost:5430/orders", &tls)
                .unwrap();

        assert_eq!(executor.config.get_ssl_mode(), SslMode::Require);
    }

    #[test]
    fn test_new_without_tls() {
        let config = PgConnectionConfig {
            host: "localhost".to_owned(),
            port: 5430,
            name: "orders".to_owned(),
            username: "postgres".to_owned(),
            password: None,
            tls: TlsConfig::disabled(),
        };

        let executor = PgQueryExecutor::new(&config).unwrap();
        assert!(executor.tls.is_none());
        assert_eq!(executor.config.get_user(), Some("postgres"));
    }
}
