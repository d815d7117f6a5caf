use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pgshift::group::{GroupStore, NewGroup};
use pgshift_config::shared::{ShiftConfig, TlsConfig};
use pgshift_postgres::PgQueryExecutor;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "pgshift")]
#[command(about = "Bookkeeping of pgshift replication groups")]
pub struct Cli {
    /// Connection url of the source database, overrides the configured connection
    #[arg(long, env = "PGSHIFT_SOURCE_URL", global = true)]
    pub source_url: Option<String>,

    /// PEM file of the root certificates trusted for `--source-url`, turns on TLS
    #[arg(long, env = "PGSHIFT_SSL_ROOT_CERT", global = true, requires = "source_url")]
    pub ssl_root_cert: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the internal schema and the groups table
    Setup,
    /// Drop the groups table
    Drop,
    /// Register a new group
    Create {
        #[arg(long)]
        name: String,

        /// Comma separated list of tables
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        #[arg(long)]
        schema_name: Option<String>,
    },
    /// Show the groups with the given name
    Find { name: String },
    /// Show every group
    List,
    /// Mark the groups with the given name as started
    Start { name: String },
    /// Mark the groups with the given name as completed
    Complete { name: String },
    /// Delete the groups with the given name
    Delete { name: String },
}

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: u64,
}

/// Runs `cli.command` against the group store described by `shift_config`.
pub async fn run_command(cli: Cli, shift_config: ShiftConfig) -> anyhow::Result<()> {
    let executor = match (&cli.source_url, &shift_config.source) {
        (Some(source_url), _) => {
            let tls = url_tls_config(cli.ssl_root_cert.as_deref())?;
            PgQueryExecutor::from_connection_url(source_url, &tls)?
        }
        (None, Some(source)) => PgQueryExecutor::new(source)?,
        (None, None) => bail!("no source database: pass --source-url or configure `source`"),
    };
    let store = GroupStore::new(executor, &shift_config.store);

    info!(schema = store.schema(), command = ?cli.command, "running command");

    match cli.command {
        Command::Setup => {
            store.setup().await?;
            print_json(&serde_json::json!({ "setup": true }))
        }
        Command::Drop => {
            store.drop().await?;
            print_json(&serde_json::json!({ "dropped": true }))
        }
        Command::Create {
            name,
            tables,
            schema_name,
        } => {
            let mut new_group = NewGroup::named(name);
            if !tables.is_empty() {
                new_group = new_group.with_tables(tables.iter().map(|table| table.trim()));
            }
            if let Some(schema_name) = schema_name {
                new_group = new_group.with_schema_name(schema_name);
            }

            print_json(&store.create(&new_group).await?)
        }
        Command::Find { name } => print_json(&store.find(&name).await?),
        Command::List => print_json(&store.list().await?),
        Command::Start { name } => print_json(&store.mark_started(&name, Utc::now()).await?),
        Command::Complete { name } => {
            print_json(&store.mark_completed(&name, Utc::now()).await?)
        }
        Command::Delete { name } => print_json(&Deleted {
            deleted: store.delete(&name).await?,
        }),
    }
}

fn url_tls_config(ssl_root_cert: Option<&Path>) -> anyhow::Result<TlsConfig> {
    let Some(path) = ssl_root_cert else {
        return Ok(TlsConfig::disabled());
    };

    let trusted_root_certs = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read root certificates from {}", path.display()))?;

    Ok(TlsConfig {
        trusted_root_certs,
        enabled: true,
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "pgshift",
            "create",
            "--name",
            "orders",
            "--tables",
            "orders,order_items",
            "--schema-name",
            "public",
        ])
        .unwrap();

        match cli.command {
            Command::Create {
                name,
                tables,
                schema_name,
            } => {
                assert_eq!(name, "orders");
                assert_eq!(tables, vec!["orders", "order_items"]);
                assert_eq!(schema_name.as_deref(), Some("public"));
            }
            command => panic!("unexpected command: {command:?}"),
        }
    }

    #[test]
    fn test_parse_global_source_url() {
        let cli = Cli::try_parse_from([
            "pgshift",
            "find",
            "orders",
            "--source-url",
            "postgres://postgres@localhost/orders",
        ])
        .unwrap();

        assert_eq!(
            cli.source_url.as_deref(),
            Some("postgres://postgres@localhost/orders")
        );
        assert!(matches!(cli.command, Command::Find { name } if name == "orders"));
    }

    #[test]
    fn test_ssl_root_cert_requires_source_url() {
        assert!(Cli::try_parse_from(["pgshift", "list", "--ssl-root-cert", "ca.pem"]).is_err());

        let cli = Cli::try_parse_from([
            "pgshift",
            "list",
            "--source-url",
            "postgres://postgres@localhost/orders?sslmode=require",
            "--ssl-root-cert",
            "ca.pem",
        ])
        .unwrap();
        assert_eq!(cli.ssl_root_cert.as_deref(), Some(Path::new("ca.pem")));
    }

    #[test]
    fn test_url_tls_config() {
        assert!(!url_tls_config(None).unwrap().enabled);
        assert!(url_tls_config(Some(Path::new("/nonexistent/ca.pem"))).is_err());
    }

    #[tokio::test]
    async fn test_missing_source_is_reported() {
        let cli = Cli::try_parse_from(["pgshift", "list"]).unwrap();
        let shift_config = ShiftConfig {
            source: None,
            store: Default::default(),
            log: Default::default(),
        };

        let err = run_command(cli, shift_config).await.unwrap_err();

        assert!(err.to_string().starts_with("no source database"));
    }

    #[test]
    fn test_create_requires_name() {
        assert!(Cli::try_parse_from(["pgshift", "create"]).is_err());
    }
}
