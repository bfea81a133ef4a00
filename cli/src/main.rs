//! Dyno CLI - command-line access to tables declared in the config file.
//!
//! ```text
//! main() -> Cli::parse() -> load DynoConfig -> commands::run() -> JSON on stdout
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `warn`) so stdout stays parseable.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use dyno_config::{DynoConfig, config_path};
use dyno_types::VERSION;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "dyno", about = "Typed access to DynamoDB tables", version = VERSION)]
struct Cli {
    /// Config file (default: $DYNO_CONFIG, then ~/.dyno/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use a DynamoDB Local endpoint instead of the configured connection
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List table names known to the service
    Tables,

    /// Table administration
    Table {
        #[command(subcommand)]
        command: TableCommand,
    },

    /// Write a record (the item must exist unless --insert)
    Put {
        #[command(flatten)]
        target: Target,
        /// Record as a JSON object
        record: String,
        /// Fail if the item already exists instead of requiring it
        #[arg(long)]
        insert: bool,
        /// Strip index key attributes from the input
        #[arg(long, conflicts_with = "insert")]
        ignore_gsi: bool,
    },

    /// Fetch one record by key
    Get {
        #[command(flatten)]
        target: Target,
        /// Key fields as a JSON object
        key: String,
    },

    /// Delete one record by key, printing what was stored
    Delete {
        #[command(flatten)]
        target: Target,
        /// Key fields as a JSON object
        key: String,
    },

    /// Query one partition
    Query {
        #[command(flatten)]
        page: Page,
        /// Fields rendering the partition (and sort) key, as a JSON object
        #[arg(long)]
        key: Option<String>,
    },

    /// Scan a table or index
    Scan {
        #[command(flatten)]
        page: Page,
    },

    /// Bump an auto-increment counter and print the new value
    NextId {
        #[command(flatten)]
        target: Target,
        /// Counter name
        name: String,
        /// Fields rendering the key of the item holding the counter
        key: String,
        /// Restart the counter from its start value
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Debug, Subcommand)]
enum TableCommand {
    /// Create a declared table
    Create { table: String },
    /// Delete a table
    Delete { table: String },
    /// Show the service's description of a table
    Describe { table: String },
    /// Turn deletion protection on (or off with --off)
    Protect {
        table: String,
        #[arg(long)]
        off: bool,
    },
    /// Enable expiry on a datetime attribute (or disable with --disable)
    Ttl {
        table: String,
        attribute: String,
        #[arg(long)]
        disable: bool,
    },
    /// Check declarations without contacting the service
    Validate { table: Option<String> },
}

#[derive(Debug, Args)]
struct Target {
    /// Declared table name
    table: String,
    /// Schema stored in the table
    schema: String,
}

#[derive(Debug, Args)]
struct Page {
    /// Declared table name
    table: String,
    #[arg(long)]
    schema: Option<String>,
    #[arg(long)]
    index: Option<String>,
    /// Page size; 0 means no limit
    #[arg(long, default_value_t = 0)]
    limit: i64,
    /// `last_evaluated_key` of a previous page, as JSON
    #[arg(long)]
    start: Option<String>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(explicit: Option<&PathBuf>) -> Result<DynoConfig> {
    if let Some(path) = explicit {
        return DynoConfig::load_from(path).with_context(|| format!("loading {}", path.display()));
    }
    match DynoConfig::load()? {
        Some(config) => Ok(config),
        None => {
            if let Some(path) = config_path() {
                tracing::info!("No config at {}; using the environment", path.display());
            }
            Ok(DynoConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_ref())?;
    let output = commands::run(cli.command, &config, cli.endpoint.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn version_is_the_workspace_version() {
        let version = Cli::command().render_version();
        assert_eq!(version.trim(), format!("dyno {VERSION}"));
    }

    #[test]
    fn parses_put_flags() {
        let cli = Cli::try_parse_from(["dyno", "put", "sample", "User", r#"{"id":"u1"}"#, "--insert"]).unwrap();
        match cli.command {
            Command::Put {
                target,
                insert,
                ignore_gsi,
                ..
            } => {
                assert_eq!(target.table, "sample");
                assert_eq!(target.schema, "User");
                assert!(insert);
                assert!(!ignore_gsi);
            }
            other => panic!("expected put, got {other:?}"),
        }

        let conflict = Cli::try_parse_from(["dyno", "put", "sample", "User", "{}", "--insert", "--ignore-gsi"]);
        assert!(conflict.is_err());
    }

    #[test]
    fn parses_global_options_after_the_command() {
        let cli = Cli::try_parse_from([
            "dyno",
            "scan",
            "sample",
            "--limit",
            "10",
            "--config",
            "/tmp/dyno.toml",
            "--endpoint",
            "http://localhost:8000",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/dyno.toml")));
        assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:8000"));
        assert!(matches!(cli.command, Command::Scan { ref page } if page.limit == 10));
    }

    #[test]
    fn parses_table_subcommands() {
        let cli = Cli::try_parse_from(["dyno", "table", "ttl", "sample", "expires", "--disable"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Table {
                command: TableCommand::Ttl { ref attribute, disable: true, .. }
            } if attribute == "expires"
        ));
    }
}
