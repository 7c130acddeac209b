// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quarry - asynchronous SQLite query service.
//!
//! Command-line front end: run a query through the service, show where a
//! database lives, or print the effective configuration.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod query;
mod resolve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quarry_config::QuarryConfig;

/// Quarry - asynchronous SQLite query service.
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one SQL statement and print the resulting rows as JSON.
    Query {
        /// Database name, resolved through the configured path policy.
        #[arg(long)]
        db: String,
        /// Request identifier echoed back with the result.
        #[arg(long, default_value_t = 0)]
        id: i64,
        /// SQL text.
        sql: String,
    },
    /// Print the file a database name resolves to.
    Resolve {
        /// Database name.
        name: String,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => quarry_config::load_and_validate_path(path),
        None => quarry_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            quarry_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    let outcome = match cli.command {
        Some(Commands::Query { db, id, sql }) => {
            query::run_query(&config.storage, &db, id, &sql)
                .await
                .and_then(|rows| query::render_rows(&rows))
        }
        Some(Commands::Resolve { name }) => resolve::resolve_path(&config.storage, &name)
            .await
            .map(|path| path.display().to_string()),
        Some(Commands::Config) => render_config(&config),
        None => Ok("quarry: use --help for available commands".to_string()),
    };

    match outcome {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn render_config(config: &QuarryConfig) -> Result<String, quarry_core::QuarryError> {
    toml::to_string_pretty(config).map_err(|e| quarry_core::QuarryError::Config(e.to_string()))
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quarry={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_query_command() {
        let cli = Cli::try_parse_from([
            "quarry", "query", "--db", "test.db", "--id", "7", "SELECT 1 AS value1",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Query { db, id, sql }) => {
                assert_eq!(db, "test.db");
                assert_eq!(id, 7);
                assert_eq!(sql, "SELECT 1 AS value1");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn query_requires_db() {
        assert!(Cli::try_parse_from(["quarry", "query", "SELECT 1"]).is_err());
    }

    #[test]
    #[serial]
    fn binary_loads_config_defaults() {
        // Reads ./quarry.toml and QUARRY_* from the process environment.
        let config = quarry_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.service.log_level, "info");
    }

    #[test]
    #[serial]
    fn env_overrides_log_level() {
        // SAFETY: test-only env mutation, serialized with the other env readers.
        unsafe { std::env::set_var("QUARRY_SERVICE_LOG_LEVEL", "debug") };
        let result = quarry_config::load_and_validate();
        unsafe { std::env::remove_var("QUARRY_SERVICE_LOG_LEVEL") };

        assert_eq!(result.unwrap().service.log_level, "debug");
    }

    #[test]
    fn config_renders_as_toml() {
        let config = quarry_config::load_and_validate_str(
            "[storage]\npath_policy = \"direct\"\ndatabase_dir = \"/srv/db\"\n",
        )
        .unwrap();
        let rendered = render_config(&config).unwrap();
        assert!(rendered.contains("path_policy = \"direct\""));
        assert!(rendered.contains("database_dir = \"/srv/db\""));

        let reparsed = quarry_config::load_and_validate_str(&rendered).unwrap();
        assert_eq!(reparsed.storage.database_dir, "/srv/db");
    }
}
