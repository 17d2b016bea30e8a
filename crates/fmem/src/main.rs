//! fmem - Friday memory maintenance CLI
//!
//! Thin command-line front end over the `friday-memory` facade. Every tier
//! is opened the same way the assistant opens it, so a missing backend shows
//! up here as a degraded tier rather than an error.

use anyhow::Result;
use clap::Parser;
use friday_memory::{MemoryConfig, MemorySystem};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays pipeable
    let filter = EnvFilter::from_default_env()
        .add_directive("fmem=info".parse()?)
        .add_directive("friday_memory=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    let config = resolve_config(&cli);
    tracing::debug!(
        config = %cli.config.display(),
        mid_term = %config.mid_term.db_path.display(),
        long_term = %config.long_term.db_path.display(),
        "Opening memory system"
    );

    let memory = MemorySystem::with_config(config).await;

    match cli.command {
        Commands::Status { json } => commands::status::status(&memory, json).await,
        Commands::Cleanup => commands::status::cleanup(&memory).await,
        Commands::Connectivity => commands::status::connectivity(&memory).await,
        Commands::Remember { key, value, ttl } => commands::memory::remember(&memory, &key, &value, ttl).await,
        Commands::Recall { key } => commands::memory::recall(&memory, &key).await,
        Commands::Log { user_input, response } => {
            commands::memory::log(&memory, &user_input, response.as_deref()).await
        }
        Commands::Recent { limit, json } => commands::memory::recent(&memory, limit, json).await,
        Commands::Pref(cmd) => commands::prefs::execute(cmd, &memory).await,
        Commands::Learn {
            text,
            category,
            persona,
        } => commands::knowledge::learn(&memory, &text, category.as_deref(), persona).await,
        Commands::Search {
            query,
            limit,
            all,
            json,
        } => commands::knowledge::search(&memory, &query, limit, all, json).await,
    }
}

/// Configuration file (validated on load, defaults on any problem) with
/// `--data-dir` applied on top
fn resolve_config(cli: &Cli) -> MemoryConfig {
    let config = MemoryConfig::load(Some(&cli.config));
    match &cli.data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_invalid_config_file_falls_back_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("memory_config.json");
        std::fs::write(&config_path, r#"{ "mid_term": { "retention_days": 100000000 } }"#).unwrap();
        let data_dir = dir.path().join("data");

        let cli = Cli::try_parse_from([
            OsStr::new("fmem"),
            OsStr::new("status"),
            OsStr::new("--config"),
            config_path.as_os_str(),
            OsStr::new("--data-dir"),
            data_dir.as_os_str(),
        ])
        .unwrap();
        let config = resolve_config(&cli);

        assert_eq!(config, MemoryConfig::default().with_data_dir(&data_dir));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_values_kept_without_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("memory_config.json");
        std::fs::write(&config_path, r#"{ "mid_term": { "retention_days": 7 } }"#).unwrap();

        let cli = Cli::try_parse_from([
            OsStr::new("fmem"),
            OsStr::new("cleanup"),
            OsStr::new("--config"),
            config_path.as_os_str(),
        ])
        .unwrap();
        let config = resolve_config(&cli);

        assert_eq!(config.mid_term.retention_days, 7);
        assert_eq!(config.mid_term.db_path, MemoryConfig::default().mid_term.db_path);
    }
}
