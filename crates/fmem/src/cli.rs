//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use friday_memory::DEFAULT_CONFIG_PATH;

/// Friday memory maintenance CLI
///
/// Inspect and maintain the three-tier memory system: cache, relational
/// store and vector index.
#[derive(Parser, Debug)]
#[command(name = "fmem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the memory configuration file (created with defaults if missing)
    #[arg(long, global = true, env = "FMEM_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Keep all data files under this directory instead of the configured paths
    #[arg(long, global = true, env = "FMEM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show availability and counts for every tier
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove interactions older than the retention period
    Cleanup,

    /// Check each backend right now
    Connectivity,

    /// Store a value in short-term memory
    Remember {
        /// Key
        key: String,

        /// Value (JSON, or plain text)
        value: String,

        /// Time-to-live in seconds (default: configured ttl)
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Read a value from short-term memory
    Recall {
        /// Key
        key: String,
    },

    /// Record an interaction
    Log {
        /// What the user said
        user_input: String,

        /// What Friday answered
        #[arg(short, long)]
        response: Option<String>,
    },

    /// List recent interactions, newest first
    Recent {
        /// Number of interactions
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// User preferences
    Pref(PrefCommand),

    /// Store knowledge in long-term memory
    Learn {
        /// Text to store
        text: String,

        /// Category recorded in the document metadata
        #[arg(short, long)]
        category: Option<String>,

        /// Store in the persona collection instead of knowledge
        #[arg(long)]
        persona: bool,
    },

    /// Semantic search over long-term memory
    Search {
        /// Query text
        query: String,

        /// Results per collection
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,

        /// Search every collection, not only knowledge
        #[arg(long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct PrefCommand {
    #[command(subcommand)]
    pub action: PrefAction,
}

#[derive(Subcommand, Debug)]
pub enum PrefAction {
    /// Set a preference
    Set {
        /// Preference key
        key: String,

        /// Value (JSON, or plain text)
        value: String,
    },

    /// Show a preference
    Get {
        /// Preference key
        key: String,
    },

    /// Show every preference
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
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
    fn test_defaults() {
        let cli = Cli::try_parse_from(["fmem", "status"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(cli.data_dir.is_none());
        assert!(!cli.log_json);
        assert!(matches!(cli.command, Commands::Status { json: false }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fmem", "recent", "-n", "3", "--config", "/tmp/m.json", "--log-json"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/m.json"));
        assert!(cli.log_json);
        assert!(matches!(cli.command, Commands::Recent { limit: 3, json: false }));
    }

    #[test]
    fn test_pref_set() {
        let cli = Cli::try_parse_from(["fmem", "pref", "set", "units", "\"metric\""]).unwrap();
        let Commands::Pref(PrefCommand {
            action: PrefAction::Set { key, value },
        }) = cli.command
        else {
            panic!("expected pref set");
        };
        assert_eq!(key, "units");
        assert_eq!(value, "\"metric\"");
    }

    #[test]
    fn test_search_flags() {
        let cli = Cli::try_parse_from(["fmem", "search", "mixtral", "--all", "-n", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Search { limit: 2, all: true, json: false, .. }
        ));
    }

    #[test]
    fn test_learn_requires_text() {
        assert!(Cli::try_parse_from(["fmem", "learn"]).is_err());
    }
}
