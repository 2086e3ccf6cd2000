//! CLI module for Reelsmith.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Reelsmith - trending shorts in, generated video series out
///
/// Collects trending short-form videos, extracts their viral patterns, writes a
/// multi-part prompt series, generates one clip per prompt, and merges the clips.
#[derive(Parser, Debug)]
#[command(name = "reelsmith")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Run the full pipeline for one request
    Run {
        /// Free-form idea, or a JSON request ({"initial_output": {...}})
        input: Option<String>,

        /// Target duration for a structured request (e.g. 30s, 1m)
        #[arg(short, long, requires = "category")]
        duration: Option<String>,

        /// Category for a structured request ("trending" or a niche)
        #[arg(long, requires = "duration")]
        category: Option<String>,

        /// Requester id used for storage paths and history
        #[arg(short, long, default_value = "local")]
        requester: String,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Collect ranked trending videos
    Trends {
        /// "trending" or a niche search term
        #[arg(default_value = "trending")]
        category: String,

        /// Two-letter region code
        #[arg(long)]
        region: Option<String>,

        /// Trending timeframe
        #[arg(long)]
        timeframe: Option<String>,

        /// Maximum candidates to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the collection as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract viral patterns from one or more videos
    Analyze {
        /// Video URLs (TikTok or YouTube)
        #[arg(required = true)]
        urls: Vec<String>,

        /// Print the analyses as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate videos from prompts
    Generate {
        /// Prompt texts, in order
        #[arg(required = true)]
        prompts: Vec<String>,

        /// Treat the prompts as one series and merge the clips afterwards
        #[arg(long)]
        series: bool,

        /// Requester id used for storage paths
        #[arg(short, long, default_value = "local")]
        requester: String,
    },

    /// Merge video references into one video, in the order given
    Assemble {
        /// References (gs:// or file://)
        #[arg(required = true)]
        references: Vec<String>,

        /// Requester id owning the output
        #[arg(short, long, default_value = "local")]
        requester: String,
    },

    /// Look up published references (lists keys when none is given)
    Refs {
        /// Series id or requester id
        key: Option<String>,
    },

    /// Show the task dispatch table
    Agents {
        /// Show the task plan for this request instead
        #[arg(long)]
        plan: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "generator.deadline_seconds")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_structured_run_needs_both_flags() {
        let args = ["reelsmith", "run", "--duration", "30s", "--category", "trending"];
        assert!(Cli::try_parse_from(args).is_ok());
        assert!(Cli::try_parse_from(["reelsmith", "run", "--duration", "30s"]).is_err());
    }

    #[test]
    fn test_generate_series_flag() {
        let args = ["reelsmith", "-vv", "generate", "--series", "a", "b"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Generate { prompts, series, .. } => {
                assert!(series);
                assert_eq!(prompts, vec!["a", "b"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
