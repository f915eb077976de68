//! Command-line interface definitions for the headline pipeline.
//!
//! One subcommand per pipeline function. Global options can also be set
//! through environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the headline pipeline.
///
/// # Examples
///
/// ```sh
/// # Process an object-created notification from stdin
/// headline_pipeline event < event.json
///
/// # Re-extract one saved page against a local directory instead of S3
/// headline_pipeline --local-root ./data extract -b headlinesdyn -k headlines/raw/x-portafolio-2024-05-01.html
///
/// # Refresh the catalog, giving up after 15 minutes
/// headline_pipeline -c pipeline.yaml refresh-catalog --timeout-secs 900
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a pipeline YAML config file
    #[arg(short, long, env = "HEADLINES_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// AWS region override (defaults to the SDK provider chain)
    #[arg(long, env = "AWS_REGION", global = true)]
    pub region: Option<String>,

    /// Serve objects from `<root>/<bucket>/<key>` instead of S3
    #[arg(long, env = "HEADLINES_LOCAL_ROOT", global = true)]
    pub local_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Extract headlines for every record of an object-created event
    Event {
        /// Event JSON file; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Extract headlines from a single raw object
    Extract {
        #[arg(short, long)]
        bucket: String,
        #[arg(short, long)]
        key: String,
    },
    /// Run the catalog crawler and confirm the headline table exists
    RefreshCatalog {
        /// Give up waiting after this many seconds (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Provision the transient cluster and wait for its job to finish
    RunClusterJob {
        /// Give up waiting after this many seconds (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_extract() {
        let cli = Cli::parse_from([
            "headline_pipeline",
            "extract",
            "--bucket",
            "headlinesdyn",
            "--key",
            "headlines/raw/x-portafolio-2024-05-01.html",
        ]);

        assert_eq!(
            cli.command,
            Command::Extract {
                bucket: "headlinesdyn".to_string(),
                key: "headlines/raw/x-portafolio-2024-05-01.html".to_string(),
            }
        );
    }

    #[test]
    fn test_cli_short_flags_and_global_options() {
        let cli = Cli::parse_from([
            "headline_pipeline",
            "extract",
            "-b",
            "b",
            "-k",
            "k",
            "-c",
            "/tmp/pipeline.yaml",
            "--local-root",
            "/tmp/data",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pipeline.yaml")));
        assert_eq!(cli.local_root, Some(PathBuf::from("/tmp/data")));
    }

    #[test]
    fn test_cli_event_defaults_to_stdin() {
        let cli = Cli::parse_from(["headline_pipeline", "event"]);
        assert_eq!(cli.command, Command::Event { file: None });
    }

    #[test]
    fn test_cli_timeouts() {
        let cli = Cli::parse_from(["headline_pipeline", "refresh-catalog", "--timeout-secs", "900"]);
        assert_eq!(cli.command, Command::RefreshCatalog { timeout_secs: Some(900) });

        let cli = Cli::parse_from(["headline_pipeline", "run-cluster-job"]);
        assert_eq!(cli.command, Command::RunClusterJob { timeout_secs: None });
    }
}
