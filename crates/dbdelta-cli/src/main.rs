//! dbdelta CLI
//!
//! Compares two schema snapshots and prints the DDL that reconciles them.

mod input;
mod report;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use dbdelta_core::prelude::*;
use dbdelta_core::RENAME_THRESHOLD;

use crate::report::TextReport;

/// Schema comparison for MySQL-compatible databases.
#[derive(Parser)]
#[command(name = "dbdelta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true, env = "DBDELTA_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of the compare command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum Format {
    /// Human-readable report.
    #[default]
    Text,
    /// The full comparison as JSON.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a source snapshot (desired state) against a target snapshot
    /// (current state).
    Compare {
        /// JSON snapshot of the desired schema.
        #[arg(short, long)]
        source: PathBuf,

        /// JSON snapshot of the current schema.
        #[arg(short, long)]
        target: PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Emit RENAME TABLE for detected renames instead of DROP + CREATE.
        #[arg(long, conflicts_with = "no_renames")]
        apply_renames: bool,

        /// Do not look for renamed tables.
        #[arg(long)]
        no_renames: bool,

        /// Similarity a rename candidate must exceed.
        #[arg(long, env = "DBDELTA_RENAME_THRESHOLD", default_value_t = RENAME_THRESHOLD)]
        rename_threshold: f64,
    },

    /// Check that a snapshot is structurally valid.
    Validate {
        /// JSON snapshot to check.
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Compare {
            source,
            target,
            format,
            apply_renames,
            no_renames,
            rename_threshold,
        } => {
            let source = input::load_schema(&source)?;
            let target = input::load_schema(&target)?;

            let mut options = CompareOptions::new().with_rename_threshold(rename_threshold);
            if no_renames {
                options = options.without_rename_detection();
            }
            if apply_renames {
                options = options.with_applied_renames();
            }

            let comparison = Comparator::new(options).compare(&source, &target)?;

            match format {
                Format::Text => print!("{}", TextReport::new(&comparison)),
                Format::Json => println!("{}", serde_json::to_string_pretty(&comparison)?),
            }

            if !comparison.is_valid() {
                bail!(
                    "{} dependency error(s) block SQL generation",
                    comparison.validation.errors.len()
                );
            }
        }

        Commands::Validate { file } => {
            let schema = input::load_schema(&file)?;
            schema
                .validate()
                .with_context(|| format!("{} is not a valid schema", file.display()))?;
            info!(
                schema = %schema.name,
                tables = schema.tables.len(),
                "Schema is valid"
            );
        }
    }

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
    fn test_parse_compare() {
        let cli = Cli::try_parse_from([
            "dbdelta",
            "compare",
            "--source",
            "staging.json",
            "--target",
            "prod.json",
            "--format",
            "json",
            "--apply-renames",
        ])
        .unwrap();

        let Commands::Compare {
            source,
            target,
            format,
            apply_renames,
            no_renames,
            rename_threshold,
        } = cli.command
        else {
            panic!("expected compare");
        };
        assert_eq!(source, PathBuf::from("staging.json"));
        assert_eq!(target, PathBuf::from("prod.json"));
        assert_eq!(format, Format::Json);
        assert!(apply_renames);
        assert!(!no_renames);
        assert!((rename_threshold - RENAME_THRESHOLD).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rename_flags_conflict() {
        let result = Cli::try_parse_from([
            "dbdelta",
            "compare",
            "-s",
            "a.json",
            "-t",
            "b.json",
            "--apply-renames",
            "--no-renames",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["dbdelta", "-v", "validate", "schema.json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Validate { .. }));
    }
}
