//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

/// memtrail - memory footprint tracker
#[derive(Parser, Debug)]
#[command(name = "memtrail")]
#[command(version)]
#[command(about = "Track the resident memory of a program over time")]
#[command(
    long_about = "memtrail runs a program, samples its resident memory at a fixed interval and writes the trace as a PNG chart, an interactive HTML report, CSV or JSON."
)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a program and record its memory footprint
    Run(RunArgs),

    /// Render a saved JSON trace in another format
    Convert {
        /// JSON file with `[[timestamp, memory_mb], ...]` pairs
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ConvertFormat::Html)]
        format: ConvertFormat,

        /// Output file path (defaults to the input path with the format's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Arguments of `memtrail run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Sampling interval in seconds [default: 1.0]
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// Stop sampling after this many seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Output path; its directory and stem name every output file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format [default: png]
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// TOML settings file; flags given on the command line win
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Program to run, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Formats `memtrail run` can write
#[derive(ValueEnum, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Html,
    Csv,
    Json,
    /// Every format above
    All,
}

impl OutputFormat {
    /// Whether this selection includes `format`
    #[must_use]
    pub fn includes(self, format: Self) -> bool {
        self == Self::All || self == format
    }
}

/// Formats a JSON trace can be converted to
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvertFormat {
    Png,
    Html,
    Csv,
}

impl ConvertFormat {
    /// File extension for this format
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Html => "html",
            Self::Csv => "csv",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_trailing_args() {
        let cli = Cli::try_parse_from([
            "memtrail", "run", "-i", "0.5", "--format", "all", "--", "my-app", "--load", "-x",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.interval, Some(0.5));
        assert_eq!(args.format, Some(OutputFormat::All));
        assert_eq!(args.command, vec!["my-app", "--load", "-x"]);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_run_requires_program() {
        assert!(Cli::try_parse_from(["memtrail", "run", "-i", "1"]).is_err());
    }

    #[test]
    fn test_parse_convert_defaults_to_html() {
        let cli = Cli::try_parse_from(["memtrail", "-v", "convert", "trace.json"]).unwrap();

        let Commands::Convert { input, format, output } = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(input, PathBuf::from("trace.json"));
        assert_eq!(format, ConvertFormat::Html);
        assert!(output.is_none());
        assert!(cli.verbose);
    }

    #[test]
    fn test_convert_rejects_json_target() {
        assert!(Cli::try_parse_from(["memtrail", "convert", "t.json", "-f", "json"]).is_err());
    }

    #[test]
    fn test_format_includes() {
        assert!(OutputFormat::All.includes(OutputFormat::Csv));
        assert!(OutputFormat::Png.includes(OutputFormat::Png));
        assert!(!OutputFormat::Png.includes(OutputFormat::Html));
    }
}
