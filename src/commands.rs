//! CLI command handlers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use memtrail_tracker::{
    ChildProcess, ExportSink, GlobalTracker, TrackError, TrackerConfig, probe_for_pid,
};
use tracing::{error, info, warn};

use crate::cli::{Commands, ConvertFormat, OutputFormat, RunArgs};
use crate::settings::{RunOptions, Settings};

/// How a command finished when it did not fail itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything succeeded
    Success,
    /// The tracked program failed; its exit code is forwarded
    ProgramFailed(u8),
}

/// Execute a CLI command.
///
/// # Errors
///
/// Returns error on invalid configuration, unreadable input, spawn failure or
/// tracking failure
pub fn execute_command(command: Commands) -> Result<Outcome> {
    match command {
        Commands::Run(args) => cmd_run(&args),
        Commands::Convert {
            input,
            format,
            output,
        } => cmd_convert(&input, format, output).map(|()| Outcome::Success),
    }
}

/// Files a run writes, named after one directory and stem
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPlan {
    pub png: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl OutputPlan {
    /// Derive output paths from `--output` (or the program name) and the format
    #[must_use]
    pub fn new(output: Option<&Path>, program: &str, format: OutputFormat) -> Self {
        let stem = output
            .and_then(Path::file_stem)
            .or_else(|| Path::new(program).file_stem())
            .map_or_else(|| OsString::from("memtrail"), ToOwned::to_owned);
        let dir = output
            .and_then(Path::parent)
            .map_or_else(PathBuf::new, Path::to_path_buf);

        let path_for = |candidate: OutputFormat, ext: &str| {
            format.includes(candidate).then(|| {
                let mut name = stem.clone();
                name.push(".");
                name.push(ext);
                dir.join(name)
            })
        };

        Self {
            png: path_for(OutputFormat::Png, "png"),
            html: path_for(OutputFormat::Html, "html"),
            csv: path_for(OutputFormat::Csv, "csv"),
            json: path_for(OutputFormat::Json, "json"),
        }
    }

    /// Sinks for the tracker; `json_path` is where the JSON trace goes, if anywhere
    #[must_use]
    pub fn sinks(&self, json_path: Option<&Path>) -> Vec<ExportSink> {
        [
            self.png.clone().map(ExportSink::Png),
            json_path.map(|path| ExportSink::Json(path.to_path_buf())),
            self.csv.clone().map(ExportSink::Csv),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Every path this plan writes
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        [&self.png, &self.html, &self.csv, &self.json]
            .into_iter()
            .filter_map(|path| path.as_deref())
    }
}

/// Run a program under the unscoped tracker.
fn cmd_run(args: &RunArgs) -> Result<Outcome> {
    let settings = args
        .config
        .as_deref()
        .map(Settings::load)
        .transpose()?
        .unwrap_or_default();
    let options = RunOptions::resolve(args, settings);

    let Some((program, program_args)) = args.command.split_first() else {
        bail!("no program given to run");
    };

    let mut builder = TrackerConfig::builder().interval_secs(options.interval);
    if let Some(duration) = options.duration {
        builder = builder.duration_secs(duration);
    }
    let config = builder.build().context("invalid tracking configuration")?;

    let plan = OutputPlan::new(options.output.as_deref(), program, options.format);

    // HTML is rendered from the JSON trace, so stage one when JSON was not requested
    let staging = if plan.html.is_some() && plan.json.is_none() {
        Some(tempfile::tempdir().context("failed to create staging directory")?)
    } else {
        None
    };
    let json_path = plan.json.clone().or_else(|| {
        staging
            .as_ref()
            .map(|dir| dir.path().join("memtrail.json"))
    });

    println!("Tracking: {}", args.command.join(" "));
    println!("Interval: {}s", options.interval);
    for path in plan.paths() {
        println!("Output: {}", path.display());
    }

    let mut child = ChildProcess::spawn(program, program_args, None)
        .with_context(|| format!("failed to start {program}"))?;
    info!(program = %program, pid = child.pid(), "Tracking program");

    let config = config.with_probe(probe_for_pid(child.pid()));
    let tracker = GlobalTracker::new(config).with_sinks(plan.sinks(json_path.as_deref()));
    let result = tracker.run(|| child.wait_success());
    if result.as_ref().is_err_and(|e| !e.is_work()) {
        stop_abandoned_child(&mut child);
    }

    if let (Some(html), Some(json)) = (&plan.html, &json_path) {
        render_html(json, html);
    }

    match result {
        Ok(_) => {
            println!("Tracking complete");
            Ok(Outcome::Success)
        }
        Err(TrackError::Work { source, .. }) => match source.exit_code() {
            Some(code) => {
                warn!("{source}");
                Ok(Outcome::ProgramFailed(u8::try_from(code).unwrap_or(1)))
            }
            None => Err(anyhow::Error::new(source)),
        },
        Err(TrackError::Tracking { reason, .. }) => bail!("memory tracking failed: {reason}"),
    }
}

/// Kill a child nobody waited on, e.g. because the sampler never started
fn stop_abandoned_child(child: &mut ChildProcess) {
    match child.is_running() {
        Ok(false) => {}
        Ok(true) => match child.kill() {
            Ok(_) => warn!(pid = child.pid(), "Killed untracked program"),
            Err(e) => error!(error = %e, "Failed to kill untracked program"),
        },
        Err(e) => error!(error = %e, "Failed to check untracked program"),
    }
}

/// Render the HTML report from a JSON trace; failures are logged like any export
fn render_html(json: &Path, html: &Path) {
    let rendered = memtrail_report::read_json(json)
        .and_then(|series| memtrail_report::export_html(&series, html));
    match rendered {
        Ok(()) => info!(path = %html.display(), "HTML report written"),
        Err(e) => error!(path = %html.display(), error = %e, "Failed to write HTML report"),
    }
}

/// Convert a JSON trace into another format.
fn cmd_convert(input: &Path, format: ConvertFormat, output: Option<PathBuf>) -> Result<()> {
    if !input.exists() {
        bail!("input file not found: {}", input.display());
    }

    let series = memtrail_report::read_json(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let output = output.unwrap_or_else(|| input.with_extension(format.extension()));

    println!(
        "Converting {} to {}...",
        input.display(),
        format.extension().to_uppercase()
    );

    let written = match format {
        ConvertFormat::Png => memtrail_report::plot_png(&series, &output),
        ConvertFormat::Html => memtrail_report::export_html(&series, &output),
        ConvertFormat::Csv => memtrail_report::export_csv(&series, &output),
    };
    written.with_context(|| format!("failed to write {}", output.display()))?;

    println!("Exported to {}", output.display());
    Ok(())
}
