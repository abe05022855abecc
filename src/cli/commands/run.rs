//! Run command implementation
//!
//! Loads the configuration, runs one batch off the async runtime, and prints
//! the report. Exits with status 1 when any image failed.

use crate::batch::{BatchReport, BatchRunner, BatchSettings};
use crate::cli::Output;
use crate::config::PixbatchConfig;
use crate::parallel::ProgressObserver;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value, json};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory of input images [default: batch.input_dir]
    #[arg(value_name = "INPUT_DIR")]
    pub input: Option<PathBuf>,

    /// Output root; each image gets its own subdirectory [default: batch.output_dir]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Maximum number of images processed at once [default: logical CPUs]
    #[arg(short = 'j', long, allow_negative_numbers = true)]
    pub jobs: Option<i64>,

    /// Fail an image still running after this many seconds (0 = never)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// JPEG quality for every derivative (1-100)
    #[arg(long, allow_negative_numbers = true)]
    pub quality: Option<i64>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    pub format: ReportFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// The full batch report as JSON
    Json,
}

impl RunArgs {
    /// Config overrides for the flags that were actually given
    pub fn overrides(&self) -> Value {
        let mut batch = Map::new();
        if let Some(input) = &self.input {
            batch.insert("input_dir".into(), json!(input));
        }
        if let Some(output) = &self.output {
            batch.insert("output_dir".into(), json!(output));
        }
        if let Some(jobs) = self.jobs {
            batch.insert("max_concurrency".into(), json!(jobs));
        }
        if let Some(timeout) = self.timeout {
            batch.insert("item_timeout_secs".into(), json!(timeout));
        }
        if self.no_progress {
            batch.insert("progress".into(), json!(false));
        }

        let mut output = Map::new();
        if let Some(quality) = self.quality {
            output.insert("jpeg_quality".into(), json!(quality));
        }

        json!({ "batch": batch, "output": output })
    }
}

pub async fn execute(args: RunArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = PixbatchConfig::load(config_path, Some(args.overrides()))?;
    let settings = BatchSettings {
        input_dir: config.batch.input_dir.clone(),
        output_dir: config.batch.output_dir.clone(),
        jpeg_quality: config.jpeg_quality()?,
        dispatch: config.dispatch_config()?,
    };

    let show_progress = config.batch.progress && !output.is_quiet() && args.format == ReportFormat::Text;
    let runner = BatchRunner::new(settings);

    // The coordinator blocks until every worker reports
    let (report, progress) = tokio::task::spawn_blocking(move || {
        runner.run(|total| {
            if show_progress && total > 0 {
                ProgressObserver::new(total)
            } else {
                ProgressObserver::hidden()
            }
        })
    })
    .await
    .context("batch coordinator stopped unexpectedly")??;
    progress.finish();

    match args.format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => print_text_report(&report, &config, output),
    }

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_text_report(report: &BatchReport, config: &PixbatchConfig, output: &Output) {
    if report.total() == 0 {
        output.warning(&format!(
            "No images found in {}",
            config.batch.input_dir.display()
        ));
        return;
    }

    output.header("🖼  Batch Results");
    for outcome in &report.outcomes {
        match outcome.error() {
            None => output.item_result(&outcome.name, &format!("({:.2?})", outcome.elapsed), true),
            Some(error) => output.item_result(&outcome.name, &error.to_string(), false),
        }
    }

    let failed = report.failed().count();
    output.category("Summary");
    output.key_value("Images:", &report.total().to_string(), false);
    output.key_value("Succeeded:", &report.succeeded().count().to_string(), failed == 0);
    output.key_value("Failed:", &failed.to_string(), false);
    output.key_value("Workers:", &report.max_concurrency.to_string(), false);
    output.key_value("Total time:", &format!("{:.2?}", report.elapsed), false);
    output.key_value("Average per image:", &format!("{:.2?}", report.average_per_item()), false);
    output.key_value("Output:", &config.batch.output_dir.display().to_string(), false);
    if output.is_verbose() {
        output.key_value("Run id:", &report.run_id.to_string(), false);
    }
    output.blank_line();

    if failed > 0 {
        output.error(&format!("{} of {} image(s) failed", failed, report.total()));
    } else {
        output.success(&format!("Processed {} image(s)", report.total()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_only_include_given_flags() {
        let args = RunArgs {
            jobs: Some(3),
            no_progress: true,
            ..Default::default()
        };
        let overrides = args.overrides();
        assert_eq!(overrides["batch"]["max_concurrency"], 3);
        assert_eq!(overrides["batch"]["progress"], false);
        assert!(overrides["batch"].get("input_dir").is_none());
        assert!(overrides["output"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_negative_jobs_survive_to_validation() {
        let args = RunArgs {
            jobs: Some(-1),
            ..Default::default()
        };
        assert_eq!(args.overrides()["batch"]["max_concurrency"], -1);
    }
}
