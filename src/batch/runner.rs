use crate::batch::directory::{Directory, ensure_unique_names};
use crate::batch::types::BatchReport;
use crate::error::BatchError;
use crate::imaging::DerivativePipeline;
use crate::parallel::{DispatchConfig, DispatchObserver, Dispatcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Everything one batch run needs, already validated
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub jpeg_quality: u8,
    pub dispatch: DispatchConfig,
}

/// Enumerates the input, dispatches every item, and times the batch
pub struct BatchRunner {
    settings: BatchSettings,
}

impl BatchRunner {
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    /// Run one batch to completion
    ///
    /// Fails only on whole-batch faults; per-item failures are in the report.
    /// `on_enumerated` sees the item count before dispatch starts and returns
    /// the observer for this run.
    pub fn run<O, B>(&self, on_enumerated: B) -> Result<(BatchReport, O), BatchError>
    where
        O: DispatchObserver,
        B: FnOnce(usize) -> O,
    {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", %run_id);
        let _guard = span.enter();

        let started = Instant::now();
        let items = Directory::new().collect_work_items(&self.settings.input_dir)?;
        ensure_unique_names(&items)?;
        tracing::info!(
            "Processing {} image(s) from {} with up to {} worker(s)",
            items.len(),
            self.settings.input_dir.display(),
            self.settings.dispatch.max_concurrency()
        );

        let observer = on_enumerated(items.len());
        let pipeline = Arc::new(DerivativePipeline::new(
            &self.settings.output_dir,
            self.settings.jpeg_quality,
        ));
        let dispatcher = Dispatcher::new(self.settings.dispatch);
        let outcomes = dispatcher.run(items, move |item| pipeline.process(item), &observer)?;

        let report = BatchReport {
            run_id,
            max_concurrency: self.settings.dispatch.max_concurrency(),
            elapsed: started.elapsed(),
            outcomes,
        };
        tracing::info!(
            "Batch finished in {:.2?}: {} succeeded, {} failed (avg {:.2?} per image)",
            report.elapsed,
            report.succeeded().count(),
            report.failed().count(),
            report.average_per_item()
        );
        Ok((report, observer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::imaging::VARIANTS;
    use crate::parallel::NoopObserver;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn settings(input: &std::path::Path, output: &std::path::Path, jobs: i64) -> BatchSettings {
        BatchSettings {
            input_dir: input.to_path_buf(),
            output_dir: output.to_path_buf(),
            jpeg_quality: 80,
            dispatch: DispatchConfig::new(jobs).unwrap(),
        }
    }

    #[test]
    fn test_batch_with_corrupt_item_still_reports_all() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        let output = temp_dir.path().join("out");
        fs::create_dir(&input).unwrap();
        RgbImage::from_pixel(20, 10, Rgb([10, 200, 30]))
            .save(input.join("a.jpg"))
            .unwrap();
        fs::write(input.join("corrupt.png"), b"not an image").unwrap();

        let runner = BatchRunner::new(settings(&input, &output, 2));
        let (report, _) = runner.run(|_| NoopObserver).unwrap();

        let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a", "corrupt"]);
        assert!(report.outcomes[0].succeeded());
        assert_eq!(report.outcomes[1].error().unwrap().stage, Stage::Decode);
        assert!(report.has_failures());
        for variant in &VARIANTS {
            assert!(output.join("a").join(variant.file_name()).is_file());
        }
    }

    #[test]
    fn test_empty_input_yields_empty_report() {
        let temp_dir = TempDir::new().unwrap();
        let runner = BatchRunner::new(settings(temp_dir.path(), &temp_dir.path().join("out"), 4));
        let mut enumerated = None;
        let (report, _) = runner
            .run(|count| {
                enumerated = Some(count);
                NoopObserver
            })
            .unwrap();
        assert_eq!(enumerated, Some(0));
        assert_eq!(report.total(), 0);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_duplicate_names_abort_before_dispatch() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(temp_dir.path().join("a.png"), b"x").unwrap();
        let output = temp_dir.path().join("out");

        let runner = BatchRunner::new(settings(temp_dir.path(), &output, 2));
        let err = runner.run(|_| NoopObserver).unwrap_err();
        assert!(matches!(err, BatchError::DuplicateName { .. }));
        assert!(!output.exists());
    }
}
