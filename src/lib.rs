//! # pixbatch - bounded-parallel image derivatives
//!
//! pixbatch takes a directory of images and writes, for each one, a set of
//! JPEG derivatives (`thumbnail`, `small`, `medium`, `large`, `grayscale`,
//! `blur`) into its own output subdirectory.
//!
//! Each image is one work item handled by its own worker thread. A
//! [`Dispatcher`](parallel::Dispatcher) keeps at most `max_concurrency`
//! workers alive, starts items in directory order as slots free up, and
//! collects exactly one outcome per item. A failing image never stops the
//! rest of the batch.
//!
//! ## Quick Start
//!
//! ```bash
//! # Process ./photos into ./derived with four workers
//! pixbatch run photos -o derived -j 4
//!
//! # Machine-readable report
//! pixbatch run photos --format json
//!
//! # Show the resolved configuration
//! pixbatch config show
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use pixbatch::batch::{BatchRunner, BatchSettings};
//! use pixbatch::parallel::{DispatchConfig, NoopObserver};
//!
//! let runner = BatchRunner::new(BatchSettings {
//!     input_dir: "photos".into(),
//!     output_dir: "derived".into(),
//!     jpeg_quality: 85,
//!     dispatch: DispatchConfig::new(4)?,
//! });
//! let (report, _) = runner.run(|_| NoopObserver)?;
//! for outcome in report.failed() {
//!     eprintln!("{} failed: {:?}", outcome.name, outcome.error());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod parallel;

pub use cli::{Cli, Output};
pub use config::PixbatchConfig;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
