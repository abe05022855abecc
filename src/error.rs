//! Error types for batch processing
//!
//! Per-item failures are plain data ([`ItemError`]) that travel inside a
//! [`WorkOutcome`](crate::batch::types::WorkOutcome). Only [`BatchError`]
//! aborts a batch as a whole.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage an item failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Creating the item's output namespace
    Prepare,
    /// Reading or decoding the source image
    Decode,
    /// Producing the named derivative
    Transform(&'static str),
    /// Persisting the named derivative
    Write(&'static str),
    /// The worker terminated without reporting an outcome
    Worker,
    /// The worker exceeded the configured item deadline
    Timeout,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Prepare => f.write_str("prepare"),
            Stage::Decode => f.write_str("decode"),
            Stage::Transform(variant) => write!(f, "transform({variant})"),
            Stage::Write(variant) => write!(f, "write({variant})"),
            Stage::Worker => f.write_str("worker"),
            Stage::Timeout => f.write_str("timeout"),
        }
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Failure of a single work item
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{stage} failed: {message}")]
pub struct ItemError {
    pub stage: Stage,
    pub message: String,
}

impl ItemError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    /// Build a stage-tagged constructor for `map_err`
    pub fn at<E: fmt::Display>(stage: Stage) -> impl FnOnce(E) -> Self {
        move |e| Self::new(stage, e.to_string())
    }
}

/// Invalid or unloadable configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("max_concurrency must be at least 1 (got {0})")]
    InvalidConcurrency(i64),
    #[error("jpeg_quality must be between 1 and 100 (got {0})")]
    InvalidQuality(i64),
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load(Box::new(e))
    }
}

/// Fault that aborts a whole batch
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("cannot enumerate input directory {}: {source}", path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "work item name `{name}` is not unique: {} and {} would share one output directory",
        first.display(),
        second.display()
    )]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("failed to start worker for `{name}`: {source}")]
    WorkerSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
