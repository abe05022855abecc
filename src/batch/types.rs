use crate::error::ItemError;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// One unit of work: a source image and the name its derivatives live under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub source_path: PathBuf,
    pub name: String,
}

impl WorkItem {
    pub fn new(source_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            name: name.into(),
        }
    }
}

/// Result of a single work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed(ItemError),
}

/// The single outcome recorded for a [`WorkItem`]
#[derive(Debug, Clone, Serialize)]
pub struct WorkOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// Pool slot the item ran in
    pub slot: usize,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

impl WorkOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded)
    }

    pub fn error(&self) -> Option<&ItemError> {
        match &self.status {
            OutcomeStatus::Succeeded => None,
            OutcomeStatus::Failed(error) => Some(error),
        }
    }
}

/// Aggregated outcomes of one batch, in batch order
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub max_concurrency: usize,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
    pub outcomes: Vec<WorkOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &WorkOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &WorkOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Batch wall time divided by item count; zero for an empty batch
    pub fn average_per_item(&self) -> Duration {
        match u32::try_from(self.total()) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.elapsed / count,
            Err(_) => Duration::from_secs_f64(self.elapsed.as_secs_f64() / self.total() as f64),
        }
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
