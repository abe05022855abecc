//! Batch model and the collaborators around the dispatcher
//!
//! - [`types`]: work items, outcomes and the batch report
//! - [`directory`]: turns an input directory into work items
//! - [`runner`]: enumerate, dispatch, time and report one batch

pub mod directory;
pub mod runner;
pub mod types;

pub use directory::Directory;
pub use runner::{BatchRunner, BatchSettings};
pub use types::{BatchReport, OutcomeStatus, WorkItem, WorkOutcome};
