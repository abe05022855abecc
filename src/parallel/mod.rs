//! Bounded parallel execution
//!
//! This module owns **how many** workers run and **how** work reaches them.
//! It knows nothing about images: a processor is any
//! `Fn(&WorkItem) -> Result<(), ItemError>`.
//!
//! ```text
//! ┌──────────────┐   items    ┌──────────────────┐  item at spawn  ┌──────────┐
//! │ Batch Runner │──────────▶│ Dispatcher       │───────────────▶│ Worker   │
//! │              │            │ • pending queue  │                 │ (thread) │
//! │              │◀──────────│ • free slots     │◀───────────────│          │
//! └──────────────┘  outcomes  └──────────────────┘  one Completion └──────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use pixbatch::batch::types::WorkItem;
//! use pixbatch::parallel::{DispatchConfig, Dispatcher, NoopObserver};
//!
//! let dispatcher = Dispatcher::new(DispatchConfig::new(2)?);
//! let items = vec![WorkItem::new("/in/a.jpg", "a"), WorkItem::new("/in/b.jpg", "b")];
//! let outcomes = dispatcher.run(items, |_item| Ok(()), &NoopObserver)?;
//! assert_eq!(outcomes.len(), 2);
//! assert!(outcomes.iter().all(|o| o.succeeded()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;
pub mod progress;

pub use self::core::{DispatchConfig, Dispatcher};
pub use progress::{DispatchObserver, NoopObserver, ProgressObserver};
