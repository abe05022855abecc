//! Derivative generation for a single image
//!
//! [`variants`] is the fixed table of derivatives and the calls into the
//! `image` crate; [`pipeline`] is the worker body that decodes once and
//! writes every variant under the item's own directory.

pub mod pipeline;
pub mod variants;

pub use pipeline::DerivativePipeline;
pub use variants::{Operation, VARIANTS, Variant};
