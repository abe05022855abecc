//! Command implementations for the pixbatch CLI

pub mod config;
pub mod run;
pub mod version;
