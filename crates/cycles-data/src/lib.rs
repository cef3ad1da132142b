//! Statement ingestion and the sequential pipeline for spend-cycles.
//!
//! Discovers and reads bank statement CSV exports, writes enriched
//! transactions back out, and runs the analysis end to end on one thread.

pub mod analysis;
pub mod reader;
pub mod writer;

pub use cycles_core as core;
