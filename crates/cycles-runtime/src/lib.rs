//! Concurrent runtime for spend-cycles.
//!
//! Reads and enriches statement files on blocking tokio tasks and merges
//! their partial summaries into the same result the sequential pipeline
//! produces.

pub mod pipeline;

pub use cycles_core as core;
pub use cycles_data as data;
