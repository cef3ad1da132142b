//! Temporal bucketing and categorisation engine for spend-cycles.
//!
//! Maps each transaction date to a calendar week of the month and to a
//! billing cycle with a week inside it, classifies descriptions with ordered
//! keyword rules, and aggregates enriched transactions into summaries with
//! peak insights. Nothing here touches files except rule and settings loading.

pub mod aggregation;
pub mod calendar;
pub mod classifier;
pub mod enricher;
pub mod error;
pub mod formatting;
pub mod models;
pub mod parsing;
pub mod settings;

pub use error::{CycleError, Result};
