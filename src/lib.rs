//! Per-frame aggregation of morphometry measurement files.
//!
//! A directory of `*_morphometry_results.csv` files is ordered by name,
//! each file becomes one frame, the rows are merged and numeric columns
//! coerced, and per-frame statistics of the selected columns are written
//! next to the raw merged data and a metrics-vs-frame chart.

pub mod chart;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod report;
pub mod stats;

pub use config::RunConfig;
pub use error::PipelineError;
pub use pipeline::{run, RunSummary};
