//! Engine module: runner por punto y driver del barrido.
//!
//! Provides the per-point pipeline runner, the parallel sweep driver and
//! the reports both produce.

pub mod driver;
pub mod report;
pub mod runner;

pub use driver::{FailurePolicy, SweepDriver, SweepOptions};
pub use report::{PointReport, PointState, PointSummary, SweepReport};
pub use runner::PipelineRunner;
