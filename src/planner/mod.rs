//! Segment planning - maps a subtitle timeline onto N overlapping output segments
//!
//! The planner divides the media timeline into contiguous core windows, moves
//! every internal boundary onto a cue edge so no subtitle line is cut in half,
//! then widens each window by the overlap margin. It performs no I/O.

mod algorithm;
mod types;

pub use algorithm::plan;
pub use types::{Cue, Segment, SplitPlan, Timeline};

use std::time::Duration;

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, PlanError>;

/// Error types for planning operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Invalid split configuration: {0}")]
    InvalidConfig(String),

    #[error("Degenerate planning input: {0}")]
    DegenerateInput(String),

    #[error("Overlap of {:.3}s is too large: segment {segment} would reach past its neighbouring core windows", overlap.as_secs_f64())]
    OverlapTooLarge { segment: usize, overlap: Duration },
}
