//! Error types shared by every pipeline stage

use std::io;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors surfaced by ingestion, binning and segmentation.
///
/// A lookup miss is not represented here; see [`crate::model::Lookup`].
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("malformed input at row {row}: field '{field}' = {value:?} ({reason})")]
    MalformedInput {
        row: usize,
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("input is missing required column '{column}'")]
    MissingColumn { column: &'static str },
    #[error("age {age} is outside the bucket range [{min}, {max}]")]
    OutOfRangeAge { age: i64, min: i64, max: i64 },
    #[error("invalid age bins: upper bound {max_age} must be greater than 40")]
    InvalidBins { max_age: u32 },
    #[error("need at least 4 distinct average prices for quartile segments, found {distinct}")]
    InsufficientDistinctPrices { distinct: usize },
    #[error("quartile edges are not unique: {edges:?}")]
    DegenerateQuantiles { edges: [f64; 5] },
    #[error("no transactions to aggregate")]
    EmptyInput,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}
