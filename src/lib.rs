//! PersonaSeg: rule-based customer segmentation from raw sales transactions
//!
//! Transactions are averaged per exact demographic group, ages are binned,
//! groups are merged under a customer-level key (`COUNTRY_SOURCE_SEX_AGEBUCKET`)
//! and the resulting personas are ranked into quartile segments A..D that can
//! be looked up for new customers.

pub mod aggregate;
pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod persona;
pub mod profile;
pub mod viz;

// Re-export public items for easier access
pub use aggregate::{aggregate_groups, aggregate_keys, Averaging, GroupAverage, KeyAverage};
pub use cli::Args;
pub use data::{load_transactions, IngestReport, MalformedPolicy, Transaction};
pub use error::SegmentError;
pub use model::{
    fit_segments, predict_segment, Lookup, PipelineConfig, Segment, SegmentTable, SegmentedPersona,
};
pub use persona::{AgeBins, AgeBucket, CustomerLevelKey, Platform, PlatformName, Sex};
pub use profile::{profile_transactions, DatasetProfile};
pub use viz::create_segment_chart;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, SegmentError>;
