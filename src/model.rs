//! Quartile segmentation and the persona lookup table

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{aggregate_groups, aggregate_keys, max_group_age, Averaging, KeyAverage};
use crate::data::{MalformedPolicy, Transaction};
use crate::error::SegmentError;
use crate::persona::{AgeBins, CustomerLevelKey, Platform, Sex};

/// Quartile probabilities used for the segment edges
const QUARTILES: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Ordinal spend segment, `A` being the highest quartile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    A,
    B,
    C,
    D,
}

impl Segment {
    /// Segments from highest to lowest spend
    pub const ALL: [Segment; 4] = [Segment::A, Segment::B, Segment::C, Segment::D];

    /// Segment for the quartile bin at `index`, 0 being the cheapest
    fn from_bin(index: usize) -> Self {
        match index {
            0 => Segment::D,
            1 => Segment::C,
            2 => Segment::B,
            _ => Segment::A,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::A => "A",
            Segment::B => "B",
            Segment::C => "C",
            Segment::D => "D",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer-level key with its average spend and segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedPersona {
    #[serde(rename = "customer_level", serialize_with = "serialize_key")]
    pub key: CustomerLevelKey,
    pub average_price: f64,
    pub segment: Segment,
}

fn serialize_key<S: serde::Serializer>(key: &CustomerLevelKey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(key)
}

/// Per-segment statistics over the personas it contains
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub personas: usize,
    pub mean_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Outcome of an exact key lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a SegmentedPersona),
    /// No historical data covers this key; carries the normalized query
    NotFound(String),
}

impl<'a> Lookup<'a> {
    pub fn persona(&self) -> Option<&'a SegmentedPersona> {
        match self {
            Lookup::Found(persona) => Some(*persona),
            Lookup::NotFound(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Library-level pipeline configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound of the open age bucket; the largest observed age when unset
    pub max_age: Option<u32>,
    pub averaging: Averaging,
    pub malformed: MalformedPolicy,
}

/// Linear-interpolation quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

/// Quartile edges of `prices`.
///
/// Fails when fewer than four distinct prices exist or when the interpolated
/// edges collide.
pub fn quartile_edges(prices: &[f64]) -> crate::Result<[f64; 5]> {
    let distinct = prices
        .iter()
        .map(|p| p.to_bits())
        .collect::<BTreeSet<_>>()
        .len();
    if distinct < 4 {
        return Err(SegmentError::InsufficientDistinctPrices { distinct });
    }

    let mut sorted = prices.to_vec();
    sorted.sort_by(f64::total_cmp);

    let edges = QUARTILES.map(|q| quantile(&sorted, q));
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SegmentError::DegenerateQuantiles { edges });
    }
    Ok(edges)
}

/// Segment of `price` given quartile edges. Bins are right-closed and the
/// lowest edge belongs to the first bin.
fn segment_for(price: f64, edges: &[f64; 5]) -> Segment {
    let bin = edges[1..4].iter().take_while(|&&edge| price > edge).count();
    Segment::from_bin(bin)
}

/// Rank key averages into quartile segments
pub fn assign_segments(keys: Vec<KeyAverage>) -> crate::Result<Vec<SegmentedPersona>> {
    let prices: Vec<f64> = keys.iter().map(|k| k.average_price).collect();
    let edges = quartile_edges(&prices)?;
    debug!(?edges, "quartile edges");

    Ok(keys
        .into_iter()
        .map(|k| SegmentedPersona {
            segment: segment_for(k.average_price, &edges),
            key: k.key,
            average_price: k.average_price,
        })
        .collect())
}

/// Deduplicated, segmented personas keyed by customer-level key
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTable {
    personas: BTreeMap<CustomerLevelKey, SegmentedPersona>,
    bins: AgeBins,
}

impl SegmentTable {
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Age bins the table was built with
    pub fn bins(&self) -> &AgeBins {
        &self.bins
    }

    /// Personas in key order
    pub fn iter(&self) -> impl Iterator<Item = &SegmentedPersona> {
        self.personas.values()
    }

    /// Exact lookup of a key string such as `BRA_ANDROID_MALE_0_18`.
    ///
    /// Case and surrounding whitespace are normalized first.
    pub fn lookup(&self, key: &str) -> Lookup<'_> {
        let normalized = key.trim().to_ascii_uppercase();
        match normalized.parse::<CustomerLevelKey>() {
            Ok(parsed) => self.lookup_key(&parsed),
            Err(_) => Lookup::NotFound(normalized),
        }
    }

    pub fn lookup_key(&self, key: &CustomerLevelKey) -> Lookup<'_> {
        match self.personas.get(key) {
            Some(persona) => Lookup::Found(persona),
            None => Lookup::NotFound(key.to_string()),
        }
    }

    /// Bin a raw age with this table's bins and look the resulting key up
    pub fn lookup_profile(
        &self,
        country: &str,
        source: Platform,
        sex: Sex,
        age: i64,
    ) -> crate::Result<Lookup<'_>> {
        let bucket = self.bins.bucket(age)?;
        let key = CustomerLevelKey::new(country, source, sex, bucket);
        Ok(self.lookup_key(&key))
    }

    /// Personas by descending average price, ties broken by key
    pub fn ranked(&self) -> Vec<&SegmentedPersona> {
        let mut ranked: Vec<&SegmentedPersona> = self.personas.values().collect();
        ranked.sort_by(|a, b| {
            b.average_price
                .total_cmp(&a.average_price)
                .then_with(|| a.key.cmp(&b.key))
        });
        ranked
    }

    /// Statistics per segment, A first. Empty segments are omitted.
    pub fn summary(&self) -> Vec<SegmentSummary> {
        Segment::ALL
            .iter()
            .filter_map(|&segment| {
                let prices: Vec<f64> = self
                    .personas
                    .values()
                    .filter(|p| p.segment == segment)
                    .map(|p| p.average_price)
                    .collect();
                if prices.is_empty() {
                    return None;
                }
                Some(SegmentSummary {
                    segment,
                    personas: prices.len(),
                    mean_price: prices.iter().sum::<f64>() / prices.len() as f64,
                    min_price: prices.iter().copied().fold(f64::INFINITY, f64::min),
                    max_price: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                })
            })
            .collect()
    }

    /// Ranked table as a frame with `customer_level`, `average_price`, `segment`
    pub fn to_frame(&self) -> crate::Result<DataFrame> {
        let ranked = self.ranked();
        let keys: Vec<String> = ranked.iter().map(|p| p.key.to_string()).collect();
        let prices: Vec<f64> = ranked.iter().map(|p| p.average_price).collect();
        let segments: Vec<&str> = ranked.iter().map(|p| p.segment.as_str()).collect();

        let df = df!(
            "customer_level" => keys,
            "average_price" => prices,
            "segment" => segments,
        )?;
        Ok(df)
    }

    /// Write the ranked table as CSV
    pub fn write_csv(&self, output_path: impl AsRef<Path>) -> crate::Result<()> {
        let mut df = self.to_frame()?;
        let mut file = File::create(output_path.as_ref())?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        info!(path = %output_path.as_ref().display(), rows = df.height(), "wrote segment table");
        Ok(())
    }
}

/// Run the full pipeline over validated transactions
///
/// # Arguments
/// * `transactions` - Ingested sales records
/// * `config` - Age bound and averaging mode
///
/// # Returns
/// * `SegmentTable` with exactly one persona per customer-level key
pub fn fit_segments(
    transactions: &[Transaction],
    config: &PipelineConfig,
) -> crate::Result<SegmentTable> {
    if transactions.is_empty() {
        return Err(SegmentError::EmptyInput);
    }

    let groups = aggregate_groups(transactions);

    let bins = match config.max_age {
        Some(max_age) => AgeBins::new(max_age)?,
        None => {
            let observed = max_group_age(&groups).unwrap_or(0);
            let bins = AgeBins::from_observed_max(observed);
            debug!(observed, max_age = bins.max_age(), "age bins from data");
            bins
        }
    };

    let keys = aggregate_keys(&groups, &bins, config.averaging)?;
    let personas = assign_segments(keys)?;

    info!(
        transactions = transactions.len(),
        groups = groups.len(),
        personas = personas.len(),
        "fitted segment table"
    );

    Ok(SegmentTable {
        personas: personas.into_iter().map(|p| (p.key.clone(), p)).collect(),
        bins,
    })
}

/// Predict segment and expected spend for a raw customer profile
pub fn predict_segment<'a>(
    table: &'a SegmentTable,
    country: &str,
    source: Platform,
    sex: Sex,
    age: i64,
) -> crate::Result<Lookup<'a>> {
    table.lookup_profile(country, source, sex, age)
}
