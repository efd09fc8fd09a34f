//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::aggregate::Averaging;
use crate::data::MalformedPolicy;
use crate::model::PipelineConfig;
use crate::persona::{Platform, Sex};

/// Rule-based customer segmentation: persona keys, quartile segments and
/// expected spend lookup
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file (price, source, sex, country, age)
    #[arg(short, long, default_value = "persona.csv")]
    pub input: String,

    /// Write the segment table as CSV to this path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write an SVG chart of the segment summary to this path
    #[arg(long)]
    pub chart: Option<String>,

    /// Prediction mode: provide a customer profile as comma-separated string
    /// Example: --predict "tur,ios,male,25"
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Look up a customer-level key, e.g. BRA_ANDROID_MALE_0_18
    #[arg(short, long)]
    pub lookup: Option<String>,

    /// Upper bound of the oldest age bucket (defaults to the oldest age in the data)
    #[arg(long)]
    pub max_age: Option<u32>,

    /// Weight group means by transaction count instead of the plain mean of means
    #[arg(long)]
    pub weighted: bool,

    /// Skip malformed rows instead of stopping at the first one
    #[arg(long)]
    pub skip_malformed: bool,

    /// Print an exploratory profile of the input data
    #[arg(long)]
    pub profile: bool,

    /// Print lookup results as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of top personas to print
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// A raw customer profile given on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub country: String,
    pub source: Platform,
    pub sex: Sex,
    pub age: i64,
}

impl Args {
    /// Parse the customer profile from the predict string
    /// Expected format: "country,source,sex,age"
    pub fn parse_profile(&self) -> anyhow::Result<Option<CustomerProfile>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };

        let parts: Vec<&str> = predict_str.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            anyhow::bail!("Predict values must be in format 'country,source,sex,age'");
        }

        let country = parts[0];
        if country.is_empty() {
            anyhow::bail!("Country must not be empty");
        }
        let source = Platform::parse(parts[1])
            .ok_or_else(|| anyhow::anyhow!("Invalid source value: {}", parts[1]))?;
        let sex = Sex::parse(parts[2])
            .ok_or_else(|| anyhow::anyhow!("Invalid sex value: {}", parts[2]))?;
        let age: i64 = parts[3]
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid age value: {}", parts[3]))?;

        Ok(Some(CustomerProfile {
            country: country.to_ascii_lowercase(),
            source,
            sex,
            age,
        }))
    }

    /// Library configuration implied by the flags
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_age: self.max_age,
            averaging: if self.weighted {
                Averaging::Weighted
            } else {
                Averaging::MeanOfMeans
            },
            malformed: if self.skip_malformed {
                MalformedPolicy::Skip
            } else {
                MalformedPolicy::FailFast
            },
        }
    }
}
