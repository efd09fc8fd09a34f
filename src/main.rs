//! PersonaSeg: customer-level segmentation CLI
//!
//! This is the main entrypoint that orchestrates data loading, segmentation,
//! export, visualization, and lookup.

use anyhow::Result;
use clap::Parser;
use personaseg::cli::CustomerProfile;
use personaseg::{
    fit_segments, load_transactions, predict_segment, profile_transactions, viz, Args, Lookup,
    SegmentTable,
};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let profile = args.parse_profile()?;
    let table = run_pipeline(&args)?;

    if let Some(profile) = profile {
        run_prediction_mode(&args, &table, &profile)?;
    }
    if let Some(ref key) = args.lookup {
        run_lookup_mode(&args, &table, key)?;
    }

    Ok(())
}

/// Load, segment and report on the input data
fn run_pipeline(args: &Args) -> Result<SegmentTable> {
    let start_time = Instant::now();
    let config = args.pipeline_config();

    if args.verbose {
        println!("PersonaSeg - Rule-Based Customer Segmentation");
        println!("=============================================\n");
        println!("Input file: {}", args.input);
    }

    let report = load_transactions(&args.input, config.malformed)?;
    println!(
        "✓ Data loaded: {} transactions ({} skipped)",
        report.transactions.len(),
        report.skipped
    );

    if args.profile {
        let profile = profile_transactions(&report.transactions)?;
        viz::print_profile(&profile);
    }

    let table = fit_segments(&report.transactions, &config)?;
    println!(
        "✓ Segments fitted: {} personas (age buckets up to {})",
        table.len(),
        table.bins().max_age()
    );

    // Predictions and lookups only need the table
    if args.predict.is_none() && args.lookup.is_none() {
        viz::print_segment_report(&table, args.top);
    }

    if let Some(ref output) = args.output {
        table.write_csv(output)?;
        println!("Segment table saved to: {}", output);
    }
    if let Some(ref chart) = args.chart {
        viz::create_segment_chart(&table, chart)?;
    }

    if args.verbose {
        println!(
            "Total processing time: {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(table)
}

/// Predict segment and expected spend for a raw customer profile
fn run_prediction_mode(args: &Args, table: &SegmentTable, profile: &CustomerProfile) -> Result<()> {
    println!("\n=== Prediction Mode ===");
    println!(
        "Input profile: country={}, source={}, sex={}, age={}",
        profile.country, profile.source, profile.sex, profile.age
    );

    let lookup = predict_segment(
        table,
        &profile.country,
        profile.source.clone(),
        profile.sex,
        profile.age,
    )?;
    print_lookup(args, &lookup)
}

fn run_lookup_mode(args: &Args, table: &SegmentTable, key: &str) -> Result<()> {
    println!("\n=== Lookup Mode ===");
    let lookup = table.lookup(key);
    print_lookup(args, &lookup)
}

fn print_lookup(args: &Args, lookup: &Lookup<'_>) -> Result<()> {
    match lookup {
        Lookup::Found(persona) if args.json => {
            println!("{}", serde_json::to_string_pretty(persona)?);
        }
        Lookup::Found(persona) => {
            println!("\n✓ Persona: {}", persona.key);
            println!("  Segment: {}", persona.segment);
            println!("  Expected average spend: {:.2}", persona.average_price);
        }
        Lookup::NotFound(key) if args.json => {
            println!("{}", serde_json::json!({ "customer_level": key, "found": false }));
        }
        Lookup::NotFound(key) => {
            println!("\n✗ No historical data for persona {}", key);
        }
    }
    Ok(())
}
