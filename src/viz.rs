//! Segment charts (Plotters, SVG) and console reports

use plotters::prelude::*;

use crate::model::{Segment, SegmentSummary, SegmentTable};
use crate::profile::{DatasetProfile, SalesStat};

/// Color per segment, A first
const SEGMENT_COLORS: [RGBColor; 4] = [GREEN, BLUE, MAGENTA, RED];

fn segment_color(segment: Segment) -> &'static RGBColor {
    match segment {
        Segment::A => &SEGMENT_COLORS[0],
        Segment::B => &SEGMENT_COLORS[1],
        Segment::C => &SEGMENT_COLORS[2],
        Segment::D => &SEGMENT_COLORS[3],
    }
}

/// Bars of the segment chart, lowest segment on the left: (x position, segment, mean price)
pub fn segment_bars(summary: &[SegmentSummary]) -> Vec<(f64, Segment, f64)> {
    let mut bars: Vec<(Segment, f64)> = summary.iter().map(|s| (s.segment, s.mean_price)).collect();
    bars.sort_by(|a, b| b.0.cmp(&a.0));
    bars.into_iter()
        .enumerate()
        .map(|(i, (segment, mean))| (i as f64, segment, mean))
        .collect()
}

/// Draw mean average price per segment as an SVG bar chart
pub fn create_segment_chart(table: &SegmentTable, output_path: &str) -> anyhow::Result<()> {
    let bars = segment_bars(&table.summary());
    if bars.is_empty() {
        anyhow::bail!("Segment table is empty, nothing to draw");
    }
    let max_price = bars.iter().map(|b| b.2).fold(0.0_f64, f64::max).max(1.0);

    let root = SVGBackend::new(output_path, (640, 420)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Average Price by Segment", ("sans-serif", 26))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(bars.len() as f64 - 0.5), 0f64..(max_price * 1.1))?;

    let labels: Vec<Segment> = bars.iter().map(|b| b.1).collect();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&|x| {
            let idx = x.round();
            if (x - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            labels
                .get(idx as usize)
                .map(|s| s.to_string())
                .unwrap_or_default()
        })
        .x_desc("Segment")
        .y_desc("Mean Average Price")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for &(x, segment, mean) in &bars {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.35, 0.0), (x + 0.35, mean)],
            segment_color(segment).filled(),
        )))?;
    }

    root.present()?;
    println!("Segment chart saved to: {}", output_path);

    Ok(())
}

/// Print segment statistics and the top of the ranked table
pub fn print_segment_report(table: &SegmentTable, top: usize) {
    println!("\n=== Segment Summary ===");
    println!("  Segment | Personas | Mean Price | Min Price | Max Price");
    println!("  --------|----------|------------|-----------|----------");
    for s in table.summary() {
        println!(
            "  {:7} | {:8} | {:10.2} | {:9.2} | {:9.2}",
            s.segment, s.personas, s.mean_price, s.min_price, s.max_price
        );
    }

    let ranked = table.ranked();
    println!("\nTop {} personas by average price:", top.min(ranked.len()));
    for persona in ranked.iter().take(top) {
        println!(
            "  {:32} {:10.2}  {}",
            persona.key.to_string(),
            persona.average_price,
            persona.segment
        );
    }
}

fn print_sales_table(title: &str, stats: &[SalesStat]) {
    println!("\n{}:", title);
    for s in stats {
        println!(
            "  {:16} sales={:6} revenue={:12.2} mean={:8.2}",
            s.group, s.sales, s.revenue, s.mean_price
        );
    }
}

/// Print the exploratory dataset profile
pub fn print_profile(profile: &DatasetProfile) {
    println!("\n=== Dataset Profile ===");
    println!("Rows: {}", profile.rows);
    println!("Distinct prices: {}", profile.distinct_prices);
    println!("Distinct sources: {}", profile.distinct_sources);
    print_sales_table("Sales by source", &profile.by_source);
    print_sales_table("Sales by country", &profile.by_country);
    print_sales_table("Sales by country/source", &profile.by_country_source);
}
