//! Exploratory dataset profile computed with Polars group-bys

use polars::prelude::*;

use crate::data::{transactions_to_frame, Transaction};

/// Sales statistics for one group value (a country, a source, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct SalesStat {
    pub group: String,
    pub sales: u64,
    pub revenue: f64,
    pub mean_price: f64,
}

/// Summary of the raw transaction table before segmentation
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetProfile {
    pub rows: usize,
    pub distinct_prices: usize,
    pub distinct_sources: usize,
    pub by_source: Vec<SalesStat>,
    pub by_country: Vec<SalesStat>,
    /// Keyed `country/source`
    pub by_country_source: Vec<SalesStat>,
}

/// Profile the transactions: counts, revenue and mean price per source,
/// per country and per country-source pair
pub fn profile_transactions(transactions: &[Transaction]) -> crate::Result<DatasetProfile> {
    let df = transactions_to_frame(transactions)?;

    let distinct_prices = df.column("price")?.n_unique()?;
    let distinct_sources = df.column("source")?.n_unique()?;

    let mut by_source = sales_by(&df, &["source"])?;
    let mut by_country = sales_by(&df, &["country"])?;
    let mut by_country_source = sales_by(&df, &["country", "source"])?;

    // Most sales first for sources, most revenue first for countries
    by_source.sort_by(|a, b| b.sales.cmp(&a.sales).then_with(|| a.group.cmp(&b.group)));
    by_country.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then_with(|| a.group.cmp(&b.group))
    });
    by_country_source.sort_by(|a, b| a.group.cmp(&b.group));

    Ok(DatasetProfile {
        rows: df.height(),
        distinct_prices,
        distinct_sources,
        by_source,
        by_country,
        by_country_source,
    })
}

/// Group by `keys` and compute count, sum and mean of price
fn sales_by(df: &DataFrame, keys: &[&str]) -> crate::Result<Vec<SalesStat>> {
    let grouped = df
        .clone()
        .lazy()
        .group_by(keys.iter().map(|k| col(k)).collect::<Vec<_>>())
        .agg([
            col("price").count().alias("sales"),
            col("price").sum().alias("revenue"),
            col("price").mean().alias("mean_price"),
        ])
        .collect()?;

    let mut labels: Vec<Vec<String>> = vec![Vec::new(); grouped.height()];
    for key in keys {
        let column = grouped.column(key)?.str()?;
        for (label, value) in labels.iter_mut().zip(column.into_iter()) {
            label.push(value.unwrap_or_default().to_string());
        }
    }

    let sales = grouped.column("sales")?.cast(&DataType::UInt64)?;
    let revenue = grouped.column("revenue")?.f64()?;
    let mean_price = grouped.column("mean_price")?.f64()?;

    let stats = labels
        .into_iter()
        .zip(sales.u64()?.into_iter())
        .zip(revenue.into_iter())
        .zip(mean_price.into_iter())
        .map(|(((label, sales), revenue), mean_price)| SalesStat {
            group: label.join("/"),
            sales: sales.unwrap_or(0),
            revenue: revenue.unwrap_or(0.0),
            mean_price: mean_price.unwrap_or(f64::NAN),
        })
        .collect();

    Ok(stats)
}
