//! Data loading and record validation using Polars

use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::SegmentError;
use crate::persona::{normalize_country, Platform, Sex, KEY_DELIMITER};

/// Required input columns, matched case-insensitively against the CSV header
pub const REQUIRED_COLUMNS: [&str; 5] = ["price", "source", "sex", "country", "age"];

/// One sales transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub price: f64,
    pub source: Platform,
    pub sex: Sex,
    /// Lowercase country code
    pub country: String,
    /// Range is checked when binning, not here
    pub age: i64,
}

/// What to do with a row that fails validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Stop at the first malformed row
    #[default]
    FailFast,
    /// Drop malformed rows and count them
    Skip,
}

/// Validated transactions plus ingestion bookkeeping
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub transactions: Vec<Transaction>,
    /// Number of data rows seen, excluding the header
    pub rows_read: usize,
    /// Rows dropped under [`MalformedPolicy::Skip`]
    pub skipped: usize,
}

/// Load the transaction CSV at `file_path`.
///
/// Every cell is read as text and validated into a [`Transaction`], so that a
/// bad value is reported with its row and raw content instead of becoming a
/// null.
pub fn load_transactions(
    file_path: impl AsRef<Path>,
    policy: MalformedPolicy,
) -> crate::Result<IngestReport> {
    let file_path = file_path.as_ref();
    debug!(path = %file_path.display(), "reading transactions");

    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    let report = parse_frame(&df, policy)?;
    info!(
        rows = report.rows_read,
        kept = report.transactions.len(),
        skipped = report.skipped,
        "ingested transactions"
    );
    Ok(report)
}

/// Validate every row of a text-typed frame
pub fn parse_frame(df: &DataFrame, policy: MalformedPolicy) -> crate::Result<IngestReport> {
    let price = text_column(df, "price")?;
    let source = text_column(df, "source")?;
    let sex = text_column(df, "sex")?;
    let country = text_column(df, "country")?;
    let age = text_column(df, "age")?;

    let rows = price
        .into_iter()
        .zip(source.into_iter())
        .zip(sex.into_iter())
        .zip(country.into_iter())
        .zip(age.into_iter())
        .map(|((((price, source), sex), country), age)| RawRow {
            price,
            source,
            sex,
            country,
            age,
        });

    parse_rows(rows, policy)
}

/// A row as it appears in the input, before validation
#[derive(Debug, Clone, Copy, Default)]
pub struct RawRow<'a> {
    pub price: Option<&'a str>,
    pub source: Option<&'a str>,
    pub sex: Option<&'a str>,
    pub country: Option<&'a str>,
    pub age: Option<&'a str>,
}

/// Validate raw rows under `policy`. Row numbers in errors are 1-based and
/// count data rows only.
pub fn parse_rows<'a, I>(rows: I, policy: MalformedPolicy) -> crate::Result<IngestReport>
where
    I: IntoIterator<Item = RawRow<'a>>,
{
    let mut report = IngestReport::default();

    for (idx, raw) in rows.into_iter().enumerate() {
        report.rows_read += 1;
        match parse_row(idx + 1, &raw) {
            Ok(transaction) => report.transactions.push(transaction),
            Err(err) => match policy {
                MalformedPolicy::FailFast => return Err(err),
                MalformedPolicy::Skip => {
                    warn!("skipping row: {}", err);
                    report.skipped += 1;
                }
            },
        }
    }

    Ok(report)
}

fn parse_row(row: usize, raw: &RawRow<'_>) -> crate::Result<Transaction> {
    let malformed = |field: &'static str, value: Option<&str>, reason: &str| {
        SegmentError::MalformedInput {
            row,
            field,
            value: value.unwrap_or_default().to_string(),
            reason: reason.to_string(),
        }
    };

    let price_raw = required(raw.price).ok_or_else(|| malformed("price", raw.price, "missing"))?;
    let price: f64 = price_raw
        .parse()
        .map_err(|_| malformed("price", raw.price, "not a number"))?;
    if !price.is_finite() || price < 0.0 {
        return Err(malformed("price", raw.price, "must be a finite non-negative number"));
    }

    let source_raw = required(raw.source).ok_or_else(|| malformed("source", raw.source, "missing"))?;
    let source = Platform::parse(source_raw)
        .ok_or_else(|| malformed("source", raw.source, "not a platform token"))?;

    let sex_raw = required(raw.sex).ok_or_else(|| malformed("sex", raw.sex, "missing"))?;
    let sex = Sex::parse(sex_raw).ok_or_else(|| malformed("sex", raw.sex, "expected male or female"))?;

    let country = normalize_country(
        required(raw.country).ok_or_else(|| malformed("country", raw.country, "missing"))?,
    );
    if country.contains(KEY_DELIMITER) {
        return Err(malformed("country", raw.country, "contains the key delimiter"));
    }

    let age_raw = required(raw.age).ok_or_else(|| malformed("age", raw.age, "missing"))?;
    let age: i64 = age_raw
        .parse()
        .map_err(|_| malformed("age", raw.age, "not an integer"))?;

    Ok(Transaction {
        price,
        source,
        sex,
        country,
        age,
    })
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Find a required column by case-insensitive name and view it as text
fn text_column<'a>(df: &'a DataFrame, name: &'static str) -> crate::Result<&'a StringChunked> {
    let actual = df
        .get_column_names()
        .into_iter()
        .find(|column| column.trim().eq_ignore_ascii_case(name))
        .ok_or(SegmentError::MissingColumn { column: name })?;

    Ok(df.column(actual)?.str()?)
}

/// Build a typed frame (`price`, `source`, `sex`, `country`, `age`) from
/// validated transactions
pub fn transactions_to_frame(transactions: &[Transaction]) -> crate::Result<DataFrame> {
    let price: Vec<f64> = transactions.iter().map(|t| t.price).collect();
    let source: Vec<&str> = transactions.iter().map(|t| t.source.as_str()).collect();
    let sex: Vec<&str> = transactions.iter().map(|t| t.sex.as_str()).collect();
    let country: Vec<&str> = transactions.iter().map(|t| t.country.as_str()).collect();
    let age: Vec<i64> = transactions.iter().map(|t| t.age).collect();

    let df = df!(
        "price" => price,
        "source" => source,
        "sex" => sex,
        "country" => country,
        "age" => age,
    )?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "PRICE,SOURCE,SEX,COUNTRY,AGE").unwrap();
        writeln!(file, "39,android,male,bra,17").unwrap();
        writeln!(file, "39,android,male,bra,17").unwrap();
        writeln!(file, "49,android,male,bra,17").unwrap();
        writeln!(file, "29,android,male,tur,17").unwrap();
        writeln!(file, "49,ios,female,tur,33").unwrap();
        file
    }

    fn row<'a>(price: &'a str, source: &'a str, sex: &'a str, country: &'a str, age: &'a str) -> RawRow<'a> {
        RawRow {
            price: Some(price),
            source: Some(source),
            sex: Some(sex),
            country: Some(country),
            age: Some(age),
        }
    }

    #[test]
    fn test_load_transactions() {
        let test_file = create_test_csv();
        let report = load_transactions(test_file.path(), MalformedPolicy::FailFast).unwrap();

        assert_eq!(report.rows_read, 5);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.transactions.len(), 5);
        assert_eq!(
            report.transactions[4],
            Transaction {
                price: 49.0,
                source: Platform::Ios,
                sex: Sex::Female,
                country: "tur".to_string(),
                age: 33,
            }
        );
    }

    #[test]
    fn test_missing_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "price,source,sex,country").unwrap();
        writeln!(file, "39,android,male,bra").unwrap();

        let result = load_transactions(file.path(), MalformedPolicy::FailFast);
        assert!(matches!(
            result,
            Err(SegmentError::MissingColumn { column: "age" })
        ));
    }

    #[test]
    fn test_fail_fast_reports_row_and_value() {
        let rows = vec![
            row("39", "android", "male", "bra", "17"),
            row("abc", "android", "male", "bra", "17"),
        ];

        match parse_rows(rows, MalformedPolicy::FailFast) {
            Err(SegmentError::MalformedInput { row, field, value, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(field, "price");
                assert_eq!(value, "abc");
            }
            other => panic!("expected malformed input, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_counts_bad_rows() {
        let rows = vec![
            row("39", "android", "male", "bra", "17"),
            row("39", "android", "unknown", "bra", "17"),
            row("39", "android", "male", "bra", "seventeen"),
            RawRow {
                country: None,
                ..row("39", "ios", "female", "", "20")
            },
            row("59", "ios", "female", "tur", "20"),
        ];

        let report = parse_rows(rows, MalformedPolicy::Skip).unwrap();
        assert_eq!(report.rows_read, 5);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.transactions.len(), 2);
    }

    #[test]
    fn test_negative_age_is_kept_for_binning() {
        let report = parse_rows(vec![row("10", "ios", "male", "usa", "-3")], MalformedPolicy::FailFast).unwrap();
        assert_eq!(report.transactions[0].age, -3);
    }

    #[test]
    fn test_rejects_negative_price() {
        let result = parse_rows(vec![row("-1", "ios", "male", "usa", "30")], MalformedPolicy::FailFast);
        assert!(matches!(
            result,
            Err(SegmentError::MalformedInput { field: "price", .. })
        ));
    }

    #[test]
    fn test_transactions_to_frame() {
        let test_file = create_test_csv();
        let report = load_transactions(test_file.path(), MalformedPolicy::FailFast).unwrap();

        let df = transactions_to_frame(&report.transactions).unwrap();
        assert_eq!(df.height(), 5);
        assert_eq!(df.width(), 5);
    }
}
