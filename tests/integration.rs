//! Integration tests for PersonaSeg

use personaseg::{
    fit_segments, load_transactions, predict_segment, profile_transactions, Averaging, Lookup,
    MalformedPolicy, PipelineConfig, Platform, Segment, SegmentError, Sex,
};
use std::collections::HashSet;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Create a test CSV file with sample data
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "PRICE,SOURCE,SEX,COUNTRY,AGE").unwrap();

    // Brazilian android teenagers, same group three times
    writeln!(file, "39,android,male,bra,17").unwrap();
    writeln!(file, "39,android,male,bra,17").unwrap();
    writeln!(file, "49,android,male,bra,17").unwrap();

    // Turkish customers across buckets
    writeln!(file, "29,android,male,tur,17").unwrap();
    writeln!(file, "49,android,female,tur,33").unwrap();
    writeln!(file, "19,android,female,tur,35").unwrap();
    writeln!(file, "59,ios,male,tur,25").unwrap();

    // US and French customers
    writeln!(file, "9,ios,female,usa,45").unwrap();
    writeln!(file, "79,ios,male,usa,21").unwrap();
    writeln!(file, "99,android,female,fra,66").unwrap();
    writeln!(file, "14,ios,female,fra,0").unwrap();

    file
}

fn fit_test_table() -> personaseg::SegmentTable {
    let test_file = create_test_csv();
    let report = load_transactions(test_file.path(), MalformedPolicy::FailFast).unwrap();
    fit_segments(&report.transactions, &PipelineConfig::default()).unwrap()
}

#[test]
fn test_end_to_end_pipeline() {
    let table = fit_test_table();

    // 9 exact groups collapse into 8 customer-level keys (tur female 33 and 35)
    assert_eq!(table.len(), 8);
    assert_eq!(table.bins().max_age(), 66);

    let persona = table.lookup("BRA_ANDROID_MALE_0_18").persona().unwrap();
    assert!((persona.average_price - 42.333_333).abs() < 1e-4);

    // Mean of the two group means, 49 and 19
    let merged = table.lookup("TUR_ANDROID_FEMALE_31_40").persona().unwrap();
    assert!((merged.average_price - 34.0).abs() < 1e-9);

    // Age zero lands in the first bucket
    assert!(table.lookup("FRA_IOS_FEMALE_0_18").is_found());
    assert!(table.lookup("FRA_ANDROID_FEMALE_41_+").is_found());
}

#[test]
fn test_keys_are_unique() {
    let table = fit_test_table();

    let keys: HashSet<String> = table.iter().map(|p| p.key.to_string()).collect();
    assert_eq!(keys.len(), table.len());
}

#[test]
fn test_segments_are_monotonic() {
    let table = fit_test_table();

    let min_a = table
        .iter()
        .filter(|p| p.segment == Segment::A)
        .map(|p| p.average_price)
        .fold(f64::INFINITY, f64::min);
    let max_d = table
        .iter()
        .filter(|p| p.segment == Segment::D)
        .map(|p| p.average_price)
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(min_a >= max_d);

    // 8 personas split into 4 quartiles of 2
    for summary in table.summary() {
        assert_eq!(summary.personas, 2, "segment {}", summary.segment);
    }
}

#[test]
fn test_prediction() {
    let table = fit_test_table();

    let lookup = predict_segment(&table, "tur", Platform::Ios, Sex::Male, 25).unwrap();
    let persona = lookup.persona().unwrap();
    assert_eq!(persona.key.to_string(), "TUR_IOS_MALE_24_30");
    assert_eq!(persona.average_price, 59.0);
    assert_eq!(persona.segment, Segment::B);
}

#[test]
fn test_lookup_miss() {
    let table = fit_test_table();

    match table.lookup("XYZ_ANDROID_MALE_0_18") {
        Lookup::NotFound(key) => assert_eq!(key, "XYZ_ANDROID_MALE_0_18"),
        Lookup::Found(p) => panic!("unexpected persona {:?}", p),
    }
}

#[test]
fn test_pipeline_is_idempotent() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    fit_test_table().write_csv(&first).unwrap();
    fit_test_table().write_csv(&second).unwrap();

    let first = std::fs::read(first).unwrap();
    let second = std::fs::read(second).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    assert!(text.starts_with("customer_level,average_price,segment"));
    assert_eq!(text.lines().count(), 9);
}

#[test]
fn test_weighted_averaging() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "price,source,sex,country,age").unwrap();
    writeln!(file, "40,ios,male,usa,20").unwrap();
    writeln!(file, "40,ios,male,usa,20").unwrap();
    writeln!(file, "40,ios,male,usa,20").unwrap();
    writeln!(file, "80,ios,male,usa,21").unwrap();
    writeln!(file, "10,ios,female,usa,20").unwrap();
    writeln!(file, "20,ios,female,usa,30").unwrap();
    writeln!(file, "30,ios,female,usa,45").unwrap();

    let report = load_transactions(file.path(), MalformedPolicy::FailFast).unwrap();

    let plain = fit_segments(&report.transactions, &PipelineConfig::default()).unwrap();
    let weighted = fit_segments(
        &report.transactions,
        &PipelineConfig {
            averaging: Averaging::Weighted,
            ..PipelineConfig::default()
        },
    )
    .unwrap();

    let key = "USA_IOS_MALE_19_23";
    assert_eq!(plain.lookup(key).persona().unwrap().average_price, 60.0);
    assert_eq!(weighted.lookup(key).persona().unwrap().average_price, 50.0);
}

#[test]
fn test_error_handling_malformed_rows() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "price,source,sex,country,age").unwrap();
    writeln!(file, "39,android,male,bra,17").unwrap();
    writeln!(file, "n/a,android,male,bra,17").unwrap();
    writeln!(file, "49,ios,female,tur,33").unwrap();

    let result = load_transactions(file.path(), MalformedPolicy::FailFast);
    assert!(matches!(
        result,
        Err(SegmentError::MalformedInput { row: 2, field: "price", .. })
    ));

    let report = load_transactions(file.path(), MalformedPolicy::Skip).unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.transactions.len(), 2);
}

#[test]
fn test_error_handling_insufficient_prices() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "price,source,sex,country,age").unwrap();
    writeln!(file, "10,android,male,bra,17").unwrap();
    writeln!(file, "20,android,male,tur,17").unwrap();
    writeln!(file, "10,android,male,usa,17").unwrap();

    let report = load_transactions(file.path(), MalformedPolicy::FailFast).unwrap();
    let result = fit_segments(&report.transactions, &PipelineConfig::default());
    assert!(matches!(
        result,
        Err(SegmentError::InsufficientDistinctPrices { distinct: 2 })
    ));
}

#[test]
fn test_profile() {
    let test_file = create_test_csv();
    let report = load_transactions(test_file.path(), MalformedPolicy::FailFast).unwrap();

    let profile = profile_transactions(&report.transactions).unwrap();
    assert_eq!(profile.rows, 11);
    assert_eq!(profile.distinct_sources, 2);
    assert_eq!(profile.by_source[0].group, "android");
    assert_eq!(profile.by_source[0].sales, 7);
}
