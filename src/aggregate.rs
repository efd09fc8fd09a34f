//! Two-pass price aggregation: exact demographic groups first, then the
//! coarser customer-level keys.

use std::collections::BTreeMap;

use tracing::debug;

use crate::data::Transaction;
use crate::persona::{normalize_country, AgeBins, CustomerLevelKey, Platform, Sex};

/// Exact (country, source, sex, age) group. The country is normalized the
/// same way as in [`CustomerLevelKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub country: String,
    pub source: Platform,
    pub sex: Sex,
    pub age: i64,
}

/// Mean price of one exact group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAverage {
    pub key: GroupKey,
    pub mean_price: f64,
    /// Transactions that fell into the group
    pub count: usize,
}

/// How per-group means are combined under a customer-level key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Averaging {
    /// Unweighted mean of the group means
    #[default]
    MeanOfMeans,
    /// Group means weighted by their transaction counts
    Weighted,
}

/// Average price of one customer-level key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAverage {
    pub key: CustomerLevelKey,
    pub average_price: f64,
    /// Exact groups merged into this key
    pub groups: usize,
    /// Transactions behind those groups
    pub transactions: usize,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

/// Mean price per exact (country, source, sex, age) group, ordered by key.
pub fn aggregate_groups(transactions: &[Transaction]) -> Vec<GroupAverage> {
    let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();

    for t in transactions {
        let key = GroupKey {
            country: normalize_country(&t.country),
            source: t.source.clone(),
            sex: t.sex,
            age: t.age,
        };
        let acc = groups.entry(key).or_default();
        acc.sum += t.price;
        acc.count += 1;
    }

    debug!(
        transactions = transactions.len(),
        groups = groups.len(),
        "aggregated exact groups"
    );

    groups
        .into_iter()
        .map(|(key, acc)| GroupAverage {
            key,
            mean_price: acc.sum / acc.count as f64,
            count: acc.count,
        })
        .collect()
}

/// Largest age among the groups, if any are non-negative
pub fn max_group_age(groups: &[GroupAverage]) -> Option<u32> {
    groups
        .iter()
        .map(|g| g.key.age)
        .max()
        .and_then(|age| u32::try_from(age).ok())
}

/// Bin each group's age, build its customer-level key and merge groups that
/// share a key. Output has exactly one row per key, ordered by key.
pub fn aggregate_keys(
    groups: &[GroupAverage],
    bins: &AgeBins,
    averaging: Averaging,
) -> crate::Result<Vec<KeyAverage>> {
    #[derive(Default)]
    struct Merge {
        sum: f64,
        weight: f64,
        groups: usize,
        transactions: usize,
    }

    let mut merged: BTreeMap<CustomerLevelKey, Merge> = BTreeMap::new();

    for group in groups {
        let bucket = bins.bucket(group.key.age)?;
        let key = CustomerLevelKey::new(
            &group.key.country,
            group.key.source.clone(),
            group.key.sex,
            bucket,
        );

        let weight = match averaging {
            Averaging::MeanOfMeans => 1.0,
            Averaging::Weighted => group.count as f64,
        };

        let entry = merged.entry(key).or_default();
        entry.sum += group.mean_price * weight;
        entry.weight += weight;
        entry.groups += 1;
        entry.transactions += group.count;
    }

    debug!(
        groups = groups.len(),
        keys = merged.len(),
        ?averaging,
        "merged groups into customer-level keys"
    );

    Ok(merged
        .into_iter()
        .map(|(key, m)| KeyAverage {
            key,
            average_price: m.sum / m.weight,
            groups: m.groups,
            transactions: m.transactions,
        })
        .collect())
}
