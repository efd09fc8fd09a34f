//! Demographic vocabulary: platforms, sexes, age buckets and the composite
//! customer-level key built from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SegmentError;

/// Delimiter between the four components of a [`CustomerLevelKey`]
pub const KEY_DELIMITER: char = '_';

/// Fixed lower cut points of the age buckets; the last bucket is closed by
/// the data-dependent upper bound held in [`AgeBins`].
pub const AGE_CUTS: [u32; 5] = [0, 18, 23, 30, 40];

/// Device platform the purchase came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Platform {
    Android,
    Ios,
    /// Any other platform token, only built through [`Platform::parse`]
    Other(PlatformName),
}

/// Canonical name of a platform outside the known set: lowercase, trimmed,
/// non-empty and free of the key delimiter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlatformName(String);

impl PlatformName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Platform {
    /// Parse a raw token, case-insensitively. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim().to_ascii_lowercase();
        match token.as_str() {
            "" => None,
            "android" => Some(Platform::Android),
            "ios" => Some(Platform::Ios),
            _ if token.contains(KEY_DELIMITER) => None,
            _ => Some(Platform::Other(PlatformName(token))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Other(name) => name.as_str(),
        }
    }
}

/// Trimmed, lowercase country code shared by every grouping stage
pub fn normalize_country(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Sex::Male),
            "female" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the five ordered age intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBucket {
    UpTo18,
    From19To23,
    From24To30,
    From31To40,
    From41,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 5] = [
        AgeBucket::UpTo18,
        AgeBucket::From19To23,
        AgeBucket::From24To30,
        AgeBucket::From31To40,
        AgeBucket::From41,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AgeBucket::UpTo18 => "0_18",
            AgeBucket::From19To23 => "19_23",
            AgeBucket::From24To30 => "24_30",
            AgeBucket::From31To40 => "31_40",
            AgeBucket::From41 => "41_+",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bucket| bucket.label() == label)
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Age cut points with an explicit upper bound.
///
/// Intervals are right-closed: `[0,18]`, `(18,23]`, `(23,30]`, `(30,40]`,
/// `(40,max_age]`. Zero is included in the first bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBins {
    max_age: u32,
}

impl AgeBins {
    pub fn new(max_age: u32) -> crate::Result<Self> {
        if max_age <= AGE_CUTS[4] {
            return Err(SegmentError::InvalidBins { max_age });
        }
        Ok(Self { max_age })
    }

    /// Bins closed by the largest observed age, widened to 41 when every
    /// observed age fits below the last fixed cut.
    pub fn from_observed_max(observed: u32) -> Self {
        Self {
            max_age: observed.max(AGE_CUTS[4] + 1),
        }
    }

    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    pub fn bucket(&self, age: i64) -> crate::Result<AgeBucket> {
        if age < 0 || age > i64::from(self.max_age) {
            return Err(SegmentError::OutOfRangeAge {
                age,
                min: 0,
                max: i64::from(self.max_age),
            });
        }
        let bucket = match age {
            a if a <= 18 => AgeBucket::UpTo18,
            a if a <= 23 => AgeBucket::From19To23,
            a if a <= 30 => AgeBucket::From24To30,
            a if a <= 40 => AgeBucket::From31To40,
            _ => AgeBucket::From41,
        };
        Ok(bucket)
    }
}

/// Composite persona identity: country, platform, sex and age bucket.
///
/// Rendered uppercase and `_`-joined, e.g. `BRA_ANDROID_MALE_0_18`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CustomerLevelKey {
    country: String,
    source: Platform,
    sex: Sex,
    bucket: AgeBucket,
}

impl CustomerLevelKey {
    pub fn new(country: &str, source: Platform, sex: Sex, bucket: AgeBucket) -> Self {
        Self {
            country: normalize_country(country),
            source,
            sex,
            bucket,
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn source(&self) -> &Platform {
        &self.source
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn bucket(&self) -> AgeBucket {
        self.bucket
    }
}

impl fmt::Display for CustomerLevelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}{d}{}",
            self.country.to_ascii_uppercase(),
            self.source.as_str().to_ascii_uppercase(),
            self.sex.as_str().to_ascii_uppercase(),
            self.bucket.label(),
            d = KEY_DELIMITER
        )
    }
}

/// Reason a string could not be read as a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParseError(pub String);

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid customer-level key: {}", self.0)
    }
}

impl std::error::Error for KeyParseError {}

impl FromStr for CustomerLevelKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let mut parts = normalized.splitn(4, KEY_DELIMITER);
        let (Some(country), Some(source), Some(sex), Some(label)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyParseError(format!("expected 4 components in {s:?}")));
        };

        if country.is_empty() {
            return Err(KeyParseError(format!("empty country in {s:?}")));
        }
        let source = Platform::parse(source)
            .ok_or_else(|| KeyParseError(format!("empty source in {s:?}")))?;
        let sex = Sex::parse(sex)
            .ok_or_else(|| KeyParseError(format!("unknown sex {sex:?}")))?;
        let bucket = AgeBucket::from_label(label)
            .ok_or_else(|| KeyParseError(format!("unknown age bucket {label:?}")))?;

        Ok(CustomerLevelKey::new(country, source, sex, bucket))
    }
}
