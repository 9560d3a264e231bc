//! Fixed-granularity activity timelines for charting.
//!
//! Bucket keys are calendar fields in the caller's offset, the same offset
//! that defines `today` and `yesterday`. Week buckets use ISO-8601
//! week numbering (`%G-W%V`), so the first days of January can belong to the
//! last week of the previous ISO year and late December to week 01.

use crate::filter::TimedActivity;
use chrono::{DateTime, Datelike, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Unknown or missing tokens fall back to `Day`.
    pub fn from_token(token: Option<&str>) -> Self {
        let Some(raw) = token else {
            return Self::default();
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" => Self::Hour,
            "day" => Self::Day,
            "week" => Self::Week,
            "month" => Self::Month,
            other => {
                warn!("Unknown timeline granularity {:?}, using day", other);
                Self::default()
            }
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Bucket key for an instant: `YYYY-MM-DDTHH`, `YYYY-MM-DD`, `YYYY-Www`, or `YYYY-MM`.
    pub fn bucket_key<Tz: TimeZone>(&self, at: DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        match self {
            Self::Hour => at.format("%Y-%m-%dT%H").to_string(),
            Self::Day => at.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let week = at.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Self::Month => at.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Activity counts for one time slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBucket {
    pub bucket_key: String,
    pub count: usize,
    pub counts_by_type: BTreeMap<String, usize>,
}

/// Label used in per-type counts for records without a type tag.
pub const UNTYPED_LABEL: &str = "unknown";

/// Group activities into buckets, ascending by key.
pub fn bucketize(
    activities: &[TimedActivity<'_>],
    granularity: Granularity,
    offset: FixedOffset,
) -> Vec<TimelineBucket> {
    let mut buckets: BTreeMap<String, TimelineBucket> = BTreeMap::new();

    for activity in activities {
        let key = granularity.bucket_key(activity.at.with_timezone(&offset));
        let bucket = buckets.entry(key.clone()).or_insert_with(|| TimelineBucket {
            bucket_key: key,
            ..Default::default()
        });
        bucket.count += 1;

        let kind = match activity.record.kind.as_str() {
            "" => UNTYPED_LABEL,
            other => other,
        };
        *bucket.counts_by_type.entry(kind.to_string()).or_insert(0) += 1;
    }

    buckets.into_values().collect()
}
