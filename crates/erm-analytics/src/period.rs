//! Period tokens and their resolution to half-open instant ranges.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A named reporting window, or an explicit range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Local calendar day containing "now".
    Today,
    /// The previous local calendar day, midnight to midnight.
    Yesterday,
    /// Rolling 7 days ending now.
    #[default]
    Week,
    /// Rolling 30 days ending now.
    Month,
    /// Rolling 90 days ending now.
    Quarter,
    /// Rolling 365 days ending now.
    Year,
    /// Unix epoch to now.
    Lifetime,
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Period {
    /// Parse a named period token.
    ///
    /// Unknown or missing tokens fall back to `Week` (rolling 7 days ending
    /// now). The fallback is logged, never an error.
    pub fn from_token(token: Option<&str>) -> Self {
        let Some(raw) = token else {
            return Self::default();
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "today" => Self::Today,
            "yesterday" => Self::Yesterday,
            "week" => Self::Week,
            "month" => Self::Month,
            "quarter" => Self::Quarter,
            "year" => Self::Year,
            "lifetime" => Self::Lifetime,
            other => {
                warn!("Unknown period token {:?}, using week", other);
                Self::default()
            }
        }
    }

    pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Custom { start, end }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
            Self::Lifetime => "lifetime",
            Self::Custom { .. } => "custom",
        }
    }

    /// Resolve against `now`, whose offset defines local calendar days.
    pub fn resolve(&self, now: DateTime<FixedOffset>) -> PeriodRange {
        let now_utc = now.with_timezone(&Utc);
        let rolling = |days: i64| PeriodRange::new(now_utc - Duration::days(days), now_utc);

        match *self {
            Self::Today => {
                let start = local_midnight(now.date_naive(), *now.offset());
                PeriodRange::new(start, start + Duration::days(1))
            }
            Self::Yesterday => {
                let end = local_midnight(now.date_naive(), *now.offset());
                PeriodRange::new(end - Duration::days(1), end)
            }
            Self::Week => rolling(7),
            Self::Month => rolling(30),
            Self::Quarter => rolling(90),
            Self::Year => rolling(365),
            Self::Lifetime => PeriodRange::new(DateTime::<Utc>::UNIX_EPOCH, now_utc),
            Self::Custom { start, end } => PeriodRange::new(start, end),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom { start, end } => write!(f, "{} .. {}", start.to_rfc3339(), end.to_rfc3339()),
            named => f.write_str(named.token()),
        }
    }
}

/// UTC instant of local midnight on `date` at a fixed offset.
fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
}

/// Half-open `[start, end)` instant range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Whole days covered, rounded up, never less than one.
    pub fn days(&self) -> u64 {
        let millis = (self.end - self.start).num_milliseconds() as f64;
        (millis / MILLIS_PER_DAY).ceil().max(1.0) as u64
    }

    /// The window of equal length ending where this one starts.
    pub fn preceding(&self) -> Self {
        let length = self.end - self.start;
        Self::new(self.start - length, self.start)
    }
}
