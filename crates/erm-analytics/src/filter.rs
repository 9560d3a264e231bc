//! Period and workspace filtering of the activity log.

use crate::period::PeriodRange;
use chrono::{DateTime, Utc};
use erm_core::types::ActivityRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Workspace scope for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    All,
    Workspace(String),
}

impl Scope {
    /// `None`, an empty token, or `"all"` mean no scope filtering.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            None | Some("") => Self::All,
            Some(t) if t.eq_ignore_ascii_case("all") => Self::All,
            Some(id) => Self::Workspace(id.to_string()),
        }
    }

    /// Records without a workspace tag are always admitted.
    pub fn admits(&self, record: &ActivityRecord) -> bool {
        match self {
            Self::All => true,
            Self::Workspace(id) => record
                .workspace_id
                .as_deref()
                .map_or(true, |ws| ws == id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Workspace(id) => f.write_str(id),
        }
    }
}

/// A log record paired with its parsed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct TimedActivity<'a> {
    pub record: &'a ActivityRecord,
    pub at: DateTime<Utc>,
}

/// Records inside `range` and `scope`, in log order.
///
/// Records whose timestamp is missing or unparseable are dropped.
pub fn filter_activities<'a>(
    activities: &'a [ActivityRecord],
    range: &PeriodRange,
    scope: &Scope,
) -> Vec<TimedActivity<'a>> {
    let mut untimed = 0usize;
    let filtered: Vec<TimedActivity<'a>> = activities
        .iter()
        .filter_map(|record| match record.parsed_timestamp() {
            Some(at) => Some(TimedActivity { record, at }),
            None => {
                untimed += 1;
                None
            }
        })
        .filter(|a| range.contains(a.at) && scope.admits(a.record))
        .collect();

    if untimed > 0 {
        debug!("Dropped {} activities without a parseable timestamp", untimed);
    }
    filtered
}
