//! One full analytics pass over a period, and trend comparison of two passes.
//!
//! The engine holds only tuning; the activity log and "now" are passed in on
//! every call, so the same engine answers any number of queries.

use crate::engagement::{calculate_engagement, EngagementMetrics};
use crate::filter::{filter_activities, Scope, TimedActivity};
use crate::period::{Period, PeriodRange};
use crate::sessions::{
    reconstruct_sessions, summarize_sessions, SessionSummary, DEFAULT_RECENT_SESSIONS,
    DEFAULT_SESSION_GAP_MINUTES,
};
use crate::timeline::{bucketize, Granularity, TimelineBucket};
use crate::trends::TrendReport;
use chrono::{DateTime, Duration, FixedOffset};
use erm_core::config::AnalyticsConfig;
use erm_core::types::ActivityRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Everything computed for one period and scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAnalytics {
    pub period: Period,
    pub range: PeriodRange,
    pub scope: Scope,
    pub total_activities: usize,
    pub activities_by_type: BTreeMap<String, usize>,
    pub activities_by_action: BTreeMap<String, usize>,
    pub engagement: EngagementMetrics,
    pub sessions: SessionSummary,
    pub granularity: Granularity,
    pub timeline: Vec<TimelineBucket>,
}

/// Analytics engine for computing metrics over the activity log.
#[derive(Debug, Clone)]
pub struct Analytics {
    /// Inactivity gap that closes a session.
    session_gap: Duration,
    /// Sessions kept in `SessionSummary::recent`.
    recent_sessions_limit: usize,
    /// Timeline granularity for full passes.
    granularity: Granularity,
}

impl Analytics {
    pub fn new(session_gap_minutes: u32, recent_sessions_limit: usize) -> Self {
        Self {
            session_gap: Duration::minutes(i64::from(session_gap_minutes)),
            recent_sessions_limit,
            granularity: Granularity::default(),
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.session_gap_minutes, config.recent_sessions_limit)
            .with_granularity(Granularity::from_token(Some(&config.default_granularity)))
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Sessions and their summary for already filtered activities.
    pub fn sessions(&self, activities: &[TimedActivity<'_>]) -> SessionSummary {
        summarize_sessions(
            reconstruct_sessions(activities, self.session_gap),
            self.recent_sessions_limit,
        )
    }

    /// Full pass: filter, then aggregate, for one period and scope.
    pub fn analyze(
        &self,
        activities: &[ActivityRecord],
        period: Period,
        scope: &Scope,
        total_users: u64,
        now: DateTime<FixedOffset>,
    ) -> PeriodAnalytics {
        let range = period.resolve(now);
        let offset = *now.offset();
        let filtered = filter_activities(activities, &range, scope);
        debug!(
            "Analyzing {} of {} activities for {} ({})",
            filtered.len(),
            activities.len(),
            period,
            scope
        );

        let mut activities_by_type = BTreeMap::new();
        let mut activities_by_action = BTreeMap::new();
        for activity in &filtered {
            *activities_by_type
                .entry(activity.record.kind.to_string())
                .or_insert(0) += 1;
            *activities_by_action
                .entry(activity.record.action.to_string())
                .or_insert(0) += 1;
        }

        PeriodAnalytics {
            period,
            range,
            scope: scope.clone(),
            total_activities: filtered.len(),
            activities_by_type,
            activities_by_action,
            engagement: calculate_engagement(&filtered, &range, total_users, offset),
            sessions: self.sessions(&filtered),
            granularity: self.granularity,
            timeline: bucketize(&filtered, self.granularity, offset),
        }
    }

    /// Run two full passes and diff them.
    ///
    /// Without an explicit previous period, the window of equal length just
    /// before the current one is used.
    pub fn compare(
        &self,
        activities: &[ActivityRecord],
        current: Period,
        previous: Option<Period>,
        scope: &Scope,
        total_users: u64,
        now: DateTime<FixedOffset>,
    ) -> TrendReport {
        let previous = previous.unwrap_or_else(|| {
            let range = current.resolve(now).preceding();
            Period::custom(range.start, range.end)
        });
        let current = self.analyze(activities, current, scope, total_users, now);
        let previous = self.analyze(activities, previous, scope, total_users, now);
        TrendReport::new(current, previous)
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_GAP_MINUTES as u32, DEFAULT_RECENT_SESSIONS)
    }
}
