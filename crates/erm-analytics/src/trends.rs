//! Period-over-period comparison.

use crate::engine::PeriodAnalytics;
use crate::math::round_half_up;
use serde::{Deserialize, Serialize};

/// Signed percentage change from `previous` to `current`.
///
/// A zero baseline is defined rather than undefined: any positive current
/// value counts as +100%, and zero to zero is 0%.
pub fn calc_change(current: f64, previous: f64) -> i64 {
    if previous == 0.0 {
        if current > 0.0 {
            100
        } else {
            0
        }
    } else {
        round_half_up((current - previous) / previous * 100.0) as i64
    }
}

/// Percentage change per metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendChanges {
    pub total_activities: i64,
    pub active_users: i64,
    pub participation_rate: i64,
    pub activities_per_day: i64,
    pub total_sessions: i64,
    pub avg_session_duration: i64,
    pub engagement_score: i64,
}

impl TrendChanges {
    pub fn between(current: &PeriodAnalytics, previous: &PeriodAnalytics) -> Self {
        let (c, p) = (&current.engagement, &previous.engagement);
        Self {
            total_activities: calc_change(
                current.total_activities as f64,
                previous.total_activities as f64,
            ),
            active_users: calc_change(c.active_users as f64, p.active_users as f64),
            participation_rate: calc_change(c.participation_rate, p.participation_rate),
            activities_per_day: calc_change(c.activities_per_day, p.activities_per_day),
            total_sessions: calc_change(
                current.sessions.total_sessions as f64,
                previous.sessions.total_sessions as f64,
            ),
            avg_session_duration: calc_change(
                current.sessions.avg_duration_minutes as f64,
                previous.sessions.avg_duration_minutes as f64,
            ),
            engagement_score: calc_change(c.engagement_score as f64, p.engagement_score as f64),
        }
    }

    /// `(label, change)` pairs in display order.
    pub fn entries(&self) -> [(&'static str, i64); 7] {
        [
            ("Activities", self.total_activities),
            ("Active users", self.active_users),
            ("Participation rate", self.participation_rate),
            ("Activities per day", self.activities_per_day),
            ("Sessions", self.total_sessions),
            ("Avg session duration", self.avg_session_duration),
            ("Engagement score", self.engagement_score),
        ]
    }
}

/// Both full passes and their deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub current: PeriodAnalytics,
    pub previous: PeriodAnalytics,
    pub changes: TrendChanges,
}

impl TrendReport {
    pub fn new(current: PeriodAnalytics, previous: PeriodAnalytics) -> Self {
        let changes = TrendChanges::between(&current, &previous);
        Self {
            current,
            previous,
            changes,
        }
    }
}
