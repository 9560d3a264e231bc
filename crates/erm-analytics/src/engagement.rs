//! Participation, activity rate, feature diversity, and the composite
//! engagement score.

use crate::filter::TimedActivity;
use crate::math::{round1, round_half_up};
use crate::period::PeriodRange;
use chrono::{FixedOffset, NaiveDate};
use erm_core::types::{ActivityAction, ActivityKind, ActivityRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Score weight of the participation rate (out of 100).
const PARTICIPATION_WEIGHT: f64 = 0.40;
/// Points per average daily activity, capped at `ACTIVITY_CAP`.
const ACTIVITY_POINTS_PER_DAILY_ACTION: f64 = 5.0;
const ACTIVITY_CAP: f64 = 30.0;
/// Points for using all feature buckets.
const FEATURE_WEIGHT: f64 = 30.0;

/// The six closed feature buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Risks,
    Controls,
    Reports,
    Ai,
    Exports,
    Team,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Risks,
        Feature::Controls,
        Feature::Reports,
        Feature::Ai,
        Feature::Exports,
        Feature::Team,
    ];

    /// The single bucket an activity counts toward, if any.
    ///
    /// First match wins: exports, then AI, then the type buckets. Auth and
    /// unrecognized records belong to no bucket.
    pub fn classify(record: &ActivityRecord) -> Option<Self> {
        if record.action == ActivityAction::Exported {
            Some(Self::Exports)
        } else if record.kind == ActivityKind::Ai || record.action == ActivityAction::AiCall {
            Some(Self::Ai)
        } else {
            match record.kind {
                ActivityKind::Risk => Some(Self::Risks),
                ActivityKind::Control => Some(Self::Controls),
                ActivityKind::Report => Some(Self::Reports),
                ActivityKind::User => Some(Self::Team),
                _ => None,
            }
        }
    }
}

/// Per-bucket activity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUsage {
    pub risks: usize,
    pub controls: usize,
    pub reports: usize,
    pub ai: usize,
    pub exports: usize,
    pub team: usize,
}

impl FeatureUsage {
    pub fn get(&self, feature: Feature) -> usize {
        match feature {
            Feature::Risks => self.risks,
            Feature::Controls => self.controls,
            Feature::Reports => self.reports,
            Feature::Ai => self.ai,
            Feature::Exports => self.exports,
            Feature::Team => self.team,
        }
    }

    fn bump(&mut self, feature: Feature) {
        let slot = match feature {
            Feature::Risks => &mut self.risks,
            Feature::Controls => &mut self.controls,
            Feature::Reports => &mut self.reports,
            Feature::Ai => &mut self.ai,
            Feature::Exports => &mut self.exports,
            Feature::Team => &mut self.team,
        };
        *slot += 1;
    }

    /// Number of buckets with at least one activity.
    pub fn features_used(&self) -> usize {
        Feature::ALL.iter().filter(|f| self.get(**f) > 0).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    pub total_users: u64,
    pub active_users: usize,
    /// Active share of registered users, percent, capped at 100.
    pub participation_rate: f64,
    pub avg_daily_active_users: f64,
    pub activities_per_user: f64,
    pub activities_per_day: f64,
    pub days_in_period: u64,
    pub total_activities: usize,
    pub feature_usage: FeatureUsage,
    pub features_used: usize,
    /// Composite score in `[0, 100]`; 0 when there are no registered users.
    pub engagement_score: u32,
}

/// Engagement metrics for activities already filtered to `range`.
///
/// Users are distinguished by `ActivityRecord::identity`. Daily active users
/// are averaged over the calendar days in `offset` that had any activity.
pub fn calculate_engagement(
    activities: &[TimedActivity<'_>],
    range: &PeriodRange,
    total_users: u64,
    offset: FixedOffset,
) -> EngagementMetrics {
    let total = activities.len();
    let days_in_period = range.days();

    let mut users: HashSet<&str> = HashSet::new();
    let mut daily_users: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    let mut feature_usage = FeatureUsage::default();

    for activity in activities {
        let identity = activity.record.identity();
        users.insert(identity);
        daily_users
            .entry(activity.at.with_timezone(&offset).date_naive())
            .or_default()
            .insert(identity);
        if let Some(feature) = Feature::classify(activity.record) {
            feature_usage.bump(feature);
        }
    }

    let active_users = users.len();
    let participation_rate = if total_users == 0 {
        0.0
    } else {
        (active_users as f64 / total_users as f64 * 100.0).min(100.0)
    };
    let avg_daily_active_users = if daily_users.is_empty() {
        0.0
    } else {
        let sum: usize = daily_users.values().map(HashSet::len).sum();
        sum as f64 / daily_users.len() as f64
    };
    let activities_per_user = if active_users == 0 {
        0.0
    } else {
        total as f64 / active_users as f64
    };
    let activities_per_day = total as f64 / days_in_period as f64;
    let features_used = feature_usage.features_used();

    let engagement_score = if total_users == 0 {
        0
    } else {
        let raw = participation_rate * PARTICIPATION_WEIGHT
            + (activities_per_day * ACTIVITY_POINTS_PER_DAILY_ACTION).min(ACTIVITY_CAP)
            + features_used as f64 / Feature::ALL.len() as f64 * FEATURE_WEIGHT;
        round_half_up(raw).clamp(0.0, 100.0) as u32
    };

    EngagementMetrics {
        total_users,
        active_users,
        participation_rate: round1(participation_rate),
        avg_daily_active_users: round1(avg_daily_active_users),
        activities_per_user: round1(activities_per_user),
        activities_per_day: round1(activities_per_day),
        days_in_period,
        total_activities: total,
        feature_usage,
        features_used,
        engagement_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erm_core::types::parse_instant;

    fn rec(user: &str, kind: &str, action: &str, ts: &str) -> ActivityRecord {
        ActivityRecord::new(kind, action, user, parse_instant(ts).unwrap())
    }

    fn timed(records: &[ActivityRecord]) -> Vec<TimedActivity<'_>> {
        records
            .iter()
            .map(|record| TimedActivity {
                record,
                at: record.parsed_timestamp().unwrap(),
            })
            .collect()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn one_day() -> PeriodRange {
        PeriodRange::new(
            parse_instant("2024-01-01T00:00:00Z").unwrap(),
            parse_instant("2024-01-02T00:00:00Z").unwrap(),
        )
    }

    #[test]
    fn test_classify_precedence() {
        let ts = "2024-01-01T09:00:00Z";
        assert_eq!(Feature::classify(&rec("a", "risk", "created", ts)), Some(Feature::Risks));
        assert_eq!(Feature::classify(&rec("a", "report", "exported", ts)), Some(Feature::Exports));
        assert_eq!(Feature::classify(&rec("a", "risk", "ai_call", ts)), Some(Feature::Ai));
        assert_eq!(Feature::classify(&rec("a", "ai", "created", ts)), Some(Feature::Ai));
        assert_eq!(Feature::classify(&rec("a", "user", "created", ts)), Some(Feature::Team));
        assert_eq!(Feature::classify(&rec("a", "auth", "login", ts)), None);
        assert_eq!(Feature::classify(&rec("a", "incident", "created", ts)), None);
    }

    #[test]
    fn test_amy_and_beth_scenario() {
        let log = vec![
            rec("Amy", "risk", "created", "2024-01-01T09:00:00Z"),
            rec("Amy", "control", "updated", "2024-01-01T09:10:00Z"),
            rec("Beth", "report", "exported", "2024-01-01T09:10:05Z"),
        ];
        let metrics = calculate_engagement(&timed(&log), &one_day(), 2, utc());

        assert_eq!(metrics.active_users, 2);
        assert_eq!(metrics.participation_rate, 100.0);
        assert_eq!(
            metrics.feature_usage,
            FeatureUsage {
                risks: 1,
                controls: 1,
                reports: 0,
                ai: 0,
                exports: 1,
                team: 0,
            }
        );
        assert_eq!(metrics.features_used, 3);
        assert_eq!(metrics.avg_daily_active_users, 2.0);
        assert_eq!(metrics.activities_per_user, 1.5);
        assert_eq!(metrics.activities_per_day, 3.0);
        // 40 + min(15, 30) + 3/6 * 30 = 70
        assert_eq!(metrics.engagement_score, 70);
    }

    #[test]
    fn test_no_registered_users_scores_zero() {
        let log = vec![rec("Amy", "risk", "created", "2024-01-01T09:00:00Z")];
        let metrics = calculate_engagement(&timed(&log), &one_day(), 0, utc());
        assert_eq!(metrics.engagement_score, 0);
        assert_eq!(metrics.participation_rate, 0.0);
        assert_eq!(metrics.active_users, 1);
    }

    #[test]
    fn test_empty_input_is_zero_not_nan() {
        let metrics = calculate_engagement(&[], &one_day(), 10, utc());
        assert_eq!(metrics.active_users, 0);
        assert_eq!(metrics.avg_daily_active_users, 0.0);
        assert_eq!(metrics.activities_per_user, 0.0);
        assert_eq!(metrics.activities_per_day, 0.0);
        assert_eq!(metrics.engagement_score, 0);
    }

    #[test]
    fn test_score_stays_bounded_with_more_actors_than_users() {
        let kinds = ["risk", "control", "report", "ai", "user"];
        let mut log = Vec::new();
        for i in 0..200 {
            let kind = kinds[i % kinds.len()];
            let action = if i % 7 == 0 { "exported" } else { "created" };
            log.push(rec(&format!("user-{}", i), kind, action, "2024-01-01T12:00:00Z"));
        }
        let metrics = calculate_engagement(&timed(&log), &one_day(), 3, utc());
        assert_eq!(metrics.participation_rate, 100.0);
        assert_eq!(metrics.features_used, 6);
        assert_eq!(metrics.engagement_score, 100);
    }

    #[test]
    fn test_daily_active_users_skip_idle_days() {
        let log = vec![
            rec("Amy", "risk", "created", "2024-01-01T09:00:00Z"),
            rec("Beth", "risk", "created", "2024-01-01T10:00:00Z"),
            rec("Amy", "risk", "updated", "2024-01-05T09:00:00Z"),
        ];
        let week = PeriodRange::new(
            parse_instant("2024-01-01T00:00:00Z").unwrap(),
            parse_instant("2024-01-08T00:00:00Z").unwrap(),
        );
        let metrics = calculate_engagement(&timed(&log), &week, 4, utc());
        // Days with activity: Jan 1 (2 users), Jan 5 (1 user).
        assert_eq!(metrics.avg_daily_active_users, 1.5);
        assert_eq!(metrics.days_in_period, 7);
        assert_eq!(metrics.activities_per_day, 0.4);
        assert_eq!(metrics.participation_rate, 50.0);
    }

    #[test]
    fn test_daily_active_users_use_local_days() {
        // Both fall on 2024-01-02 in Tokyo but on different UTC days.
        let log = vec![
            rec("Amy", "risk", "created", "2024-01-01T16:00:00Z"),
            rec("Beth", "risk", "created", "2024-01-02T05:00:00Z"),
        ];
        let week = PeriodRange::new(
            parse_instant("2024-01-01T00:00:00Z").unwrap(),
            parse_instant("2024-01-08T00:00:00Z").unwrap(),
        );
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();

        let local = calculate_engagement(&timed(&log), &week, 2, tokyo);
        assert_eq!(local.avg_daily_active_users, 2.0);
        let by_utc = calculate_engagement(&timed(&log), &week, 2, utc());
        assert_eq!(by_utc.avg_daily_active_users, 1.0);
    }
}
