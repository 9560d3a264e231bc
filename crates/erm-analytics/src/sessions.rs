//! Session inference from inactivity gaps.
//!
//! A session is a run of consecutive activities (in timestamp order) by one
//! user with no gap longer than the threshold. Any change of acting user closes
//! the open session, even when the time delta is small.

use crate::filter::TimedActivity;
use crate::math::{round1, round_half_up};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Inactivity gap that closes a session.
pub const DEFAULT_SESSION_GAP_MINUTES: i64 = 30;

/// Number of sessions kept for display.
pub const DEFAULT_RECENT_SESSIONS: usize = 20;

/// A reconstructed, non-persisted usage session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Display name of the acting user.
    pub user: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub activity_count: usize,
    /// `last_activity - start_time`, frozen when the session closes.
    pub duration_secs: i64,
}

/// Sessions for a period plus their summary statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub sessions: Vec<Session>,
    pub total_sessions: usize,
    /// Mean duration in whole minutes.
    pub avg_duration_minutes: i64,
    /// Mean activities per session, one decimal.
    pub avg_activities_per_session: f64,
    /// Latest sessions first, for display.
    pub recent: Vec<Session>,
}

struct OpenSession<'a> {
    identity: &'a str,
    user: &'a str,
    start_time: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    activity_count: usize,
}

impl OpenSession<'_> {
    fn close(self) -> Session {
        Session {
            user: self.user.to_string(),
            start_time: self.start_time,
            last_activity: self.last_activity,
            activity_count: self.activity_count,
            duration_secs: (self.last_activity - self.start_time).num_seconds(),
        }
    }
}

/// Cluster activities into sessions.
///
/// Works on a stably sorted copy, so records sharing a timestamp keep their
/// relative input order. The caller's slice is left as given.
pub fn reconstruct_sessions(activities: &[TimedActivity<'_>], gap: Duration) -> Vec<Session> {
    let mut ordered: Vec<&TimedActivity<'_>> = activities.iter().collect();
    ordered.sort_by_key(|a| a.at);

    let mut sessions = Vec::new();
    let mut current: Option<OpenSession<'_>> = None;

    for activity in ordered {
        let identity = activity.record.identity();
        if let Some(open) = current
            .as_mut()
            .filter(|open| open.identity == identity && activity.at - open.last_activity <= gap)
        {
            open.last_activity = activity.at;
            open.activity_count += 1;
            continue;
        }

        if let Some(done) = current.take() {
            sessions.push(done.close());
        }
        current = Some(OpenSession {
            identity,
            user: activity.record.display_name(),
            start_time: activity.at,
            last_activity: activity.at,
            activity_count: 1,
        });
    }
    if let Some(done) = current {
        sessions.push(done.close());
    }
    sessions
}

/// Summary statistics over reconstructed sessions. Empty input gives zeros.
pub fn summarize_sessions(sessions: Vec<Session>, recent_limit: usize) -> SessionSummary {
    if sessions.is_empty() {
        return SessionSummary::default();
    }

    let count = sessions.len() as f64;
    let total_secs: i64 = sessions.iter().map(|s| s.duration_secs).sum();
    let total_activities: usize = sessions.iter().map(|s| s.activity_count).sum();

    let mut recent = sessions.clone();
    recent.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    recent.truncate(recent_limit);

    SessionSummary {
        total_sessions: sessions.len(),
        avg_duration_minutes: round_half_up(total_secs as f64 / count / 60.0) as i64,
        avg_activities_per_session: round1(total_activities as f64 / count),
        recent,
        sessions,
    }
}

/// Format seconds as a human-readable duration string.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
