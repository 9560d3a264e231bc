//! Activity intelligence for the ERM platform.
//!
//! Turns the append-only activity log into period aggregates, reconstructed
//! sessions, chartable timelines, engagement scores, period-over-period
//! trends, and a bounded history of daily platform snapshots.

pub mod engagement;
pub mod engine;
pub mod filter;
mod math;
pub mod period;
pub mod reports;
pub mod sessions;
pub mod snapshots;
pub mod timeline;
pub mod trends;

pub use engagement::{calculate_engagement, EngagementMetrics, Feature, FeatureUsage};
pub use engine::{Analytics, PeriodAnalytics};
pub use filter::{filter_activities, Scope, TimedActivity};
pub use period::{Period, PeriodRange};
pub use reports::ReportGenerator;
pub use sessions::{reconstruct_sessions, summarize_sessions, Session, SessionSummary};
pub use snapshots::{CaptureOutcome, Snapshot, SnapshotError, SnapshotHistory, SnapshotManager};
pub use timeline::{bucketize, Granularity, TimelineBucket};
pub use trends::{calc_change, TrendChanges, TrendReport};
