//! Markdown report generation from analytics data.
//!
//! Generates period, trend, and snapshot-history reports in markdown format.

use crate::engagement::Feature;
use crate::engine::PeriodAnalytics;
use crate::sessions::format_duration;
use crate::snapshots::Snapshot;
use crate::trends::TrendReport;

/// Report generator for creating markdown summaries.
pub struct ReportGenerator;

impl ReportGenerator {
    /// Generate a report for one analyzed period.
    pub fn period_report(analytics: &PeriodAnalytics) -> String {
        let mut report = String::new();

        report.push_str(&format!(
            "# Activity Report\n\n**{} - {}** ({}, scope: {})\n\n",
            analytics.range.start.format("%B %d, %Y"),
            analytics.range.end.format("%B %d, %Y"),
            analytics.period,
            analytics.scope,
        ));

        // Overview.
        let engagement = &analytics.engagement;
        report.push_str("## Overview\n\n");
        report.push_str(&format!(
            "- **Engagement Score:** {} / 100\n",
            engagement.engagement_score
        ));
        report.push_str(&format!("- **Activities:** {}\n", analytics.total_activities));
        report.push_str(&format!(
            "- **Active Users:** {} of {} ({:.1}%)\n",
            engagement.active_users, engagement.total_users, engagement.participation_rate
        ));
        report.push_str(&format!(
            "- **Avg Daily Active Users:** {:.1}\n",
            engagement.avg_daily_active_users
        ));
        report.push_str(&format!(
            "- **Activities per User:** {:.1}\n",
            engagement.activities_per_user
        ));
        report.push_str(&format!(
            "- **Activities per Day:** {:.1}\n\n",
            engagement.activities_per_day
        ));

        // Feature usage table.
        report.push_str("## Feature Usage\n\n");
        report.push_str("| Feature | Activities |\n");
        report.push_str("|---------|------------|\n");
        for feature in Feature::ALL {
            report.push_str(&format!(
                "| {} | {} |\n",
                feature_label(feature),
                engagement.feature_usage.get(feature)
            ));
        }
        report.push('\n');

        // Sessions.
        let sessions = &analytics.sessions;
        report.push_str("## Sessions\n\n");
        report.push_str(&format!("- **Sessions:** {}\n", sessions.total_sessions));
        report.push_str(&format!(
            "- **Avg Duration:** {}m\n",
            sessions.avg_duration_minutes
        ));
        report.push_str(&format!(
            "- **Avg Activities per Session:** {:.1}\n\n",
            sessions.avg_activities_per_session
        ));

        if !sessions.recent.is_empty() {
            report.push_str("| User | Started | Duration | Activities |\n");
            report.push_str("|------|---------|----------|------------|\n");
            for session in &sessions.recent {
                report.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    session.user,
                    session.start_time.format("%Y-%m-%d %H:%M"),
                    format_duration(session.duration_secs.max(0) as u64),
                    session.activity_count,
                ));
            }
            report.push('\n');
        }

        // Timeline.
        if !analytics.timeline.is_empty() {
            report.push_str(&format!("## Timeline (by {})\n\n", analytics.granularity));
            report.push_str("| Bucket | Activities | Top Type |\n");
            report.push_str("|--------|------------|----------|\n");
            for bucket in &analytics.timeline {
                let top_type = bucket
                    .counts_by_type
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                    .map(|(kind, _)| kind.as_str())
                    .unwrap_or("-");
                report.push_str(&format!(
                    "| {} | {} | {} |\n",
                    bucket.bucket_key, bucket.count, top_type
                ));
            }
            report.push('\n');
        }

        report
    }

    /// Generate a period-over-period comparison.
    pub fn trend_report(trend: &TrendReport) -> String {
        let mut report = String::new();

        report.push_str(&format!(
            "# Trend Report\n\n**Current:** {} - {}\n\n**Previous:** {} - {}\n\n",
            trend.current.range.start.format("%B %d, %Y"),
            trend.current.range.end.format("%B %d, %Y"),
            trend.previous.range.start.format("%B %d, %Y"),
            trend.previous.range.end.format("%B %d, %Y"),
        ));

        let current = trend_values(&trend.current);
        let previous = trend_values(&trend.previous);

        report.push_str("## Changes\n\n");
        report.push_str("| Metric | Current | Previous | Change |\n");
        report.push_str("|--------|---------|----------|--------|\n");
        for (i, (label, change)) in trend.changes.entries().iter().enumerate() {
            report.push_str(&format!(
                "| {} | {} | {} | {:+}% |\n",
                label, current[i], previous[i], change
            ));
        }
        report.push('\n');

        report
    }

    /// Generate a table of daily snapshots.
    pub fn snapshot_report(snapshots: &[Snapshot]) -> String {
        let mut report = String::new();
        report.push_str("# Platform History\n\n");

        if snapshots.is_empty() {
            report.push_str("No snapshots captured yet.\n");
            return report;
        }

        report.push_str("| Date | Workspaces | Users | Active | Risks | Controls | Reports | Storage |\n");
        report.push_str("|------|------------|-------|--------|-------|----------|---------|---------|\n");
        for snapshot in snapshots {
            let t = &snapshot.totals;
            report.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
                snapshot.date,
                t.total_workspaces,
                t.total_users,
                t.active_users,
                t.total_risks,
                t.total_controls,
                t.total_reports,
                format_bytes(t.storage_used),
            ));
        }
        report.push('\n');
        report
    }
}

fn feature_label(feature: Feature) -> &'static str {
    match feature {
        Feature::Risks => "Risks",
        Feature::Controls => "Controls",
        Feature::Reports => "Reports",
        Feature::Ai => "AI",
        Feature::Exports => "Exports",
        Feature::Team => "Team",
    }
}

/// Display values in the same order as `TrendChanges::entries`.
fn trend_values(analytics: &PeriodAnalytics) -> [String; 7] {
    let e = &analytics.engagement;
    [
        analytics.total_activities.to_string(),
        e.active_users.to_string(),
        format!("{:.1}%", e.participation_rate),
        format!("{:.1}", e.activities_per_day),
        analytics.sessions.total_sessions.to_string(),
        format!("{}m", analytics.sessions.avg_duration_minutes),
        e.engagement_score.to_string(),
    ]
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
