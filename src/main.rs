use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Args, Parser, Subcommand};
use erm_analytics::{
    filter_activities, Analytics, CaptureOutcome, Granularity, Period, ReportGenerator, Scope,
    SnapshotManager,
};
use erm_core::clock::{Clock, FixedClock, SystemClock};
use erm_core::config::AppConfig;
use erm_core::store::{load_activities, JsonFileStore};
use erm_core::totals::{StatsProducer, StoreStatsProducer};
use erm_core::types::{parse_instant, ActivityRecord};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "erm-insights",
    about = "Activity intelligence for the ERM platform's activity log",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/erm-insights/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the store directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Evaluate as of this RFC 3339 instant instead of the wall clock
    #[arg(long, global = true)]
    now: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct QueryArgs {
    /// today, yesterday, week, month, quarter, year, or lifetime
    #[arg(short, long)]
    period: Option<String>,

    /// Custom range start (RFC 3339); requires --to
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Custom range end, exclusive (RFC 3339); requires --from
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Workspace id, or "all"
    #[arg(short, long)]
    scope: Option<String>,

    /// Timeline granularity: hour, day, week, or month
    #[arg(short, long)]
    granularity: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full analysis of one period
    Analyze {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Reconstructed user sessions
    Sessions {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Activity counts per time bucket
    Timeline {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Engagement metrics and score
    Engagement {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Compare a period against the previous one
    Trends {
        #[command(flatten)]
        query: QueryArgs,
        /// Previous period token (default: the window just before the current one)
        #[arg(long)]
        previous: Option<String>,
    },

    /// Capture today's platform snapshot
    Snapshot,

    /// Show captured snapshots
    History {
        /// Number of most recent days to show
        #[arg(short, long, default_value_t = 30)]
        days: usize,
        /// Render markdown instead of JSON
        #[arg(long)]
        markdown: bool,
    },

    /// Markdown report for a period
    Report {
        #[command(flatten)]
        query: QueryArgs,
        /// Render a trend comparison instead
        #[arg(long)]
        trend: bool,
        /// Previous period token for --trend
        #[arg(long)]
        previous: Option<String>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing; stdout is reserved for command output.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "erm_insights=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config.
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }

    let now = match &cli.now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --now instant: {}", raw))?,
        None => SystemClock.now(),
    };

    run(cli.command, &config, now)
}

/// Dispatch one command. The store is only read by commands that need it.
fn run(command: Commands, config: &AppConfig, now: DateTime<FixedOffset>) -> Result<()> {
    let open = || Runtime::open(config.clone(), now);

    match command {
        Commands::Config { action } => handle_config_command(action.as_ref(), config)?,
        Commands::Analyze { query } => {
            let ctx = open()?;
            let result = ctx.analyze(&query)?;
            print_json(&result)?;
        }
        Commands::Sessions { query } => {
            let ctx = open()?;
            let period = ctx.period(&query)?;
            let range = period.resolve(now);
            let filtered = filter_activities(&ctx.activities, &range, &scope(&query));
            print_json(&ctx.analytics(&query).sessions(&filtered))?;
        }
        Commands::Timeline { query } => {
            let ctx = open()?;
            let result = ctx.analyze(&query)?;
            print_json(&result.timeline)?;
        }
        Commands::Engagement { query } => {
            let ctx = open()?;
            let result = ctx.analyze(&query)?;
            print_json(&result.engagement)?;
        }
        Commands::Trends { query, previous } => {
            let ctx = open()?;
            let trend = ctx.compare(&query, previous.as_deref())?;
            print_json(&trend)?;
        }
        Commands::Snapshot => capture_snapshot(&open()?)?,
        Commands::History { days, markdown } => {
            let series = open()?.snapshots().series(days)?;
            if markdown {
                print!("{}", ReportGenerator::snapshot_report(&series));
            } else {
                print_json(&series)?;
            }
        }
        Commands::Report {
            query,
            trend,
            previous,
        } => {
            let ctx = open()?;
            if trend {
                let trend = ctx.compare(&query, previous.as_deref())?;
                print!("{}", ReportGenerator::trend_report(&trend));
            } else {
                let result = ctx.analyze(&query)?;
                print!("{}", ReportGenerator::period_report(&result));
            }
        }
    }

    Ok(())
}

/// Everything one command needs, read once at startup.
struct Runtime {
    config: AppConfig,
    store: JsonFileStore,
    activities: Vec<ActivityRecord>,
    total_users: u64,
    now: DateTime<FixedOffset>,
}

impl Runtime {
    fn open(config: AppConfig, now: DateTime<FixedOffset>) -> Result<Self> {
        let store = JsonFileStore::new(config.store_dir());
        let activities = load_activities(&store, &config.storage.activity_key)?;
        let total_users = StoreStatsProducer::new(&store, &config.storage)
            .totals()?
            .total_users;
        tracing::debug!(
            "Loaded {} activities from {}, {} registered users",
            activities.len(),
            store.dir().display(),
            total_users,
        );
        Ok(Self {
            config,
            store,
            activities,
            total_users,
            now,
        })
    }

    fn period(&self, query: &QueryArgs) -> Result<Period> {
        match (&query.from, &query.to) {
            (Some(from), Some(to)) => {
                let start =
                    parse_instant(from).ok_or_else(|| anyhow!("invalid --from: {}", from))?;
                let end = parse_instant(to).ok_or_else(|| anyhow!("invalid --to: {}", to))?;
                Ok(Period::custom(start, end))
            }
            _ => Ok(Period::from_token(Some(
                query
                    .period
                    .as_deref()
                    .unwrap_or(self.config.analytics.default_period.as_str()),
            ))),
        }
    }

    fn analytics(&self, query: &QueryArgs) -> Analytics {
        let analytics = Analytics::from_config(&self.config.analytics);
        match query.granularity.as_deref() {
            Some(token) => analytics.with_granularity(Granularity::from_token(Some(token))),
            None => analytics,
        }
    }

    fn analyze(&self, query: &QueryArgs) -> Result<erm_analytics::PeriodAnalytics> {
        let period = self.period(query)?;
        Ok(self.analytics(query).analyze(
            &self.activities,
            period,
            &scope(query),
            self.total_users,
            self.now,
        ))
    }

    fn compare(
        &self,
        query: &QueryArgs,
        previous: Option<&str>,
    ) -> Result<erm_analytics::TrendReport> {
        let current = self.period(query)?;
        let previous = previous.map(|token| Period::from_token(Some(token)));
        Ok(self.analytics(query).compare(
            &self.activities,
            current,
            previous,
            &scope(query),
            self.total_users,
            self.now,
        ))
    }

    fn snapshots(&self) -> SnapshotManager<JsonFileStore, FixedClock> {
        SnapshotManager::new(
            self.store.clone(),
            FixedClock::new(self.now),
            self.config.storage.snapshot_key.clone(),
        )
        .with_retention(self.config.analytics.snapshot_retention_days)
    }
}

fn scope(query: &QueryArgs) -> Scope {
    Scope::from_token(query.scope.as_deref())
}

fn capture_snapshot(ctx: &Runtime) -> Result<()> {
    let producer = StoreStatsProducer::new(&ctx.store, &ctx.config.storage);
    match ctx.snapshots().capture_daily(&producer) {
        Ok(CaptureOutcome::Captured { snapshot, evicted }) => print_json(&serde_json::json!({
            "status": "captured",
            "evicted": evicted,
            "snapshot": snapshot,
        })),
        Ok(CaptureOutcome::AlreadyCaptured { date }) => print_json(&serde_json::json!({
            "status": "already_captured",
            "date": date,
        })),
        Err(e) => {
            // Still show today's numbers when only the write failed.
            if let Some(snapshot) = e.snapshot() {
                print_json(&serde_json::json!({
                    "status": "not_persisted",
                    "snapshot": snapshot,
                }))?;
            }
            Err(e.into())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_config_command(action: Option<&ConfigAction>, config: &AppConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            let path = AppConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", AppConfig::default_path().display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_store(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.data_dir = Some(dir.to_path_buf());
        config
    }

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-08T12:00:00Z").unwrap()
    }

    #[test]
    fn test_config_command_skips_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("erm_activity_log.json"), "{ not json").unwrap();
        let config = config_with_store(dir.path());

        let path = Commands::Config {
            action: Some(ConfigAction::Path),
        };
        assert!(run(path, &config, now()).is_ok());

        let analyze = Commands::Analyze {
            query: QueryArgs::default(),
        };
        assert!(run(analyze, &config, now()).is_err());
    }

    #[test]
    fn test_query_commands_run_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_store(dir.path());

        let engagement = Commands::Engagement {
            query: QueryArgs {
                period: Some("lifetime".into()),
                ..Default::default()
            },
        };
        assert!(run(engagement, &config, now()).is_ok());
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "erm-insights",
            "trends",
            "--period",
            "month",
            "--now",
            "2024-01-08T12:00:00Z",
        ])
        .unwrap();
        assert_eq!(cli.now.as_deref(), Some("2024-01-08T12:00:00Z"));
        match cli.command {
            Commands::Trends { query, previous } => {
                assert_eq!(query.period.as_deref(), Some("month"));
                assert!(previous.is_none());
            }
            _ => panic!("expected trends"),
        }
    }
}
