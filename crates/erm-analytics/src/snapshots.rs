//! Daily platform snapshots with bounded retention.
//!
//! History is a date-keyed JSON object under one store key. It is re-read on
//! every call; nothing is cached between calls. Two processes capturing
//! against the same store race as last-writer-wins on the whole mapping.

use chrono::{DateTime, Utc};
use erm_core::clock::Clock;
use erm_core::error::ErmError;
use erm_core::store::KeyValueStore;
use erm_core::totals::{PlatformTotals, StatsProducer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Snapshots kept before the oldest are evicted.
pub const SNAPSHOT_RETENTION_DAYS: usize = 90;

/// Platform totals recorded for one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// `YYYY-MM-DD` in the capturing clock's offset.
    pub date: String,
    #[serde(flatten)]
    pub totals: PlatformTotals,
    pub captured_at: DateTime<Utc>,
}

/// Date string to snapshot; ISO dates sort chronologically.
pub type SnapshotHistory = BTreeMap<String, Snapshot>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Today's snapshot already exists; nothing was written.
    AlreadyCaptured { date: String },
    Captured { snapshot: Snapshot, evicted: usize },
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read snapshot history: {0}")]
    Read(#[source] ErmError),

    #[error("Failed to compute platform totals: {0}")]
    Stats(#[source] ErmError),

    /// The snapshot was computed but the history write failed. The stored
    /// history is whatever it was before this call.
    #[error("Snapshot computed but not persisted: {source}")]
    Persist {
        snapshot: Box<Snapshot>,
        #[source]
        source: ErmError,
    },
}

impl SnapshotError {
    /// The computed snapshot, when only persisting it failed.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Persist { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }
}

/// Owns the snapshot history stored under one key.
pub struct SnapshotManager<S: KeyValueStore, C: Clock> {
    store: S,
    clock: C,
    key: String,
    retention: usize,
}

impl<S: KeyValueStore, C: Clock> SnapshotManager<S, C> {
    pub fn new(store: S, clock: C, key: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            key: key.into(),
            retention: SNAPSHOT_RETENTION_DAYS,
        }
    }

    /// Keep at most `days` snapshots (minimum one).
    pub fn with_retention(mut self, days: usize) -> Self {
        self.retention = days.max(1);
        self
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Today's date key in the clock's offset.
    pub fn today_key(&self) -> String {
        self.clock.now().date_naive().format("%Y-%m-%d").to_string()
    }

    /// Current persisted history; a missing key reads as empty.
    pub fn history(&self) -> Result<SnapshotHistory, ErmError> {
        match self.store.get(&self.key)? {
            None => Ok(SnapshotHistory::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// The most recent `days` snapshots, oldest first.
    pub fn series(&self, days: usize) -> Result<Vec<Snapshot>, ErmError> {
        let history = self.history()?;
        let skip = history.len().saturating_sub(days);
        Ok(history.into_values().skip(skip).collect())
    }

    /// Capture today's snapshot unless one already exists.
    ///
    /// Totals are requested from `producer` only when a snapshot is taken.
    pub fn capture_daily(
        &mut self,
        producer: &dyn StatsProducer,
    ) -> Result<CaptureOutcome, SnapshotError> {
        let date = self.today_key();
        let mut history = self.history().map_err(SnapshotError::Read)?;

        if history.contains_key(&date) {
            debug!("Snapshot for {} already captured", date);
            return Ok(CaptureOutcome::AlreadyCaptured { date });
        }

        let totals = producer.totals().map_err(SnapshotError::Stats)?;
        let snapshot = Snapshot {
            date: date.clone(),
            totals,
            captured_at: self.clock.now().with_timezone(&Utc),
        };
        history.insert(date.clone(), snapshot.clone());

        let mut evicted = 0usize;
        while history.len() > self.retention {
            if let Some((old, _)) = history.pop_first() {
                debug!("Evicting snapshot {}", old);
                evicted += 1;
            }
        }

        let value = match serde_json::to_value(&history) {
            Ok(value) => value,
            Err(e) => {
                return Err(SnapshotError::Persist {
                    snapshot: Box::new(snapshot),
                    source: e.into(),
                })
            }
        };
        if let Err(source) = self.store.set(&self.key, value) {
            warn!("Failed to persist snapshot for {}: {}", date, source);
            return Err(SnapshotError::Persist {
                snapshot: Box::new(snapshot),
                source,
            });
        }

        info!(
            "Captured snapshot for {} ({} kept, {} evicted)",
            date,
            history.len(),
            evicted
        );
        Ok(CaptureOutcome::Captured { snapshot, evicted })
    }
}
