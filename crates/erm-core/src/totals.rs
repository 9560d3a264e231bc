//! Platform-wide totals captured by daily snapshots.

use crate::config::StorageConfig;
use crate::error::Result;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Point-in-time platform counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTotals {
    pub total_workspaces: u64,
    pub total_users: u64,
    pub active_users: u64,
    pub total_risks: u64,
    pub total_controls: u64,
    pub total_reports: u64,
    /// Approximate bytes occupied by the stored data.
    pub storage_used: u64,
}

/// Source of current platform totals, queried once per snapshot.
pub trait StatsProducer {
    fn totals(&self) -> Result<PlatformTotals>;
}

/// Fixed totals; handy when the caller already has the numbers.
impl StatsProducer for PlatformTotals {
    fn totals(&self) -> Result<PlatformTotals> {
        Ok(self.clone())
    }
}

/// Counts collections in a key-value store.
///
/// Every key is read once per call, so all counts in one `PlatformTotals`
/// come from the same read pass.
pub struct StoreStatsProducer<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    keys: &'a StorageConfig,
}

impl<'a, S: KeyValueStore + ?Sized> StoreStatsProducer<'a, S> {
    pub fn new(store: &'a S, keys: &'a StorageConfig) -> Self {
        Self { store, keys }
    }

    fn read(&self, key: &str, storage_used: &mut u64) -> Result<Vec<Value>> {
        let value = self.store.get(key)?;
        if let Some(value) = &value {
            *storage_used += serde_json::to_vec(value)?.len() as u64;
        }
        Ok(match value {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        })
    }
}

impl<S: KeyValueStore + ?Sized> StatsProducer for StoreStatsProducer<'_, S> {
    fn totals(&self) -> Result<PlatformTotals> {
        let mut storage_used = 0u64;

        let workspaces = self.read(&self.keys.workspaces_key, &mut storage_used)?;
        let users = self.read(&self.keys.users_key, &mut storage_used)?;
        let risks = self.read(&self.keys.risks_key, &mut storage_used)?;
        let controls = self.read(&self.keys.controls_key, &mut storage_used)?;
        let reports = self.read(&self.keys.reports_key, &mut storage_used)?;
        // Only its size matters here.
        self.read(&self.keys.activity_key, &mut storage_used)?;

        let active_users = users
            .iter()
            .filter(|u| u.get("status").and_then(Value::as_str) != Some("inactive"))
            .count();

        Ok(PlatformTotals {
            total_workspaces: workspaces.len() as u64,
            total_users: users.len() as u64,
            active_users: active_users as u64,
            total_risks: risks.len() as u64,
            total_controls: controls.len() as u64,
            total_reports: reports.len() as u64,
            storage_used,
        })
    }
}
