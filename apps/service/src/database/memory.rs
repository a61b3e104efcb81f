use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::models::{Binding, BoundChannel, Monitor, MonitorStats, NotificationChannel};
use super::repository::Database;
use crate::monitoring::types::{CheckResult, MonitorStatus};

#[derive(Default)]
struct Tables {
    next_id: i64,
    monitors: BTreeMap<i64, Monitor>,
    checks: Vec<CheckResult>,
    channels: BTreeMap<i64, NotificationChannel>,
    bindings: BTreeMap<(i64, i64), Option<Vec<crate::monitoring::events::AlertEvent>>>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store, used for `backend = "memory"` and throughout the tests
#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn get_active_monitors(&self) -> Result<Vec<Monitor>> {
        let tables = self.tables.read().await;
        Ok(tables.monitors.values().filter(|m| m.active).cloned().collect())
    }

    async fn get_monitor(&self, id: i64) -> Result<Option<Monitor>> {
        Ok(self.tables.read().await.monitors.get(&id).cloned())
    }

    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64> {
        let mut tables = self.tables.write().await;
        let mut monitor = monitor.clone();
        if monitor.id == 0 {
            monitor.id = tables.allocate_id();
        }
        let id = monitor.id;
        tables.monitors.insert(id, monitor);
        Ok(id)
    }

    async fn delete_monitor(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.monitors.remove(&id);
        tables.checks.retain(|c| c.monitor_id != id);
        tables.bindings.retain(|(monitor_id, _), _| *monitor_id != id);
        Ok(())
    }

    async fn insert_check(&self, check: &CheckResult) -> Result<i64> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate_id();
        let mut check = check.clone();
        check.id = Some(id);
        tables.checks.push(check);
        Ok(id)
    }

    async fn latest_status(&self, monitor_id: i64) -> Result<Option<MonitorStatus>> {
        let tables = self.tables.read().await;
        // ties on timestamp go to the later insert
        Ok(tables
            .checks
            .iter()
            .filter(|c| c.monitor_id == monitor_id)
            .max_by_key(|c| (c.checked_at, c.id))
            .map(|c| c.status))
    }

    async fn recent_checks(&self, monitor_id: i64, limit: usize) -> Result<Vec<CheckResult>> {
        let tables = self.tables.read().await;
        let mut checks: Vec<CheckResult> = tables
            .checks
            .iter()
            .filter(|c| c.monitor_id == monitor_id)
            .cloned()
            .collect();
        checks.sort_by(|a, b| (b.checked_at, b.id).cmp(&(a.checked_at, a.id)));
        checks.truncate(limit);
        Ok(checks)
    }

    async fn monitor_stats(&self, monitor_id: i64, since: DateTime<Utc>) -> Result<MonitorStats> {
        let tables = self.tables.read().await;
        Ok(MonitorStats::from_checks(
            monitor_id,
            tables
                .checks
                .iter()
                .filter(|c| c.monitor_id == monitor_id && c.checked_at >= since),
        ))
    }

    async fn save_channel(&self, channel: &NotificationChannel) -> Result<i64> {
        let mut tables = self.tables.write().await;
        let mut channel = channel.clone();
        if channel.id == 0 {
            channel.id = tables.allocate_id();
        }
        let id = channel.id;
        tables.channels.insert(id, channel);
        Ok(id)
    }

    async fn bind_channel(&self, binding: &Binding) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.monitors.contains_key(&binding.monitor_id) {
            anyhow::bail!("monitor {} does not exist", binding.monitor_id);
        }
        if !tables.channels.contains_key(&binding.channel_id) {
            anyhow::bail!("channel {} does not exist", binding.channel_id);
        }
        tables
            .bindings
            .insert((binding.monitor_id, binding.channel_id), binding.events.clone());
        Ok(())
    }

    async fn channels_bound_to(&self, monitor_id: i64, enabled_only: bool) -> Result<Vec<BoundChannel>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bindings
            .range((monitor_id, i64::MIN)..=(monitor_id, i64::MAX))
            .filter_map(|((_, channel_id), override_events)| {
                let channel = tables.channels.get(channel_id)?;
                if enabled_only && !channel.enabled {
                    return None;
                }
                Some(BoundChannel { channel: channel.clone(), override_events: override_events.clone() })
            })
            .collect())
    }
}
