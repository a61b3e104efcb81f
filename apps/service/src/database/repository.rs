use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Row, params};

use super::models::{
    Binding, BoundChannel, Monitor, MonitorStats, NotificationChannel, events_from_json, events_to_json,
    millis_to_timestamp, timestamp_to_millis,
};
use crate::monitoring::types::{CheckResult, MonitorStatus};
use crate::pool::LibsqlPool;

/// Database trait for abstracting database operations
#[async_trait]
pub trait Database: Send + Sync {
    /// Get all active monitors
    async fn get_active_monitors(&self) -> Result<Vec<Monitor>>;

    /// Get a monitor by id
    async fn get_monitor(&self, id: i64) -> Result<Option<Monitor>>;

    /// Insert (id 0) or update a monitor, returning its id
    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64>;

    /// Delete a monitor together with its checks and bindings
    async fn delete_monitor(&self, id: i64) -> Result<()>;

    /// Append a check
    async fn insert_check(&self, check: &CheckResult) -> Result<i64>;

    /// Status of the most recent check for a monitor, if any
    async fn latest_status(&self, monitor_id: i64) -> Result<Option<MonitorStatus>>;

    /// Most recent checks first
    async fn recent_checks(&self, monitor_id: i64, limit: usize) -> Result<Vec<CheckResult>>;

    /// Aggregate checks at or after `since`
    async fn monitor_stats(&self, monitor_id: i64, since: DateTime<Utc>) -> Result<MonitorStats>;

    /// Insert (id 0) or update a channel, returning its id
    async fn save_channel(&self, channel: &NotificationChannel) -> Result<i64>;

    /// Bind a channel to a monitor, replacing any previous override
    async fn bind_channel(&self, binding: &Binding) -> Result<()>;

    /// Channels bound to a monitor, each with the binding's override
    async fn channels_bound_to(&self, monitor_id: i64, enabled_only: bool) -> Result<Vec<BoundChannel>>;
}

const MONITOR_COLUMNS: &str =
    "id, name, target, kind, interval_seconds, timeout_seconds, max_retries, active, created_at, updated_at";

const CHECK_COLUMNS: &str = "id, monitor_id, status, latency_ms, status_code, message, checked_at";

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Open a pool on `path` and bring the schema up to date
    pub async fn open(path: &str, pool_size: usize) -> Result<Self> {
        let pool = crate::pool::open_pool(path, pool_size).await?;
        let db = Self::new_from_pool(pool);
        let conn = db.get_conn().await?;
        super::initialize_database(&conn).await?;
        Ok(db)
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn monitor_from_row(row: &Row) -> Result<Monitor> {
    Ok(Monitor {
        id: row.get(0)?,
        name: row.get(1)?,
        target: row.get(2)?,
        kind: row.get(3)?,
        interval_seconds: row.get::<i64>(4)?.max(0) as u64,
        timeout_seconds: row.get::<i64>(5)?.max(0) as u64,
        max_retries: row.get::<i64>(6)?.max(0) as u32,
        active: row.get::<i64>(7)? != 0,
        created_at: millis_to_timestamp(row.get(8)?),
        updated_at: millis_to_timestamp(row.get(9)?),
    })
}

fn check_from_row(row: &Row) -> Result<CheckResult> {
    let status: String = row.get(2)?;
    Ok(CheckResult {
        id: Some(row.get(0)?),
        monitor_id: row.get(1)?,
        status: status.parse().unwrap_or(MonitorStatus::Unknown),
        latency_ms: row.get::<i64>(3)?.max(0) as u64,
        status_code: row.get::<Option<i64>>(4)?.map(|v| v as u16),
        message: row.get(5)?,
        checked_at: millis_to_timestamp(row.get(6)?),
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn get_active_monitors(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE active = 1 ORDER BY id");
        let mut rows = conn.query(&sql, ()).await?;

        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }
        Ok(monitors)
    }

    async fn get_monitor(&self, id: i64) -> Result<Option<Monitor>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = ?");
        let mut rows = conn.query(&sql, params![id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(monitor_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64> {
        let conn = self.get_conn().await?;
        let created_at = timestamp_to_millis(monitor.created_at);
        let updated_at = timestamp_to_millis(monitor.updated_at);

        if monitor.id != 0 {
            conn.execute(
                "UPDATE monitors SET name = ?, target = ?, kind = ?, interval_seconds = ?, timeout_seconds = ?, max_retries = ?, active = ?, updated_at = ? WHERE id = ?",
                params![
                    monitor.name.clone(),
                    monitor.target.clone(),
                    monitor.kind.clone(),
                    monitor.interval_seconds as i64,
                    monitor.timeout_seconds as i64,
                    monitor.max_retries as i64,
                    if monitor.active { 1 } else { 0 },
                    updated_at,
                    monitor.id
                ],
            )
            .await?;
            Ok(monitor.id)
        } else {
            conn.execute(
                "INSERT INTO monitors (name, target, kind, interval_seconds, timeout_seconds, max_retries, active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    monitor.name.clone(),
                    monitor.target.clone(),
                    monitor.kind.clone(),
                    monitor.interval_seconds as i64,
                    monitor.timeout_seconds as i64,
                    monitor.max_retries as i64,
                    if monitor.active { 1 } else { 0 },
                    created_at,
                    updated_at
                ],
            )
            .await?;
            Ok(conn.last_insert_rowid())
        }
    }

    async fn delete_monitor(&self, id: i64) -> Result<()> {
        let conn = self.get_conn().await?;
        // related rows go via ON DELETE CASCADE
        conn.execute("DELETE FROM monitors WHERE id = ?", params![id]).await?;
        Ok(())
    }

    async fn insert_check(&self, check: &CheckResult) -> Result<i64> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO monitor_checks (monitor_id, status, latency_ms, status_code, message, checked_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                check.monitor_id,
                check.status.as_str(),
                check.latency_ms as i64,
                check.status_code.map(|v| v as i64),
                check.message.clone(),
                timestamp_to_millis(check.checked_at)
            ],
        )
        .await?;
        Ok(conn.last_insert_rowid())
    }

    async fn latest_status(&self, monitor_id: i64) -> Result<Option<MonitorStatus>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT status FROM monitor_checks WHERE monitor_id = ? ORDER BY checked_at DESC, id DESC LIMIT 1",
                params![monitor_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let status: String = row.get(0)?;
                Ok(Some(status.parse().unwrap_or(MonitorStatus::Unknown)))
            }
            None => Ok(None),
        }
    }

    async fn recent_checks(&self, monitor_id: i64, limit: usize) -> Result<Vec<CheckResult>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {CHECK_COLUMNS} FROM monitor_checks WHERE monitor_id = ? ORDER BY checked_at DESC, id DESC LIMIT ?"
        );
        let mut rows = conn.query(&sql, params![monitor_id, limit as i64]).await?;

        let mut checks = Vec::new();
        while let Some(row) = rows.next().await? {
            checks.push(check_from_row(&row)?);
        }
        Ok(checks)
    }

    async fn monitor_stats(&self, monitor_id: i64, since: DateTime<Utc>) -> Result<MonitorStats> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*),
                        SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN status = 'down' THEN 1 ELSE 0 END),
                        AVG(CASE WHEN latency_ms > 0 THEN latency_ms END)
                 FROM monitor_checks WHERE monitor_id = ? AND checked_at >= ?",
                params![monitor_id, timestamp_to_millis(since)],
            )
            .await?;

        let mut stats = MonitorStats { monitor_id, ..Default::default() };
        if let Some(row) = rows.next().await? {
            stats.total_checks = row.get::<i64>(0)?.max(0) as u64;
            stats.success_checks = row.get::<Option<i64>>(1)?.unwrap_or(0).max(0) as u64;
            stats.failed_checks = row.get::<Option<i64>>(2)?.unwrap_or(0).max(0) as u64;
            stats.avg_response_time_ms = row.get::<Option<f64>>(3)?;
        }
        if stats.total_checks > 0 {
            stats.uptime_percent = stats.success_checks as f64 * 100.0 / stats.total_checks as f64;
        }
        Ok(stats)
    }

    async fn save_channel(&self, channel: &NotificationChannel) -> Result<i64> {
        let conn = self.get_conn().await?;
        let events = events_to_json(&channel.events);

        if channel.id != 0 {
            conn.execute(
                "UPDATE notification_channels SET name = ?, url = ?, events = ?, enabled = ? WHERE id = ?",
                params![
                    channel.name.clone(),
                    channel.url.clone(),
                    events,
                    if channel.enabled { 1 } else { 0 },
                    channel.id
                ],
            )
            .await?;
            Ok(channel.id)
        } else {
            conn.execute(
                "INSERT INTO notification_channels (name, url, events, enabled, created_at) VALUES (?, ?, ?, ?, ?)",
                params![
                    channel.name.clone(),
                    channel.url.clone(),
                    events,
                    if channel.enabled { 1 } else { 0 },
                    timestamp_to_millis(Utc::now())
                ],
            )
            .await?;
            Ok(conn.last_insert_rowid())
        }
    }

    async fn bind_channel(&self, binding: &Binding) -> Result<()> {
        let conn = self.get_conn().await?;
        let events = binding.events.as_deref().map(events_to_json);

        conn.execute(
            "INSERT INTO monitor_notifications (monitor_id, channel_id, events) VALUES (?, ?, ?)
             ON CONFLICT(monitor_id, channel_id) DO UPDATE SET events = excluded.events",
            params![binding.monitor_id, binding.channel_id, events],
        )
        .await?;
        Ok(())
    }

    async fn channels_bound_to(&self, monitor_id: i64, enabled_only: bool) -> Result<Vec<BoundChannel>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT c.id, c.name, c.url, c.events, c.enabled, mn.events
                 FROM monitor_notifications mn
                 JOIN notification_channels c ON c.id = mn.channel_id
                 WHERE mn.monitor_id = ? AND (? = 0 OR c.enabled = 1)
                 ORDER BY c.id",
                params![monitor_id, if enabled_only { 1 } else { 0 }],
            )
            .await?;

        let mut channels = Vec::new();
        while let Some(row) = rows.next().await? {
            let channel_events: Option<String> = row.get(3)?;
            let override_events: Option<String> = row.get(5)?;

            channels.push(BoundChannel {
                channel: NotificationChannel {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                    events: channel_events.as_deref().map(events_from_json).unwrap_or_default(),
                    enabled: row.get::<i64>(4)? != 0,
                },
                override_events: override_events.as_deref().map(events_from_json),
            });
        }
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::events::AlertEvent;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn open_temp() -> Result<(DatabaseImpl, TempDir)> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("monitor.db");
        let db = DatabaseImpl::open(&path.to_string_lossy(), 4).await?;
        Ok((db, dir))
    }

    fn check(monitor_id: i64, status: MonitorStatus, latency_ms: u64, at: DateTime<Utc>) -> CheckResult {
        let mut check = CheckResult::new(monitor_id, at).with_latency(latency_ms);
        check.status = status;
        check
    }

    #[tokio::test]
    async fn test_monitor_round_trip_and_active_filter() -> Result<()> {
        let (db, _dir) = open_temp().await?;

        let mut api = Monitor::new("api".into(), "https://api.example.com".into(), "https".into());
        api.id = db.save_monitor(&api).await?;
        let mut paused = Monitor::new("db".into(), "db.internal:5432".into(), "tcp".into());
        paused.active = false;
        paused.id = db.save_monitor(&paused).await?;

        let active = db.get_active_monitors().await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, api.id);
        assert_eq!(active[0].interval_seconds, 60);
        assert_eq!(active[0].max_retries, 3);

        api.interval_seconds = 15;
        db.save_monitor(&api).await?;
        let loaded = db.get_monitor(api.id).await?.expect("monitor exists");
        assert_eq!(loaded.interval_seconds, 15);
        Ok(())
    }

    #[tokio::test]
    async fn test_latest_status_follows_newest_check() -> Result<()> {
        let (db, _dir) = open_temp().await?;
        let id = db.save_monitor(&Monitor::new("web".into(), "http://x".into(), "http".into())).await?;

        assert_eq!(db.latest_status(id).await?, None);

        let now = Utc::now();
        db.insert_check(&check(id, MonitorStatus::Up, 10, now - Duration::seconds(60))).await?;
        db.insert_check(&check(id, MonitorStatus::Down, 0, now)).await?;
        assert_eq!(db.latest_status(id).await?, Some(MonitorStatus::Down));

        let recent = db.recent_checks(id, 10).await?;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].status, MonitorStatus::Down);
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_over_window() -> Result<()> {
        let (db, _dir) = open_temp().await?;
        let id = db.save_monitor(&Monitor::new("web".into(), "http://x".into(), "http".into())).await?;
        let now = Utc::now();

        db.insert_check(&check(id, MonitorStatus::Up, 100, now)).await?;
        db.insert_check(&check(id, MonitorStatus::Up, 300, now)).await?;
        db.insert_check(&check(id, MonitorStatus::Down, 0, now)).await?;
        db.insert_check(&check(id, MonitorStatus::Up, 50, now - Duration::hours(48))).await?;

        let stats = db.monitor_stats(id, now - Duration::hours(24)).await?;
        assert_eq!(stats.total_checks, 3);
        assert_eq!(stats.success_checks, 2);
        assert_eq!(stats.failed_checks, 1);
        assert_eq!(stats.avg_response_time_ms, Some(200.0));
        assert!((stats.uptime_percent - 66.666).abs() < 0.01);
        Ok(())
    }

    #[tokio::test]
    async fn test_bindings_carry_override_and_cascade() -> Result<()> {
        let (db, _dir) = open_temp().await?;
        let monitor_id = db.save_monitor(&Monitor::new("web".into(), "http://x".into(), "http".into())).await?;

        let ops = NotificationChannel::new("ops".into(), "generic://hooks.example.com/ops".into())
            .with_events(vec![AlertEvent::MonitorDown]);
        let ops_id = db.save_channel(&ops).await?;
        let mut muted = NotificationChannel::new("muted".into(), "generic://hooks.example.com/m".into());
        muted.enabled = false;
        let muted_id = db.save_channel(&muted).await?;

        db.bind_channel(&Binding::new(monitor_id, ops_id).with_events(vec![AlertEvent::ResponseSlow])).await?;
        db.bind_channel(&Binding::new(monitor_id, muted_id)).await?;

        let enabled = db.channels_bound_to(monitor_id, true).await?;
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].channel.events, vec![AlertEvent::MonitorDown]);
        assert_eq!(enabled[0].override_events, Some(vec![AlertEvent::ResponseSlow]));
        assert_eq!(db.channels_bound_to(monitor_id, false).await?.len(), 2);

        // rebinding replaces the override
        db.bind_channel(&Binding::new(monitor_id, ops_id)).await?;
        assert_eq!(db.channels_bound_to(monitor_id, true).await?[0].override_events, None);

        db.insert_check(&check(monitor_id, MonitorStatus::Up, 5, Utc::now())).await?;
        db.delete_monitor(monitor_id).await?;
        assert!(db.channels_bound_to(monitor_id, false).await?.is_empty());
        assert!(db.recent_checks(monitor_id, 10).await?.is_empty());
        Ok(())
    }
}
