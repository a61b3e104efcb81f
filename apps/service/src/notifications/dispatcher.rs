use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backend::DestinationBackend;
use super::message::{MessageRenderer, TEST_MESSAGE};
use super::senders::SenderError;
use super::{Alert, NotificationError};
use crate::config::NotificationsConfig;
use crate::database::Database;
use crate::monitoring::events::AlertEvent;

/// Outcome of fanning one alert out to its destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: AlertEvent,
    pub delivered: usize,
    pub failed: usize,
}

/// Resolves subscribed channels and sends alerts to them
pub struct NotificationDispatcher {
    store: Arc<dyn Database>,
    backend: Arc<dyn DestinationBackend>,
    renderer: MessageRenderer,
    permits: Arc<Semaphore>,
    send_timeout: Duration,
    queue_capacity: usize,
    /// Deliveries the supervisor runs at once; further alerts wait in the queue
    max_in_flight: usize,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn Database>,
        backend: Arc<dyn DestinationBackend>,
        config: &NotificationsConfig,
    ) -> Result<Self, NotificationError> {
        Ok(Self {
            store,
            backend,
            renderer: MessageRenderer::new()?,
            permits: Arc::new(Semaphore::new(config.max_concurrent_sends.max(1))),
            max_in_flight: config.max_concurrent_sends.max(1),
            send_timeout: Duration::from_secs(config.send_timeout_seconds.max(1)),
            queue_capacity: config.queue_capacity.max(1),
        })
    }

    /// Send `alert` to every enabled channel of its monitor subscribed to its event
    ///
    /// Each destination is independent: a failure is logged and counted, and
    /// never stops the remaining sends.
    pub async fn deliver(&self, alert: &Alert) -> Result<DispatchReport, NotificationError> {
        let monitor_id = alert.monitor.id;
        let channels = self
            .store
            .channels_bound_to(monitor_id, true)
            .await
            .map_err(NotificationError::Store)?;

        let targets: Vec<_> = channels.into_iter().filter(|bound| bound.accepts(alert.event)).collect();

        let mut report = DispatchReport { event: alert.event, delivered: 0, failed: 0 };
        if targets.is_empty() {
            debug!(monitor_id, event = %alert.event, "No channels subscribed to event");
            return Ok(report);
        }

        let message = self.renderer.render(alert)?;

        let sends = targets.iter().map(|bound| {
            let message = message.as_str();
            async move { (bound, self.send_one(&bound.channel.url, message).await) }
        });

        for (bound, result) in join_all(sends).await {
            match result {
                Ok(()) => {
                    report.delivered += 1;
                    info!(
                        monitor_id,
                        channel = %bound.channel.name,
                        event = %alert.event,
                        "Notification sent"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        monitor_id,
                        channel = %bound.channel.name,
                        event = %alert.event,
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Validate `url` and push the fixed test message through it
    pub async fn send_test(&self, url: &str) -> Result<(), NotificationError> {
        self.backend.validate(url)?;
        self.send_one(url, TEST_MESSAGE).await?;
        Ok(())
    }

    async fn send_one(&self, url: &str, message: &str) -> Result<(), SenderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SenderError::SendFailed("dispatcher is shutting down".into()))?;

        match tokio::time::timeout(self.send_timeout, self.backend.send(url, message)).await {
            Ok(result) => result,
            Err(_) => Err(SenderError::Timeout(self.send_timeout.as_secs())),
        }
    }

    /// Spawn the supervisor that drains the alert queue
    ///
    /// Each alert becomes its own delivery task, at most `max_concurrent_sends`
    /// of them at a time. While that many are running the supervisor stops
    /// receiving, so a stalled destination fills the queue and later alerts
    /// are dropped by [`NotificationQueue::enqueue`]. On cancellation the
    /// supervisor stops taking alerts and waits for in-flight deliveries.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> (NotificationQueue, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let handle = tokio::spawn(self.supervise(rx, cancel));
        (NotificationQueue { tx }, handle)
    }

    async fn supervise(self: Arc<Self>, mut rx: mpsc::Receiver<Alert>, cancel: CancellationToken) {
        let mut deliveries = JoinSet::new();
        info!(
            queue_capacity = self.queue_capacity,
            max_in_flight = self.max_in_flight,
            "Notification dispatcher started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Notification dispatcher shutting down");
                    break;
                }
                received = rx.recv(), if deliveries.len() < self.max_in_flight => match received {
                    Some(alert) => {
                        let dispatcher = self.clone();
                        deliveries.spawn(async move {
                            if let Err(e) = dispatcher.deliver(&alert).await {
                                error!(monitor_id = alert.monitor.id, event = %alert.event, error = %e, "Alert delivery failed");
                            }
                        });
                    }
                    None => break,
                },
                Some(joined) = deliveries.join_next(), if !deliveries.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Delivery task panicked");
                    }
                }
            }
        }

        rx.close();
        let mut dropped = 0usize;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "Discarded queued alerts at shutdown");
        }

        while let Some(joined) = deliveries.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Delivery task panicked");
            }
        }
        debug!("Notification dispatcher drained");
    }
}

/// Cheap handle the check pipeline uses to hand alerts off
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Alert>,
}

impl NotificationQueue {
    /// Never blocks; a full or closed queue drops the alert and returns `false`
    pub fn enqueue(&self, alert: Alert) -> bool {
        match self.tx.try_send(alert) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(alert)) => {
                warn!(monitor_id = alert.monitor.id, event = %alert.event, "Notification queue full, dropping alert");
                false
            }
            Err(mpsc::error::TrySendError::Closed(alert)) => {
                warn!(monitor_id = alert.monitor.id, event = %alert.event, "Notification dispatcher stopped, dropping alert");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use crate::database::models::{Binding, Monitor, NotificationChannel};
    use crate::monitoring::types::{CheckResult, MonitorStatus, ProbeOutcome};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingBackend {
        sent: Mutex<Vec<(String, String)>>,
        failing: Vec<String>,
        delay: Option<Duration>,
    }

    impl RecordingBackend {
        fn urls(&self) -> Vec<String> {
            let mut urls: Vec<String> = self.sent.lock().unwrap().iter().map(|(u, _)| u.clone()).collect();
            urls.sort();
            urls
        }
    }

    #[async_trait]
    impl DestinationBackend for RecordingBackend {
        async fn send(&self, url: &str, message: &str) -> Result<(), SenderError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.iter().any(|f| f == url) {
                return Err(SenderError::SendFailed("boom".into()));
            }
            self.sent.lock().unwrap().push((url.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn config() -> NotificationsConfig {
        NotificationsConfig { max_concurrent_sends: 4, send_timeout_seconds: 1, queue_capacity: 8 }
    }

    async fn seeded(store: &MemoryDatabase) -> Monitor {
        let mut monitor = Monitor::new("api".into(), "https://api.example.com".into(), "https".into());
        monitor.id = store.save_monitor(&monitor).await.unwrap();
        monitor
    }

    async fn channel(store: &MemoryDatabase, monitor_id: i64, url: &str, events: Vec<AlertEvent>) {
        let id = store
            .save_channel(&NotificationChannel::new(url.into(), url.into()).with_events(events))
            .await
            .unwrap();
        store.bind_channel(&Binding::new(monitor_id, id)).await.unwrap();
    }

    fn alert(monitor: &Monitor, event: AlertEvent) -> Alert {
        Alert {
            event,
            monitor: monitor.clone(),
            check: CheckResult::new(monitor.id, Utc::now()).with_outcome(ProbeOutcome::down("HTTP 500")),
            previous: Some(MonitorStatus::Up),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_is_counted_not_fatal() {
        let store = Arc::new(MemoryDatabase::new());
        let monitor = seeded(&store).await;
        channel(&store, monitor.id, "generic://a/1", vec![]).await;
        channel(&store, monitor.id, "generic://b/2", vec![]).await;
        channel(&store, monitor.id, "generic://c/3", vec![AlertEvent::Recovery]).await;

        let backend = Arc::new(RecordingBackend { failing: vec!["generic://b/2".into()], ..Default::default() });
        let dispatcher = NotificationDispatcher::new(store, backend.clone(), &config()).unwrap();

        let report = dispatcher.deliver(&alert(&monitor, AlertEvent::MonitorDown)).await.unwrap();
        assert_eq!(report, DispatchReport { event: AlertEvent::MonitorDown, delivered: 1, failed: 1 });
        assert_eq!(backend.urls(), vec!["generic://a/1".to_string()]);
        assert!(backend.sent.lock().unwrap()[0].1.starts_with("🔴 Monitor DOWN: api"));
    }

    #[tokio::test]
    async fn test_slow_send_times_out() {
        let store = Arc::new(MemoryDatabase::new());
        let monitor = seeded(&store).await;
        channel(&store, monitor.id, "generic://slow/1", vec![]).await;

        let backend = Arc::new(RecordingBackend { delay: Some(Duration::from_secs(5)), ..Default::default() });
        let dispatcher = NotificationDispatcher::new(store, backend, &config()).unwrap();

        let report = dispatcher.deliver(&alert(&monitor, AlertEvent::MonitorDown)).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn test_send_test_validates_first() {
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher =
            NotificationDispatcher::new(Arc::new(MemoryDatabase::new()), backend.clone(), &config()).unwrap();

        assert!(matches!(
            dispatcher.send_test("bogus://x").await,
            Err(NotificationError::Sender(SenderError::UnsupportedService(_)))
        ));
        assert!(backend.urls().is_empty());

        dispatcher.send_test("discord://tok@42").await.unwrap();
        assert_eq!(backend.sent.lock().unwrap()[0].1, TEST_MESSAGE);
    }

    #[tokio::test]
    async fn test_queue_delivers_in_background_and_drains_on_cancel() {
        let store = Arc::new(MemoryDatabase::new());
        let monitor = seeded(&store).await;
        channel(&store, monitor.id, "generic://a/1", vec![]).await;

        let backend = Arc::new(RecordingBackend { delay: Some(Duration::from_millis(50)), ..Default::default() });
        let dispatcher = Arc::new(NotificationDispatcher::new(store, backend.clone(), &config()).unwrap());
        let cancel = CancellationToken::new();
        let (queue, handle) = dispatcher.start(cancel.clone());

        queue.enqueue(alert(&monitor, AlertEvent::MonitorDown));
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        handle.await.unwrap();

        // the in-flight delivery finished before the supervisor exited
        assert_eq!(backend.urls(), vec!["generic://a/1".to_string()]);

        // enqueue after shutdown is dropped
        assert!(!queue.enqueue(alert(&monitor, AlertEvent::MonitorDown)));
    }

    struct StalledBackend {
        started: AtomicUsize,
    }

    #[async_trait]
    impl DestinationBackend for StalledBackend {
        async fn send(&self, _url: &str, _message: &str) -> Result<(), SenderError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_destination_fills_queue_and_drops() {
        let store = Arc::new(MemoryDatabase::new());
        let monitor = seeded(&store).await;
        channel(&store, monitor.id, "generic://stuck/1", vec![]).await;

        let backend = Arc::new(StalledBackend { started: AtomicUsize::new(0) });
        let config = NotificationsConfig { max_concurrent_sends: 1, send_timeout_seconds: 60, queue_capacity: 1 };
        let dispatcher = Arc::new(NotificationDispatcher::new(store, backend.clone(), &config).unwrap());
        let (queue, _handle) = dispatcher.start(CancellationToken::new());

        // first alert is picked up and hangs in the backend
        assert!(queue.enqueue(alert(&monitor, AlertEvent::MonitorDown)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.started.load(Ordering::SeqCst), 1);

        let mut accepted = 0;
        for _ in 0..200 {
            if queue.enqueue(alert(&monitor, AlertEvent::MonitorDown)) {
                accepted += 1;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // one alert waits in the queue, the rest are dropped
        assert_eq!(accepted, 1);
        assert_eq!(backend.started.load(Ordering::SeqCst), 1);
    }
}
