//! Reminder scanner
//!
//! Periodically sweeps the store for events starting within the next hour
//! and hands each one to a [`ReminderNotifier`]. Notices go to operators
//! (logs by default) and are never returned to HTTP callers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::datetime::format_datetime;
use crate::event::Reminder;
use crate::store::EventStore;

/// Default time between scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Destination for "starting soon" notices.
pub trait ReminderNotifier: Send + Sync {
    fn notify(&self, reminder: &Reminder) -> anyhow::Result<()>;
}

/// Writes one structured log record per reminder.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ReminderNotifier for LogNotifier {
    fn notify(&self, reminder: &Reminder) -> anyhow::Result<()> {
        let event = &reminder.event;
        info!(
            event_id = event.id,
            title = %event.title,
            description = %event.description,
            start_time = %format_datetime(&event.start_time),
            minutes_until = reminder.minutes_until,
            "REMINDER: '{}' starts in {} minutes",
            event.title,
            reminder.minutes_until
        );
        Ok(())
    }
}

/// Background sweep over the store.
pub struct ReminderScanner {
    store: Arc<EventStore>,
    notifier: Arc<dyn ReminderNotifier>,
    interval: Duration,
}

impl ReminderScanner {
    pub fn new(store: Arc<EventStore>, notifier: Arc<dyn ReminderNotifier>) -> Self {
        Self {
            store,
            notifier,
            interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    /// Set the time between scans. Zero is clamped to one second.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Notify every event starting within the window from `now`.
    ///
    /// Stops at the first notifier failure; the next cycle retries.
    pub fn scan_once(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let reminders = self.store.upcoming(now);
        for reminder in &reminders {
            self.notifier
                .notify(reminder)
                .with_context(|| format!("failed to notify event {}", reminder.event.id))?;
        }
        Ok(reminders.len())
    }

    /// Run the scanner on the current runtime until shut down.
    pub fn spawn(self) -> ReminderHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(shutdown_rx));
        ReminderHandle {
            shutdown_tx,
            handle,
        }
    }

    /// Scan immediately, then once per interval, until `shutdown_rx` fires.
    ///
    /// A failed cycle is logged and the loop keeps going.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Reminder scanner started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.scan_once(Utc::now()) {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "Reminder scan emitted notices"),
                        Err(e) => error!(error = %format!("{e:#}"), "Reminder scan failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    debug!("Reminder scanner: shutdown requested");
                    break;
                }
            }
        }

        info!("Reminder scanner stopped");
    }
}

/// Handle to a spawned [`ReminderScanner`].
pub struct ReminderHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ReminderHandle {
    /// Signal the scanner to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Reminder scanner task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NewEvent;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, TempDir};

    /// Collects every notice it receives.
    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<Reminder>>,
    }

    impl ReminderNotifier for RecordingNotifier {
        fn notify(&self, reminder: &Reminder) -> anyhow::Result<()> {
            self.seen.lock().push(reminder.clone());
            Ok(())
        }
    }

    /// Fails on its first call, succeeds afterwards.
    #[derive(Default)]
    struct FlakyNotifier {
        calls: AtomicUsize,
    }

    impl ReminderNotifier for FlakyNotifier {
        fn notify(&self, _reminder: &Reminder) -> anyhow::Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("notifier offline");
            }
            Ok(())
        }
    }

    fn store_with_event_in(minutes: i64) -> (Arc<EventStore>, TempDir) {
        let dir = tempdir().unwrap();
        let store = EventStore::open(dir.path().join("events.json")).unwrap();
        let start = Utc::now() + chrono::Duration::minutes(minutes);
        store
            .create(NewEvent {
                title: Some("Soon".to_string()),
                description: Some("prepare slides".to_string()),
                start_time: Some(format_datetime(&start)),
                end_time: Some(format_datetime(&(start + chrono::Duration::hours(1)))),
                ..Default::default()
            })
            .unwrap();
        (Arc::new(store), dir)
    }

    #[test]
    fn test_scan_once_notifies_upcoming_events() {
        let (store, _dir) = store_with_event_in(30);
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = ReminderScanner::new(store, notifier.clone());

        let count = scanner.scan_once(Utc::now()).unwrap();

        assert_eq!(count, 1);
        let seen = notifier.seen.lock();
        assert_eq!(seen[0].event.title, "Soon");
        assert!((28..=30).contains(&seen[0].minutes_until));
    }

    #[test]
    fn test_scan_once_ignores_distant_events() {
        let (store, _dir) = store_with_event_in(600);
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = ReminderScanner::new(store, notifier.clone());

        assert_eq!(scanner.scan_once(Utc::now()).unwrap(), 0);
        assert!(notifier.seen.lock().is_empty());
    }

    #[test]
    fn test_scan_once_surfaces_notifier_failure() {
        let (store, _dir) = store_with_event_in(10);
        let scanner = ReminderScanner::new(store, Arc::new(FlakyNotifier::default()));

        let err = scanner.scan_once(Utc::now()).unwrap_err();
        assert!(format!("{err:#}").contains("notifier offline"));
    }

    #[test]
    fn test_log_notifier_never_fails() {
        let (store, _dir) = store_with_event_in(5);
        let scanner = ReminderScanner::new(store, Arc::new(LogNotifier));
        assert_eq!(scanner.scan_once(Utc::now()).unwrap(), 1);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let (store, _dir) = store_with_event_in(5);
        let scanner =
            ReminderScanner::new(store, Arc::new(LogNotifier)).with_interval(Duration::ZERO);
        assert_eq!(scanner.interval(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_failed_cycle() {
        let (store, _dir) = store_with_event_in(30);
        let notifier = Arc::new(FlakyNotifier::default());
        let handle = ReminderScanner::new(store, notifier.clone())
            .with_interval(Duration::from_secs(60))
            .spawn();

        // First tick fires immediately and fails; the second one succeeds
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(notifier.calls.load(Ordering::SeqCst) >= 2);
        assert!(!handle.is_finished());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let (store, _dir) = store_with_event_in(600);
        let handle = ReminderScanner::new(store, Arc::new(LogNotifier)).spawn();

        tokio::task::yield_now().await;
        handle.shutdown().await;
    }
}
