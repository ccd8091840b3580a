//! Status reconciliation worker for the bouncer client.
//!
//! After a block/unblock request is accepted, the backend applies the
//! change asynchronously. This crate polls the device list until the
//! device reports the expected status, or a bounded attempt count runs
//! out, and emits exactly one event either way.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────┐  watch()   ┌──────────────────┐  list_devices  ┌─────────┐
//! │ Presentation │───────────▶│ StatusReconciler │───────────────▶│ Backend │
//! │    Layer     │◀───────────│  (poll loop)     │                └─────────┘
//! └──────────────┘  events    └──────────────────┘
//! ```
//!
//! ## Key behavior
//!
//! - **Explicit state machine**: each watch moves
//!   `Polling → Confirmed | TimedOut | Cancelled`.
//! - **Bounded polling**: one list fetch per interval (default 2s), at
//!   most `max_attempts` (default 10) fetches.
//! - **Errors are non-fatal**: a failed poll is logged, consumes an
//!   attempt, and polling continues; the loop never surfaces the
//!   underlying transient error, only a timeout.
//! - **One watch per device**: a second watch for a device already in
//!   flight is rejected with [`ReconcileError::AlreadyPending`].
//! - **Cancellable**: [`WatchHandle::cancel`] stops a loop; a cancelled
//!   watch emits no event.
//!
//! ## Example
//!
//! ```ignore
//! use status_reconcile_worker::{ReconcileConfig, StatusReconciler};
//!
//! let (events, mut rx) = tokio::sync::mpsc::channel(16);
//! let reconciler = StatusReconciler::new(ReconcileConfig::default(), client, events);
//!
//! let expected = client.set_device_status(&id, status).await?;
//! reconciler.watch(id, expected, nickname)?;
//! let event = rx.recv().await; // exactly one Confirmed or TimedOut
//! ```

use bouncer_api::{ApiResult, DeviceClient, DeviceStatus, UserDevice};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Source of device listings for the poll loop.
///
/// [`DeviceClient`] is the production implementation; tests substitute a
/// scripted fake.
pub trait DeviceLister: Send + Sync {
    /// Fetch the current device list.
    fn list_devices(&self) -> impl Future<Output = ApiResult<Vec<UserDevice>>> + Send;
}

impl DeviceLister for DeviceClient {
    fn list_devices(&self) -> impl Future<Output = ApiResult<Vec<UserDevice>>> + Send {
        DeviceClient::list_devices(self)
    }
}

/// Configuration for polling cadence and bounds.
///
/// # Fields
///
/// - `poll_interval`: delay between list fetches (default: 2s)
/// - `max_attempts`: fetches before giving up (default: 10)
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Delay between consecutive polls.
    pub poll_interval: Duration,
    /// Maximum number of polls before reporting a timeout.
    pub max_attempts: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            max_attempts: 10,
        }
    }
}

/// An in-flight expectation about one device's status.
#[derive(Debug, Clone)]
struct PendingUpdate {
    device_id: String,
    expected_status: DeviceStatus,
    nickname: String,
    attempts_remaining: u32,
}

/// States of a single watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    /// Waiting for the backend to report the expected status.
    Polling { attempts_remaining: u32 },
    /// The expected status was observed.
    Confirmed,
    /// Attempts ran out before the expected status appeared.
    TimedOut,
    /// The watch was cancelled; no event is emitted.
    Cancelled,
}

/// Terminal notification for a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// The device reported the expected status.
    Confirmed {
        device_id: String,
        nickname: String,
        status: DeviceStatus,
    },
    /// Attempts were exhausted; the device may still be stale in the UI
    /// until the next manual refresh.
    TimedOut { device_id: String, nickname: String },
}

impl ReconcileEvent {
    /// The device this event is about.
    pub fn device_id(&self) -> &str {
        match self {
            ReconcileEvent::Confirmed { device_id, .. }
            | ReconcileEvent::TimedOut { device_id, .. } => device_id,
        }
    }

    /// Human-readable status message for the presentation layer.
    pub fn message(&self) -> String {
        match self {
            ReconcileEvent::Confirmed {
                nickname, status, ..
            } => format!("{nickname} has been {status}"),
            ReconcileEvent::TimedOut { nickname, .. } => {
                format!("Timeout waiting for {nickname}'s status update")
            }
        }
    }
}

/// Errors from starting a watch.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The device already has an active watch.
    #[error("A status update for device {device_id} is already pending")]
    AlreadyPending { device_id: String },
}

/// Handle to a spawned watch.
#[derive(Debug)]
pub struct WatchHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Request cancellation. The loop observes the flag before its next
    /// poll and before emitting any event.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Wait for the watch task to finish.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Shared map of devices with an active watch.
///
/// The entry doubles as the per-device busy flag for the presentation
/// layer; it is removed when the watch reaches a terminal state.
type InFlight = Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>;

/// The reconciliation worker.
///
/// Holds a device lister and an event channel; each accepted [`watch`]
/// spawns one bounded poll loop.
///
/// [`watch`]: StatusReconciler::watch
pub struct StatusReconciler<L: DeviceLister + 'static> {
    config: ReconcileConfig,
    lister: Arc<L>,
    events: mpsc::Sender<ReconcileEvent>,
    in_flight: InFlight,
}

impl<L: DeviceLister + 'static> StatusReconciler<L> {
    /// Create a new reconciler emitting events on `events`.
    pub fn new(config: ReconcileConfig, lister: Arc<L>, events: mpsc::Sender<ReconcileEvent>) -> Self {
        Self {
            config,
            lister,
            events,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether a watch for `device_id` is currently in flight.
    pub fn is_pending(&self, device_id: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .contains_key(device_id)
    }

    /// Start polling until `device_id` reports `expected_status`.
    ///
    /// Rejects the request if the device already has an active watch.
    pub fn watch(
        &self,
        device_id: impl Into<String>,
        expected_status: DeviceStatus,
        nickname: impl Into<String>,
    ) -> Result<WatchHandle, ReconcileError> {
        let device_id = device_id.into();
        let cancelled = Arc::new(AtomicBool::new(false));

        {
            let mut guard = self.in_flight.lock().expect("in-flight lock poisoned");
            if guard.contains_key(&device_id) {
                return Err(ReconcileError::AlreadyPending { device_id });
            }
            guard.insert(device_id.clone(), cancelled.clone());
        }

        let update = PendingUpdate {
            device_id,
            expected_status,
            nickname: nickname.into(),
            attempts_remaining: self.config.max_attempts,
        };
        info!(
            device_id = %update.device_id,
            expected = %update.expected_status,
            attempts = update.attempts_remaining,
            "Watching for status change"
        );

        let task = tokio::spawn(run_watch(
            self.config.clone(),
            self.lister.clone(),
            self.events.clone(),
            self.in_flight.clone(),
            cancelled.clone(),
            update,
        ));

        Ok(WatchHandle { cancelled, task })
    }
}

/// Drive one watch to a terminal state.
///
/// Each iteration sleeps for the poll interval, re-checks the cancel
/// flag, fetches the list, and compares the device's reported status to
/// the expectation. List errors are swallowed and consume an attempt.
async fn run_watch<L: DeviceLister>(
    config: ReconcileConfig,
    lister: Arc<L>,
    events: mpsc::Sender<ReconcileEvent>,
    in_flight: InFlight,
    cancelled: Arc<AtomicBool>,
    update: PendingUpdate,
) {
    let mut state = WatchState::Polling {
        attempts_remaining: update.attempts_remaining,
    };

    let terminal = loop {
        let WatchState::Polling { attempts_remaining } = state else {
            break state;
        };
        if attempts_remaining == 0 {
            break WatchState::TimedOut;
        }

        sleep(config.poll_interval).await;
        if cancelled.load(Ordering::SeqCst) {
            break WatchState::Cancelled;
        }

        match lister.list_devices().await {
            Ok(devices) => {
                let observed = devices
                    .iter()
                    .find(|row| row.device.id == update.device_id)
                    .map(|row| row.device.status);
                if observed == Some(update.expected_status) {
                    break WatchState::Confirmed;
                }
                debug!(
                    device_id = %update.device_id,
                    observed = ?observed,
                    expected = %update.expected_status,
                    attempts_remaining = attempts_remaining - 1,
                    "Status not yet reconciled"
                );
            }
            Err(err) => {
                warn!(
                    device_id = %update.device_id,
                    error = %err,
                    "Poll failed, counting as a missed attempt"
                );
            }
        }

        state = WatchState::Polling {
            attempts_remaining: attempts_remaining - 1,
        };
    };

    // Clear the busy flag before notifying so a handler can immediately
    // issue a new toggle for this device.
    in_flight
        .lock()
        .expect("in-flight lock poisoned")
        .remove(&update.device_id);

    if cancelled.load(Ordering::SeqCst) {
        debug!(device_id = %update.device_id, "Watch cancelled, no event emitted");
        return;
    }

    let event = match terminal {
        WatchState::Confirmed => ReconcileEvent::Confirmed {
            device_id: update.device_id,
            nickname: update.nickname,
            status: update.expected_status,
        },
        WatchState::TimedOut => ReconcileEvent::TimedOut {
            device_id: update.device_id,
            nickname: update.nickname,
        },
        WatchState::Cancelled | WatchState::Polling { .. } => return,
    };

    if events.send(event).await.is_err() {
        debug!("Event receiver dropped");
    }
}
