// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device polling.
//!
//! The [`Poller`] runs one task per registered device. Each task reads the
//! device, diffs the reading against the registry's cached state, stores it
//! and broadcasts a `report` when something changed. Tasks share nothing but
//! the registry and the hub, so a slow device only delays its own loop.
//!
//! # Failure handling
//!
//! A failed read (timeout, transport error, structurally invalid reply)
//! increments the record's failure counter. Once [`PollerConfig::failure_threshold`]
//! consecutive reads failed the device is marked disconnected. The next read
//! is scheduled with exponential backoff instead of the regular interval.
//!
//! The first successful read after a disconnection restores the device and
//! broadcasts every current parameter, since clients only know the state from
//! before the outage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Result, TransportError};
use crate::hub::{NotificationHub, ServerEvent};
use crate::registry::{DeviceEntry, Registry};
use crate::state::{ChangeSet, DeviceState, diff};
use crate::types::MacAddress;

/// Default interval between two reads of a healthy device.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default timeout applied to every device I/O call.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of consecutive failures before a device is disconnected.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Delay schedule for retries after failed reads.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use climate_hub::poller::BackoffPolicy;
///
/// let policy = BackoffPolicy::new()
///     .with_initial_delay(Duration::from_secs(2))
///     .with_max_delay(Duration::from_secs(10));
///
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(2));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(4));
/// assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor per additional failure.
    pub backoff_multiplier: f32,
}

impl BackoffPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay after the first failure.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the upper bound for any delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before retry number `attempt`, counting from zero.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let multiplier = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        // Delays are seconds to minutes, far from f32 precision limits
        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay.as_millis() as f32 * multiplier;

        // Saturates on overflow; min() below bounds the result
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_POLL_INTERVAL,
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Interval between reads of a healthy device.
    pub interval: Duration,
    /// Timeout of each read.
    pub io_timeout: Duration,
    /// Consecutive failures before the device is marked disconnected.
    pub failure_threshold: u32,
    /// Retry schedule after failures.
    pub backoff: BackoffPolicy,
}

impl PollerConfig {
    /// Creates a configuration polling every `interval`.
    ///
    /// Backoff starts at `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            backoff: BackoffPolicy::default().with_initial_delay(interval),
            ..Self::default()
        }
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the failure threshold. Zero is raised to one.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the delay before the next read given the outcome of the last one.
    #[must_use]
    pub fn next_delay(&self, outcome: &PollOutcome) -> Duration {
        match outcome {
            PollOutcome::Failed { failures } | PollOutcome::Disconnected { failures } => self
                .backoff
                .delay_for_attempt(failures.saturating_sub(1)),
            _ => self.interval,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            io_timeout: DEFAULT_IO_TIMEOUT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The reading matched the cached state.
    Unchanged,
    /// Some parameters changed; a `report` was broadcast.
    Changed(ChangeSet),
    /// The device answered again after being disconnected; every parameter
    /// was broadcast.
    Reconnected(ChangeSet),
    /// The read failed, below the threshold.
    Failed {
        /// Consecutive failures so far.
        failures: u32,
    },
    /// The read failed and the device is disconnected.
    Disconnected {
        /// Consecutive failures so far.
        failures: u32,
    },
}

/// Reads one device under its operation guard and publishes the result.
pub(crate) async fn poll_device(
    entry: &DeviceEntry,
    hub: &NotificationHub,
    config: &PollerConfig,
) -> PollOutcome {
    let _guard = entry.lock_operation().await;
    let mac = entry.mac();

    match read_confirmed(entry, config.io_timeout).await {
        Ok(state) => {
            let (was_disconnected, changes) = store_reading(entry, state);

            if !changes.is_empty() {
                hub.broadcast(ServerEvent::Report {
                    mac: mac.clone(),
                    data: changes.clone(),
                });
            }

            if was_disconnected {
                tracing::info!(%mac, "Device reconnected");
                PollOutcome::Reconnected(changes)
            } else if changes.is_empty() {
                PollOutcome::Unchanged
            } else {
                tracing::debug!(%mac, changed = changes.len(), "Device state changed");
                PollOutcome::Changed(changes)
            }
        }
        Err(e) => {
            let (failures, crossed, disconnected) = entry.update(|record| {
                let crossed = record.mark_failed(config.failure_threshold);
                (
                    record.consecutive_failures,
                    crossed,
                    record.connection.is_disconnected(),
                )
            });

            if crossed {
                tracing::warn!(%mac, failures, error = %e, "Device marked disconnected");
            } else {
                tracing::debug!(%mac, failures, error = %e, "Poll failed");
            }

            if disconnected {
                PollOutcome::Disconnected { failures }
            } else {
                PollOutcome::Failed { failures }
            }
        }
    }
}

/// Stores a successful reading and returns what clients must be told.
///
/// Returns whether the device was disconnected before this reading, and the
/// change set to report. After a disconnection every parameter is restated.
/// Callers hold the entry's operation guard.
pub(crate) fn store_reading(entry: &DeviceEntry, state: DeviceState) -> (bool, ChangeSet) {
    entry.update(|record| {
        let was_disconnected = record.connection.is_disconnected();
        let changes = if was_disconnected {
            ChangeSet::restating(&record.state, &state)
        } else {
            diff(&record.state, &state)
        };
        record.mark_seen(state);
        (was_disconnected, changes)
    })
}

/// Reads the device and conforms the reading to its capability set.
pub(crate) async fn read_confirmed(
    entry: &DeviceEntry,
    io_timeout: Duration,
) -> std::result::Result<DeviceState, TransportError> {
    let handle = entry.handle();
    let raw = tokio::time::timeout(io_timeout, handle.read_state())
        .await
        .map_err(|_| TransportError::timeout(io_timeout))??;
    DeviceState::from_reading(&raw, &entry.capabilities())
}

/// Owns the poll loop of every device.
#[derive(Debug)]
pub struct Poller {
    registry: Arc<Registry>,
    hub: Arc<NotificationHub>,
    config: PollerConfig,
    tasks: Mutex<HashMap<MacAddress, JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Poller {
    /// Creates a poller; no loop runs until [`start`](Self::start).
    #[must_use]
    pub fn new(registry: Arc<Registry>, hub: Arc<NotificationHub>, config: PollerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            hub,
            config,
            tasks: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Starts the poll loop for a device.
    ///
    /// Returns `false` if a loop already runs for it. The first read happens
    /// immediately. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the device is not registered.
    pub fn start(&self, mac: &MacAddress) -> Result<bool> {
        let entry = self.registry.entry(mac)?;
        let mut tasks = self.tasks.lock();

        if tasks.get(mac).is_some_and(|task| !task.is_finished()) {
            return Ok(false);
        }
        if *self.shutdown.borrow() {
            tracing::debug!(%mac, "Poller shut down, not starting loop");
            return Ok(false);
        }

        let hub = Arc::clone(&self.hub);
        let config = self.config.clone();
        let shutdown = self.shutdown.subscribe();
        tasks.insert(
            mac.clone(),
            tokio::spawn(run_loop(entry, hub, config, shutdown)),
        );

        tracing::debug!(%mac, "Started poll loop");
        Ok(true)
    }

    /// Starts loops for every registered device without one.
    ///
    /// Returns the number of loops started.
    pub fn start_all(&self) -> usize {
        self.registry
            .macs()
            .iter()
            .filter(|mac| matches!(self.start(mac), Ok(true)))
            .count()
    }

    /// Returns true if a loop runs for the device.
    #[must_use]
    pub fn is_running(&self, mac: &MacAddress) -> bool {
        self.tasks
            .lock()
            .get(mac)
            .is_some_and(|task| !task.is_finished())
    }

    /// Returns the number of running loops.
    #[must_use]
    pub fn running(&self) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Polls a device once, outside its loop.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the device is not registered.
    pub async fn poll_once(&self, mac: &MacAddress) -> Result<PollOutcome> {
        let entry = self.registry.entry(mac)?;
        Ok(poll_device(&entry, &self.hub, &self.config).await)
    }

    /// Stops every loop and waits for the tasks to finish.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let tasks: Vec<(MacAddress, JoinHandle<()>)> = self.tasks.lock().drain().collect();

        for (mac, task) in tasks {
            if let Err(e) = task.await {
                tracing::error!(%mac, error = %e, "Poll loop ended abnormally");
            }
        }
        tracing::debug!("Poller stopped");
    }
}

async fn run_loop(
    entry: Arc<DeviceEntry>,
    hub: Arc<NotificationHub>,
    config: PollerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let outcome = tokio::select! {
            outcome = poll_device(&entry, &hub, &config) => outcome,
            _ = shutdown.changed() => break,
        };
        let delay = config.next_delay(&outcome);

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }
    tracing::trace!(mac = %entry.mac(), "Poll loop exited");
}
