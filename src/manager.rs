// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coordinator for the synchronization engine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::discovery::{ScanReport, Scanner};
use crate::dispatcher::{CommandDispatcher, CommandOutcome};
use crate::error::{Error, Result};
use crate::hub::{ClientSubscription, DEFAULT_CLIENT_QUEUE, NotificationHub};
use crate::poller::{Poller, PollerConfig};
use crate::registry::{DeviceSummary, Registry};
use crate::transport::{DeviceConnector, Discovery};
use crate::types::MacAddress;

/// Default time a discovery probe collects replies.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Settings of a [`ClimateManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// How long a discovery probe collects replies.
    pub discovery_timeout: Duration,
    /// Poll loop settings; the I/O timeout also bounds commands.
    pub poller: PollerConfig,
    /// Per-client event queue capacity.
    pub client_queue: usize,
}

impl ManagerConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the discovery timeout.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Sets the poll loop settings.
    #[must_use]
    pub fn with_poller(mut self, poller: PollerConfig) -> Self {
        self.poller = poller;
        self
    }

    /// Sets the per-client queue capacity.
    #[must_use]
    pub fn with_client_queue(mut self, capacity: usize) -> Self {
        self.client_queue = capacity;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            poller: PollerConfig::default(),
            client_queue: DEFAULT_CLIENT_QUEUE,
        }
    }
}

/// Ties discovery, polling, commands and notifications to one registry.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use climate_hub::manager::{ClimateManager, ManagerConfig};
/// use climate_hub::transport::udp::{UdpConnector, UdpDiscovery};
///
/// #[tokio::main]
/// async fn main() -> climate_hub::Result<()> {
///     let manager = ClimateManager::new(
///         Arc::new(UdpDiscovery::broadcast()),
///         Arc::new(UdpConnector),
///         ManagerConfig::default(),
///     );
///
///     manager.start().await;
///
///     for device in manager.devices() {
///         println!("{} at {}", device.name, device.ip);
///     }
///
///     manager.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct ClimateManager {
    registry: Arc<Registry>,
    hub: Arc<NotificationHub>,
    scanner: Scanner,
    poller: Poller,
    dispatcher: CommandDispatcher,
    discovery_timeout: Duration,
}

impl ClimateManager {
    /// Creates a manager with an empty registry.
    #[must_use]
    pub fn new(
        discovery: Arc<dyn Discovery>,
        connector: Arc<dyn DeviceConnector>,
        config: ManagerConfig,
    ) -> Self {
        let registry = Arc::new(Registry::new());
        let hub = Arc::new(NotificationHub::new(config.client_queue));
        let scanner = Scanner::new(discovery, connector, Arc::clone(&registry));
        let dispatcher = CommandDispatcher::new(Arc::clone(&registry), Arc::clone(&hub))
            .with_io_timeout(config.poller.io_timeout);
        let poller = Poller::new(Arc::clone(&registry), Arc::clone(&hub), config.poller);

        Self {
            registry,
            hub,
            scanner,
            poller,
            dispatcher,
            discovery_timeout: config.discovery_timeout,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Runs the initial discovery and starts polling every device found.
    pub async fn start(&self) -> ScanReport {
        let report = self.rediscover().await;
        tracing::info!(devices = self.registry.len(), "Climate manager started");
        report
    }

    /// Scans again and starts loops for devices that have none.
    ///
    /// Devices already polled keep their loop; a refreshed address is used
    /// from their next read.
    pub async fn rediscover(&self) -> ScanReport {
        let report = self.scanner.scan_and_merge(self.discovery_timeout).await;
        let started = self.poller.start_all();
        if started > 0 {
            tracing::debug!(started, "Started poll loops");
        }
        report
    }

    /// Stops every poll loop and disconnects every client.
    pub async fn shutdown(&self) {
        self.poller.shutdown().await;
        self.hub.close_all();
        tracing::info!("Climate manager stopped");
    }

    // =========================================================================
    // Devices
    // =========================================================================

    /// Applies an update request to the device with hardware address `mac`.
    ///
    /// An address that is not a valid hardware address cannot belong to a
    /// registered device and is reported as not found.
    ///
    /// # Errors
    ///
    /// See [`CommandDispatcher::apply`].
    pub async fn apply(&self, mac: &str, request: &Map<String, Value>) -> Result<CommandOutcome> {
        let mac: MacAddress = mac
            .parse()
            .map_err(|_| Error::DeviceNotFound(mac.to_string()))?;
        self.dispatcher.apply(&mac, request).await
    }

    /// Returns the summary of every device.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceSummary> {
        self.registry.summaries()
    }

    /// Returns the summary of one device.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the device is unknown.
    pub fn device(&self, mac: &MacAddress) -> Result<DeviceSummary> {
        Ok(self.registry.entry(mac)?.summary())
    }

    /// Returns every known hardware address.
    #[must_use]
    pub fn macs(&self) -> Vec<MacAddress> {
        self.registry.macs()
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Registers a client; its first event is the current `list`.
    #[must_use]
    pub fn connect_client(&self) -> ClientSubscription {
        self.hub.connect(|| self.registry.summaries())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the notification hub.
    #[must_use]
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Returns the poller.
    #[must_use]
    pub fn poller(&self) -> &Poller {
        &self.poller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.discovery_timeout, Duration::from_secs(3));
        assert_eq!(config.client_queue, DEFAULT_CLIENT_QUEUE);
        assert_eq!(config.poller, PollerConfig::default());
    }

    #[test]
    fn builder_overrides() {
        let config = ManagerConfig::new()
            .with_discovery_timeout(Duration::from_secs(1))
            .with_client_queue(8)
            .with_poller(PollerConfig::new(Duration::from_secs(5)));

        assert_eq!(config.discovery_timeout, Duration::from_secs(1));
        assert_eq!(config.client_queue, 8);
        assert_eq!(config.poller.interval, Duration::from_secs(5));
    }
}
