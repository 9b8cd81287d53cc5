// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast discovery of climate devices.
//!
//! The [`Scanner`] sends one probe through a [`Discovery`] implementation,
//! collects replies for the requested time and merges them into the
//! [`Registry`].
//!
//! # Merge policy
//!
//! - An unknown hardware address creates a new record in the `Pending` state.
//! - A known address has its network address refreshed. Its cached state and
//!   connectivity are kept, so the poll loop resumes without a visible reset.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use climate_hub::discovery::Scanner;
//! use climate_hub::registry::Registry;
//! use climate_hub::transport::udp::{UdpConnector, UdpDiscovery};
//!
//! # async fn example() {
//! let registry = Arc::new(Registry::new());
//! let scanner = Scanner::new(
//!     Arc::new(UdpDiscovery::broadcast()),
//!     Arc::new(UdpConnector),
//!     Arc::clone(&registry),
//! );
//!
//! let report = scanner.scan_and_merge(Duration::from_secs(3)).await;
//! println!("Found {} devices, {} new", report.discovered.len(), report.added.len());
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::registry::{DeviceIdentity, Registry, UpsertOutcome};
use crate::transport::{DeviceConnector, Discovery};
use crate::types::MacAddress;

/// Extra time granted to a probe beyond its collection window before it is
/// abandoned.
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// Outcome of a scan merged into the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Every device that answered the probe.
    pub discovered: Vec<MacAddress>,
    /// Devices that were not registered before this scan.
    pub added: Vec<MacAddress>,
}

/// Finds devices and merges them into the registry.
pub struct Scanner {
    discovery: Arc<dyn Discovery>,
    connector: Arc<dyn DeviceConnector>,
    registry: Arc<Registry>,
}

impl Scanner {
    /// Creates a scanner feeding `registry`.
    #[must_use]
    pub fn new(
        discovery: Arc<dyn Discovery>,
        connector: Arc<dyn DeviceConnector>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            discovery,
            connector,
            registry,
        }
    }

    /// Sends a probe and returns the devices that answered within `timeout`.
    ///
    /// Finding nothing yields an empty list. A socket fault is logged as a
    /// warning and also yields an empty list.
    pub async fn scan(&self, timeout: Duration) -> Vec<DeviceIdentity> {
        let probe = self.discovery.broadcast_probe(timeout);

        match tokio::time::timeout(timeout + PROBE_GRACE, probe).await {
            Ok(Ok(identities)) => {
                tracing::debug!(count = identities.len(), "Discovery scan finished");
                identities
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Discovery scan failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis(), "Discovery probe did not finish in time");
                Vec::new()
            }
        }
    }

    /// Scans and merges the results into the registry.
    pub async fn scan_and_merge(&self, timeout: Duration) -> ScanReport {
        let mut report = ScanReport::default();

        for identity in self.scan(timeout).await {
            let mac = identity.mac.clone();
            let handle = self.connector.connect(&identity);

            if self.registry.upsert(identity, handle, None) == UpsertOutcome::Inserted {
                report.added.push(mac.clone());
            }
            report.discovered.push(mac);
        }

        tracing::info!(
            discovered = report.discovered.len(),
            added = report.added.len(),
            "Discovery merged"
        );
        report
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::net::SocketAddr;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::{DiscoveryError, TransportError};
    use crate::state::DeviceState;
    use crate::transport::{DeviceHandle, ParamMap, Reading};
    use crate::types::Param;

    struct StaticDiscovery(Mutex<Option<Result<Vec<DeviceIdentity>, DiscoveryError>>>);

    impl StaticDiscovery {
        fn found(identities: Vec<DeviceIdentity>) -> Self {
            Self(Mutex::new(Some(Ok(identities))))
        }
    }

    #[async_trait]
    impl Discovery for StaticDiscovery {
        async fn broadcast_probe(
            &self,
            _timeout: Duration,
        ) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
            self.0.lock().take().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct HangingDiscovery;

    #[async_trait]
    impl Discovery for HangingDiscovery {
        async fn broadcast_probe(
            &self,
            _timeout: Duration,
        ) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
            std::future::pending().await
        }
    }

    struct Offline;

    #[async_trait]
    impl DeviceHandle for Offline {
        async fn read_state(&self) -> Result<Reading, TransportError> {
            Err(TransportError::Unreachable("offline".into()))
        }

        async fn write_params(&self, _: &ParamMap) -> Result<(), TransportError> {
            Err(TransportError::Unreachable("offline".into()))
        }
    }

    struct OfflineConnector;

    impl DeviceConnector for OfflineConnector {
        fn connect(&self, _: &DeviceIdentity) -> Arc<dyn DeviceHandle> {
            Arc::new(Offline)
        }
    }

    fn identity(mac: &str, address: &str) -> DeviceIdentity {
        DeviceIdentity::new(mac.parse().unwrap(), address.parse().unwrap(), "Unit")
    }

    fn scanner(discovery: impl Discovery + 'static, registry: &Arc<Registry>) -> Scanner {
        Scanner::new(Arc::new(discovery), Arc::new(OfflineConnector), Arc::clone(registry))
    }

    #[tokio::test]
    async fn empty_scan_is_not_an_error() {
        let registry = Arc::new(Registry::new());
        let report = scanner(StaticDiscovery::found(Vec::new()), &registry)
            .scan_and_merge(Duration::from_millis(10))
            .await;

        assert_eq!(report, ScanReport::default());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn socket_fault_yields_empty_result() {
        let registry = Arc::new(Registry::new());
        let fault = DiscoveryError::Socket(io::Error::new(io::ErrorKind::AddrInUse, "busy"));
        let discovery = StaticDiscovery(Mutex::new(Some(Err(fault))));

        let found = scanner(discovery, &registry).scan(Duration::from_millis(10)).await;
        assert!(found.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_is_abandoned() {
        let registry = Arc::new(Registry::new());
        let found = scanner(HangingDiscovery, &registry).scan(Duration::from_secs(3)).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn merge_refreshes_known_devices_and_reports_new_ones() {
        let registry = Arc::new(Registry::new());
        let state = DeviceState::new().with(Param::Power, true);
        registry.upsert(
            identity("aabbccddeeff", "10.0.0.2:7000"),
            Arc::new(Offline),
            Some(state.clone()),
        );

        let discovery = StaticDiscovery::found(vec![
            identity("aabbccddeeff", "10.0.0.7:7000"),
            identity("001122334455", "10.0.0.8:7000"),
        ]);
        let report = scanner(discovery, &registry)
            .scan_and_merge(Duration::from_millis(10))
            .await;

        assert_eq!(report.discovered.len(), 2);
        assert_eq!(report.added, vec!["001122334455".parse::<MacAddress>().unwrap()]);

        let known = registry.get(&"aabbccddeeff".parse().unwrap()).unwrap();
        let address: SocketAddr = "10.0.0.7:7000".parse().unwrap();
        assert_eq!(known.record().identity.address, address);
        assert_eq!(known.state(), state);
    }
}
