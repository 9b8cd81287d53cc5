// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authoritative in-memory set of known devices.
//!
//! The [`Registry`] maps hardware addresses to [`DeviceEntry`] values. Each
//! entry owns its [`DeviceRecord`] behind its own lock, so reading one device
//! never waits on another. Every operation that performs device I/O and then
//! mutates a record (a poll, a command) holds the entry's operation guard for
//! its whole duration; see [`DeviceEntry::lock_operation`].
//!
//! The registry never broadcasts. Callers decide what changed and notify.

mod record;

pub use record::{ConnectionState, DeviceIdentity, DeviceRecord, DeviceSummary};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

use crate::capabilities::Capabilities;
use crate::error::{Error, Result};
use crate::state::DeviceState;
use crate::transport::DeviceHandle;
use crate::types::MacAddress;

/// Result of [`Registry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new record was created.
    Inserted,
    /// An existing record was merged; its network address or state changed.
    Refreshed,
    /// An existing record already matched.
    Unchanged,
}

/// One registered device.
pub struct DeviceEntry {
    mac: MacAddress,
    record: RwLock<DeviceRecord>,
    handle: RwLock<Arc<dyn DeviceHandle>>,
    operation: Mutex<()>,
}

impl DeviceEntry {
    fn new(identity: DeviceIdentity, handle: Arc<dyn DeviceHandle>, state: DeviceState) -> Self {
        Self {
            mac: identity.mac.clone(),
            record: RwLock::new(DeviceRecord::new(identity, state)),
            handle: RwLock::new(handle),
            operation: Mutex::new(()),
        }
    }

    /// Returns the hardware address.
    #[must_use]
    pub fn mac(&self) -> &MacAddress {
        &self.mac
    }

    /// Returns a copy of the record.
    #[must_use]
    pub fn record(&self) -> DeviceRecord {
        self.record.read().clone()
    }

    /// Returns a copy of the last confirmed state.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.record.read().state.clone()
    }

    /// Returns the capability set.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.record.read().identity.capabilities.clone()
    }

    /// Returns the connectivity status.
    #[must_use]
    pub fn connection(&self) -> ConnectionState {
        self.record.read().connection
    }

    /// Returns the client-facing summary.
    #[must_use]
    pub fn summary(&self) -> DeviceSummary {
        self.record.read().summary()
    }

    /// Returns the transport for the device's current address.
    #[must_use]
    pub fn handle(&self) -> Arc<dyn DeviceHandle> {
        Arc::clone(&self.handle.read())
    }

    /// Waits for exclusive access to the device.
    ///
    /// Polls and commands against the same device hold this guard across
    /// their I/O and record update so they never interleave.
    pub async fn lock_operation(&self) -> MutexGuard<'_, ()> {
        self.operation.lock().await
    }

    /// Mutates the record.
    pub fn update<R>(&self, f: impl FnOnce(&mut DeviceRecord) -> R) -> R {
        f(&mut self.record.write())
    }
}

impl std::fmt::Debug for DeviceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEntry")
            .field("mac", &self.mac)
            .field("record", &*self.record.read())
            .finish_non_exhaustive()
    }
}

/// Concurrent map of hardware address to device.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<MacAddress, Arc<DeviceEntry>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a device or merges into the existing record.
    ///
    /// For a known device the network address, name and model are refreshed,
    /// and a changed address swaps in `handle`. The cached state is kept
    /// unless `state` is given.
    ///
    /// The capability set is fixed when the device is first registered. A
    /// later reply that advertises no parameters carries the default set,
    /// which must not replace the one the device announced.
    pub fn upsert(
        &self,
        identity: DeviceIdentity,
        handle: Arc<dyn DeviceHandle>,
        state: Option<DeviceState>,
    ) -> UpsertOutcome {
        let mut entries = self.entries.write();

        let Some(entry) = entries.get(&identity.mac) else {
            tracing::info!(mac = %identity.mac, address = %identity.address, name = %identity.name, "Registered device");
            let mac = identity.mac.clone();
            let entry = DeviceEntry::new(identity, handle, state.unwrap_or_default());
            entries.insert(mac, Arc::new(entry));
            return UpsertOutcome::Inserted;
        };

        let mut record = entry.record.write();
        let mut refreshed = false;

        if record.identity.address != identity.address {
            tracing::info!(
                mac = %identity.mac,
                old = %record.identity.address,
                new = %identity.address,
                "Device address changed"
            );
            record.identity.address = identity.address;
            *entry.handle.write() = handle;
            refreshed = true;
        }
        record.identity.name = identity.name;
        if identity.model.is_some() {
            record.identity.model = identity.model;
        }
        if let Some(state) = state
            && state != record.state
        {
            record.state = state;
            refreshed = true;
        }

        if refreshed {
            UpsertOutcome::Refreshed
        } else {
            UpsertOutcome::Unchanged
        }
    }

    /// Returns the entry for a device.
    #[must_use]
    pub fn get(&self, mac: &MacAddress) -> Option<Arc<DeviceEntry>> {
        self.entries.read().get(mac).cloned()
    }

    /// Returns the entry for a device.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the device is unknown.
    pub fn entry(&self, mac: &MacAddress) -> Result<Arc<DeviceEntry>> {
        self.get(mac).ok_or_else(|| Error::DeviceNotFound(mac.to_string()))
    }

    /// Returns true if the device is known.
    #[must_use]
    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.entries.read().contains_key(mac)
    }

    /// Returns a point-in-time copy of every record, ordered by address.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<DeviceRecord> {
        let entries = self.entries.read();
        let mut records: Vec<DeviceRecord> = entries.values().map(|e| e.record()).collect();
        records.sort_by(|a, b| a.identity.mac.cmp(&b.identity.mac));
        records
    }

    /// Returns the summary of every device, ordered by address.
    #[must_use]
    pub fn summaries(&self) -> Vec<DeviceSummary> {
        self.snapshot_all().iter().map(DeviceRecord::summary).collect()
    }

    /// Returns every known hardware address, sorted.
    #[must_use]
    pub fn macs(&self) -> Vec<MacAddress> {
        let mut macs: Vec<MacAddress> = self.entries.read().keys().cloned().collect();
        macs.sort();
        macs
    }

    /// Returns the number of known devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no device is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
