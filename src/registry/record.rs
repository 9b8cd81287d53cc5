// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device records held by the registry.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capabilities::Capabilities;
use crate::state::DeviceState;
use crate::types::MacAddress;

/// Identity of a discovered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Hardware address. Never changes for a given device.
    pub mac: MacAddress,
    /// Current network address; may change across DHCP renewals.
    pub address: SocketAddr,
    /// Display name.
    pub name: String,
    /// Model reported during discovery, if any.
    pub model: Option<String>,
    /// Parameters the device supports, fixed at first registration.
    pub capabilities: Capabilities,
}

impl DeviceIdentity {
    /// Creates an identity with the default capability set.
    #[must_use]
    pub fn new(mac: MacAddress, address: SocketAddr, name: impl Into<String>) -> Self {
        Self {
            mac,
            address,
            name: name.into(),
            model: None,
            capabilities: Capabilities::default(),
        }
    }

    /// Sets the capability set.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Connectivity of a device as seen by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Discovered but not read yet.
    #[default]
    Pending,
    /// Last read succeeded, or failures are below the threshold.
    Connected,
    /// Consecutive failures crossed the threshold.
    Disconnected,
}

impl ConnectionState {
    /// Returns true if the device is connected.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if the device has been marked disconnected.
    #[must_use]
    pub fn is_disconnected(self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// Everything the registry knows about one device.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    /// Device identity.
    pub identity: DeviceIdentity,
    /// Last confirmed state.
    pub state: DeviceState,
    /// Connectivity status.
    pub connection: ConnectionState,
    /// Failed reads since the last success.
    pub consecutive_failures: u32,
    /// Time of the last successful read.
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    /// Creates a record for a freshly discovered device.
    #[must_use]
    pub fn new(identity: DeviceIdentity, state: DeviceState) -> Self {
        Self {
            identity,
            state,
            connection: ConnectionState::Pending,
            consecutive_failures: 0,
            last_seen: None,
        }
    }

    /// Records a successful read of `state`.
    ///
    /// Returns the connectivity status held before the read.
    pub fn mark_seen(&mut self, state: DeviceState) -> ConnectionState {
        let previous = self.connection;
        self.state = state;
        self.connection = ConnectionState::Connected;
        self.consecutive_failures = 0;
        self.last_seen = Some(Utc::now());
        previous
    }

    /// Records a failed read.
    ///
    /// The device is marked disconnected once `threshold` consecutive reads
    /// have failed. Returns `true` if this failure caused the transition.
    pub fn mark_failed(&mut self, threshold: u32) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= threshold && !self.connection.is_disconnected() {
            self.connection = ConnectionState::Disconnected;
            return true;
        }
        false
    }

    /// Builds the client-facing summary.
    #[must_use]
    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            mac: self.identity.mac.clone(),
            ip: self.identity.address.ip().to_string(),
            name: self.identity.name.clone(),
            connected: self.connection.is_connected(),
            last_seen: self.last_seen,
            state: self.state.clone(),
        }
    }
}

/// Device listing entry shared by `GET /devices` and the WebSocket `list` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    /// Hardware address.
    pub mac: MacAddress,
    /// Network address without port.
    pub ip: String,
    /// Display name.
    pub name: String,
    /// Whether the device is currently reachable.
    pub connected: bool,
    /// Time of the last successful read.
    pub last_seen: Option<DateTime<Utc>>,
    /// Last confirmed parameters, flattened.
    #[serde(flatten)]
    pub state: DeviceState,
}
