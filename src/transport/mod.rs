// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seams to the device-control collaborators.
//!
//! The engine never speaks a device protocol itself. It talks to each device
//! through a [`DeviceHandle`], finds devices through a [`Discovery`]
//! implementation, and obtains handles from a [`DeviceConnector`].
//!
//! None of these calls carry their own deadline: the engine wraps every call
//! in the configured I/O timeout.
//!
//! The [`udp`] module provides a JSON-datagram rendition used by the binary.

pub mod udp;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{DiscoveryError, TransportError};
use crate::registry::DeviceIdentity;
use crate::types::{Param, ParamValue};

/// Raw parameter map as reported by a device.
pub type Reading = Map<String, Value>;

/// Parameter values to write to a device.
pub type ParamMap = BTreeMap<Param, ParamValue>;

/// Transport to one physical device.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// Reads the current parameters from the device.
    async fn read_state(&self) -> Result<Reading, TransportError>;

    /// Writes parameters to the device.
    ///
    /// Success only means the device acknowledged the request. Whether the
    /// values were applied must be confirmed by reading the state back.
    async fn write_params(&self, params: &ParamMap) -> Result<(), TransportError>;
}

/// Broadcast discovery of devices on the local network.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Sends a probe and collects replies until `timeout` elapses.
    ///
    /// Finding nothing is not an error.
    async fn broadcast_probe(&self, timeout: Duration)
    -> Result<Vec<DeviceIdentity>, DiscoveryError>;
}

/// Creates device handles for discovered identities.
pub trait DeviceConnector: Send + Sync {
    /// Returns a handle addressing the device at its current network address.
    fn connect(&self, identity: &DeviceIdentity) -> Arc<dyn DeviceHandle>;
}
