// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client-requested updates.
//!
//! A command is only ever reported once its effect was read back from the
//! device. [`CommandDispatcher::apply`] writes the requested values, reads
//! the device again and diffs that reading against the state cached before
//! the write. Devices may silently reject or clamp values, so the request
//! payload itself is never reported.
//!
//! A confirming read that is the first success after a disconnection
//! restates every parameter, exactly like a poll would.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{Error, Result, TransportError};
use crate::hub::{NotificationHub, ServerEvent};
use crate::poller::{DEFAULT_IO_TIMEOUT, read_confirmed, store_reading};
use crate::registry::Registry;
use crate::state::ChangeSet;
use crate::transport::ParamMap;
use crate::types::{MacAddress, Param};

/// Result of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The confirming read differs from the cached state, or restates it
    /// after a disconnection; a `report` was broadcast.
    Changed(ChangeSet),
    /// The command had no observable effect.
    NotChanged,
}

impl CommandOutcome {
    /// Returns true if the device changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Applies updates to devices.
#[derive(Debug)]
pub struct CommandDispatcher {
    registry: Arc<Registry>,
    hub: Arc<NotificationHub>,
    io_timeout: Duration,
}

impl CommandDispatcher {
    /// Creates a dispatcher with the default I/O timeout.
    #[must_use]
    pub fn new(registry: Arc<Registry>, hub: Arc<NotificationHub>) -> Self {
        Self {
            registry,
            hub,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Sets the timeout applied to the write and to the confirming read.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Writes `request` to the device and reports the confirmed effect.
    ///
    /// Requests are validated in order: the device must exist, every name
    /// must be a writable parameter of the device, and every value must
    /// suit its parameter. An empty request performs no I/O.
    ///
    /// # Errors
    ///
    /// - `Error::DeviceNotFound` if the device is unknown
    /// - `Error::UnsupportedParameter` for a parameter outside the device's
    ///   writable capabilities
    /// - `Error::MalformedRequest` for a value of the wrong kind or range
    /// - `Error::DeviceCommandFailed` if the write or the confirming read
    ///   fails; the registry is left untouched
    pub async fn apply(
        &self,
        mac: &MacAddress,
        request: &Map<String, Value>,
    ) -> Result<CommandOutcome> {
        let entry = self.registry.entry(mac)?;
        let params = validate(mac, &entry.capabilities(), request)?;

        if params.is_empty() {
            return Ok(CommandOutcome::NotChanged);
        }

        let _guard = entry.lock_operation().await;

        let failed = |source: TransportError| {
            tracing::warn!(%mac, error = %source, "Command failed");
            Error::DeviceCommandFailed {
                mac: mac.clone(),
                source,
            }
        };

        let handle = entry.handle();
        tokio::time::timeout(self.io_timeout, handle.write_params(&params))
            .await
            .map_err(|_| TransportError::timeout(self.io_timeout))
            .and_then(|written| written)
            .map_err(failed)?;

        let confirmed = read_confirmed(&entry, self.io_timeout)
            .await
            .map_err(failed)?;

        // Under the guard the cached state is still the one from before the write.
        let (reconnected, changes) = store_reading(&entry, confirmed);
        if reconnected {
            tracing::info!(%mac, "Device reconnected");
        }

        if changes.is_empty() {
            tracing::debug!(%mac, "Command had no effect");
            return Ok(CommandOutcome::NotChanged);
        }

        tracing::info!(%mac, changed = changes.len(), "Command applied");
        self.hub.broadcast(ServerEvent::Report {
            mac: mac.clone(),
            data: changes.clone(),
        });
        Ok(CommandOutcome::Changed(changes))
    }
}

/// Checks every name first, then every value.
fn validate(
    mac: &MacAddress,
    capabilities: &crate::capabilities::Capabilities,
    request: &Map<String, Value>,
) -> Result<ParamMap> {
    let mut named: Vec<(Param, &Value)> = Vec::with_capacity(request.len());
    for (name, value) in request {
        let param = name
            .parse::<Param>()
            .ok()
            .filter(|param| capabilities.accepts_write(*param))
            .ok_or_else(|| Error::UnsupportedParameter {
                mac: mac.clone(),
                parameter: name.clone(),
            })?;
        named.push((param, value));
    }

    named
        .into_iter()
        .map(|(param, value)| {
            param
                .validate_request(value)
                .map(|value| (param, value))
                .map_err(|e| Error::MalformedRequest(e.to_string()))
        })
        .collect::<Result<BTreeMap<_, _>>>()
}
