// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket message envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::DeviceSummary;
use crate::state::ChangeSet;
use crate::types::MacAddress;

/// Message pushed from the server to a client.
///
/// # Examples
///
/// ```
/// use climate_hub::hub::ServerEvent;
///
/// let event = ServerEvent::error("unknown device");
/// assert_eq!(
///     serde_json::to_string(&event).unwrap(),
///     r#"{"type":"error","message":"unknown device"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full snapshot, sent once right after a client connects.
    List {
        /// Every known device.
        data: Vec<DeviceSummary>,
    },
    /// A poll or command detected a change.
    Report {
        /// Device that changed.
        mac: MacAddress,
        /// Changed parameters.
        data: ChangeSet,
    },
    /// An update was applied but had no observable effect.
    NotChanged {
        /// Device the update targeted.
        mac: MacAddress,
        /// Human-readable explanation.
        message: String,
    },
    /// A client request failed.
    Error {
        /// Human-readable explanation.
        message: String,
    },
}

impl ServerEvent {
    /// Creates a `not_changed` event for `mac`.
    #[must_use]
    pub fn not_changed(mac: MacAddress) -> Self {
        Self::NotChanged {
            message: format!("device {mac} did not change"),
            mac,
        }
    }

    /// Creates an `error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns the event type tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Report { .. } => "report",
            Self::NotChanged { .. } => "not_changed",
            Self::Error { .. } => "error",
        }
    }
}

/// Message sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Requests a parameter update on one device.
    Update {
        /// Target device, parsed by the dispatcher.
        mac: String,
        /// Requested parameter values.
        #[serde(default)]
        data: Map<String, Value>,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::{DeviceState, diff};
    use crate::types::Param;

    fn mac() -> MacAddress {
        "aabbccddeeff".parse().unwrap()
    }

    #[test]
    fn report_envelope() {
        let old = DeviceState::new().with(Param::Power, false);
        let new = DeviceState::new().with(Param::Power, true);
        let event = ServerEvent::Report {
            mac: mac(),
            data: diff(&old, &new),
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "report",
                "mac": "aabbccddeeff",
                "data": { "power": { "old": false, "new": true } },
            })
        );
    }

    #[test]
    fn list_envelope() {
        let event = ServerEvent::List { data: Vec::new() };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "list", "data": [] })
        );
        assert_eq!(event.kind(), "list");
    }

    #[test]
    fn not_changed_envelope() {
        let value = serde_json::to_value(ServerEvent::not_changed(mac())).unwrap();
        assert_eq!(value["type"], "not_changed");
        assert_eq!(value["mac"], "aabbccddeeff");
        assert!(value["message"].is_string());
    }

    #[test]
    fn parses_update_message() {
        let message: ClientMessage = serde_json::from_str(
            r#"{"type":"update","mac":"aabbccddeeff","data":{"power":true}}"#,
        )
        .unwrap();

        let ClientMessage::Update { mac, data } = message;
        assert_eq!(mac, "aabbccddeeff");
        assert_eq!(data.get("power"), Some(&json!(true)));
    }

    #[test]
    fn rejects_unknown_message_type() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
