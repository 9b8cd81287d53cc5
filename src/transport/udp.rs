// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON datagram transport.
//!
//! Every message is one UDP datagram holding a JSON object with a `t` field:
//!
//! | request | reply |
//! |---|---|
//! | `{"t":"scan"}` (broadcast) | `{"t":"dev","mac":..,"name":..,"model":..,"params":[..]}` |
//! | `{"t":"status","mac":..}` | `{"t":"dat","mac":..,"dat":{..}}` |
//! | `{"t":"cmd","mac":..,"opt":{..}}` | `{"t":"res","mac":..,"r":200}` |
//!
//! Payload encryption and device binding are left to the device side.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::{DeviceConnector, DeviceHandle, Discovery, ParamMap, Reading};
use crate::capabilities::Capabilities;
use crate::error::{DiscoveryError, TransportError};
use crate::registry::DeviceIdentity;
use crate::types::MacAddress;

/// Port devices listen on.
pub const DEVICE_PORT: u16 = 7000;

/// Largest datagram accepted.
const MAX_DATAGRAM: usize = 4096;

/// Result code of an accepted command.
const COMMAND_OK: u16 = 200;

/// Discovers devices with a broadcast `scan` probe.
#[derive(Debug, Clone)]
pub struct UdpDiscovery {
    target: SocketAddr,
}

impl UdpDiscovery {
    /// Creates a discovery probe sent to `target`, usually a broadcast address.
    #[must_use]
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    /// Creates a discovery probe sent to the limited broadcast address on
    /// [`DEVICE_PORT`].
    #[must_use]
    pub fn broadcast() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::BROADCAST, DEVICE_PORT)))
    }
}

#[async_trait]
impl Discovery for UdpDiscovery {
    async fn broadcast_probe(
        &self,
        timeout: Duration,
    ) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(DiscoveryError::Socket)?;
        socket.set_broadcast(true).map_err(DiscoveryError::Socket)?;

        let probe = json!({ "t": "scan" }).to_string();
        socket
            .send_to(probe.as_bytes(), self.target)
            .await
            .map_err(DiscoveryError::Send)?;
        tracing::debug!(target_addr = %self.target, "Sent discovery probe");

        let deadline = Instant::now() + timeout;
        let mut found: Vec<DeviceIdentity> = Vec::new();
        let mut buf = [0u8; MAX_DATAGRAM];

        loop {
            let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
            let (len, from) = match received {
                Err(_) => break,
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => return Err(DiscoveryError::Receive(e)),
            };

            match parse_scan_reply(&buf[..len], from) {
                Some(identity) if !found.iter().any(|d| d.mac == identity.mac) => {
                    tracing::debug!(mac = %identity.mac, address = %from, "Discovery reply");
                    found.push(identity);
                }
                Some(_) => {}
                None => tracing::debug!(address = %from, "Ignoring unrecognized discovery reply"),
            }
        }

        Ok(found)
    }
}

/// Builds [`UdpDeviceHandle`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

impl DeviceConnector for UdpConnector {
    fn connect(&self, identity: &DeviceIdentity) -> Arc<dyn DeviceHandle> {
        Arc::new(UdpDeviceHandle::new(identity.mac.clone(), identity.address))
    }
}

/// Request/response transport to one device.
#[derive(Debug, Clone)]
pub struct UdpDeviceHandle {
    mac: MacAddress,
    address: SocketAddr,
}

impl UdpDeviceHandle {
    /// Creates a handle for the device `mac` reachable at `address`.
    #[must_use]
    pub fn new(mac: MacAddress, address: SocketAddr) -> Self {
        Self { mac, address }
    }

    /// Sends one request and waits for the reply datagram.
    async fn exchange(&self, request: &Value) -> Result<Vec<u8>, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(self.address).await?;
        socket.send(request.to_string().as_bytes()).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let len = socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }
}

#[async_trait]
impl DeviceHandle for UdpDeviceHandle {
    async fn read_state(&self) -> Result<Reading, TransportError> {
        let request = json!({ "t": "status", "mac": self.mac });
        let reply = self.exchange(&request).await?;
        parse_status_reply(&reply, &self.mac)
    }

    async fn write_params(&self, params: &ParamMap) -> Result<(), TransportError> {
        let opt: Map<String, Value> = params
            .iter()
            .map(|(param, value)| (param.as_str().to_string(), value.to_json()))
            .collect();
        let request = json!({ "t": "cmd", "mac": self.mac, "opt": opt });
        let reply = self.exchange(&request).await?;
        parse_command_reply(&reply, &self.mac)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    t: String,
    mac: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    params: Option<Vec<String>>,
    #[serde(default)]
    dat: Option<Map<String, Value>>,
    #[serde(default)]
    r: Option<u16>,
}

fn parse_envelope(bytes: &[u8], expected: &str) -> Result<(Envelope, MacAddress), TransportError> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| TransportError::InvalidData(format!("malformed reply: {e}")))?;
    if envelope.t != expected {
        return Err(TransportError::InvalidData(format!(
            "expected '{expected}' reply, got '{}'",
            envelope.t
        )));
    }
    let mac = envelope
        .mac
        .parse()
        .map_err(|e: crate::error::ValueError| TransportError::InvalidData(e.to_string()))?;
    Ok((envelope, mac))
}

fn ensure_sender(actual: &MacAddress, expected: &MacAddress) -> Result<(), TransportError> {
    if actual == expected {
        Ok(())
    } else {
        Err(TransportError::InvalidData(format!(
            "reply from {actual}, expected {expected}"
        )))
    }
}

/// Parses a `dev` reply into an identity addressed at the sender.
fn parse_scan_reply(bytes: &[u8], from: SocketAddr) -> Option<DeviceIdentity> {
    let (envelope, mac) = parse_envelope(bytes, "dev").ok()?;
    let capabilities = envelope
        .params
        .as_deref()
        .and_then(|names| Capabilities::from_names(names.iter().map(String::as_str)))
        .unwrap_or_default();

    Some(DeviceIdentity {
        name: envelope.name.unwrap_or_else(|| mac.to_string()),
        mac,
        address: from,
        model: envelope.model,
        capabilities,
    })
}

fn parse_status_reply(bytes: &[u8], mac: &MacAddress) -> Result<Reading, TransportError> {
    let (envelope, sender) = parse_envelope(bytes, "dat")?;
    ensure_sender(&sender, mac)?;
    envelope
        .dat
        .ok_or_else(|| TransportError::InvalidData("status reply without 'dat'".into()))
}

fn parse_command_reply(bytes: &[u8], mac: &MacAddress) -> Result<(), TransportError> {
    let (envelope, sender) = parse_envelope(bytes, "res")?;
    ensure_sender(&sender, mac)?;
    match envelope.r {
        Some(COMMAND_OK) => Ok(()),
        Some(code) => Err(TransportError::Rejected(format!("result code {code}"))),
        None => Err(TransportError::InvalidData(
            "command reply without result code".into(),
        )),
    }
}
