// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory device fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use serde_json::{Map, Value, json};

use climate_hub::error::{DiscoveryError, TransportError};
use climate_hub::transport::{DeviceConnector, DeviceHandle, Discovery, ParamMap, Reading};
use climate_hub::{Capabilities, DeviceIdentity, MacAddress, Param};

pub const MAC: &str = "aabbccddeeff";

/// A device whose state lives in memory.
#[derive(Debug, Default)]
pub struct FakeDevice {
    state: Mutex<Map<String, Value>>,
    /// Reads left to fail before answering again.
    failures_left: AtomicU32,
    /// Every write is acknowledged but ignored.
    ignore_writes: AtomicBool,
    /// Every write fails.
    fail_writes: AtomicBool,
    /// Reads never answer.
    hang: AtomicBool,
    /// Reads wait for `release_reads`.
    hold: AtomicBool,
    read_started: Notify,
    release: Notify,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FakeDevice {
    pub fn new(state: Value) -> Arc<Self> {
        let device = Self::default();
        if let Value::Object(map) = state {
            *device.state.lock() = map;
        }
        Arc::new(device)
    }

    /// A device reporting the default capability set.
    pub fn split_unit() -> Arc<Self> {
        Self::new(json!({
            "power": false,
            "mode": "cool",
            "target_temperature": 20,
            "current_temperature": 23.5,
            "fan_speed": "auto",
            "horizontal_swing": "default",
            "vertical_swing": "default",
            "light": true,
        }))
    }

    pub fn set(&self, key: &str, value: Value) {
        self.state.lock().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) {
        self.state.lock().remove(key);
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn ignore_writes(&self) {
        self.ignore_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    /// Makes the next reads block until [`release_reads`](Self::release_reads).
    pub fn hold_reads(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Lets a held read finish; later reads answer immediately.
    pub fn release_reads(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    /// Waits until a read is blocked on the hold.
    pub async fn wait_for_held_read(&self) {
        self.read_started.notified().await;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceHandle for FakeDevice {
    async fn read_state(&self) -> Result<Reading, TransportError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.hold.load(Ordering::SeqCst) {
            let released = self.release.notified();
            self.read_started.notify_one();
            released.await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Unreachable("connection refused".into()));
        }

        Ok(self.state.lock().clone())
    }

    async fn write_params(&self, params: &ParamMap) -> Result<(), TransportError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("connection refused".into()));
        }
        if !self.ignore_writes.load(Ordering::SeqCst) {
            let mut state = self.state.lock();
            for (param, value) in params {
                state.insert(param.as_str().to_string(), value.to_json());
            }
        }
        Ok(())
    }
}

/// Discovery answering with a fixed, replaceable set of devices.
#[derive(Debug, Default)]
pub struct FakeNetwork {
    devices: Mutex<HashMap<MacAddress, (DeviceIdentity, Arc<FakeDevice>)>>,
    fail: AtomicBool,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, identity: DeviceIdentity, device: Arc<FakeDevice>) {
        self.devices
            .lock()
            .insert(identity.mac.clone(), (identity, device));
    }

    pub fn fail_probes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Discovery for FakeNetwork {
    async fn broadcast_probe(
        &self,
        _timeout: Duration,
    ) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Socket(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "broadcast not permitted",
            )));
        }
        Ok(self
            .devices
            .lock()
            .values()
            .map(|(identity, _)| identity.clone())
            .collect())
    }
}

impl DeviceConnector for FakeNetwork {
    fn connect(&self, identity: &DeviceIdentity) -> Arc<dyn DeviceHandle> {
        match self.devices.lock().get(&identity.mac) {
            Some((_, device)) => Arc::clone(device) as Arc<dyn DeviceHandle>,
            None => FakeDevice::new(json!({})) as Arc<dyn DeviceHandle>,
        }
    }
}

pub fn mac(raw: &str) -> MacAddress {
    raw.parse().unwrap()
}

pub fn identity(raw_mac: &str, address: &str) -> DeviceIdentity {
    DeviceIdentity::new(mac(raw_mac), address.parse::<SocketAddr>().unwrap(), "Unit")
        .with_model("split")
}

/// Identity limited to power and target temperature.
pub fn small_identity(raw_mac: &str) -> DeviceIdentity {
    identity(raw_mac, "192.168.1.40:7000").with_capabilities(
        Capabilities::builder()
            .with(Param::Power)
            .with(Param::TargetTemperature)
            .build(),
    )
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}
