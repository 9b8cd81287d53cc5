// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Climate Hub - keeps a fleet of local-network climate devices in sync.
//!
//! Devices are found with a broadcast probe, polled concurrently, and
//! exposed through a REST and WebSocket interface. Every change observed on
//! a device is pushed to connected clients as a `report` event.
//!
//! # Architecture
//!
//! - [`registry`]: authoritative set of known devices, one lock per record
//! - [`discovery`]: broadcast scan merged into the registry
//! - [`poller`]: one task per device, diffing each reading against the cache
//! - [`state`]: device state and the [`diff`](state::diff) change detector
//! - [`dispatcher`]: client updates, confirmed by reading the device back
//! - [`hub`]: fan-out of events to WebSocket clients
//! - [`manager`]: ties the above together
//! - [`transport`]: seams to the device collaborators, plus a UDP rendition
//! - [`server`]: axum routes
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use climate_hub::manager::{ClimateManager, ManagerConfig};
//! use climate_hub::transport::udp::{UdpConnector, UdpDiscovery};
//!
//! #[tokio::main]
//! async fn main() -> climate_hub::Result<()> {
//!     let manager = ClimateManager::new(
//!         Arc::new(UdpDiscovery::broadcast()),
//!         Arc::new(UdpConnector),
//!         ManagerConfig::default(),
//!     );
//!     manager.start().await;
//!
//!     let mut events = manager.connect_client();
//!     while let Some(event) = events.recv().await {
//!         println!("{}", serde_json::to_string(&*event).unwrap());
//!     }
//!     Ok(())
//! }
//! ```

mod capabilities;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod manager;
pub mod poller;
pub mod registry;
pub mod server;
pub mod state;
pub mod transport;
pub mod types;

pub use capabilities::{Capabilities, CapabilitiesBuilder};
pub use config::Config;
pub use dispatcher::{CommandDispatcher, CommandOutcome};
pub use error::{DiscoveryError, Error, Result, TransportError, ValueError};
pub use hub::{ClientMessage, NotificationHub, ServerEvent};
pub use manager::{ClimateManager, ManagerConfig};
pub use poller::{BackoffPolicy, PollOutcome, Poller, PollerConfig};
pub use registry::{ConnectionState, DeviceIdentity, DeviceRecord, DeviceSummary, Registry};
pub use state::{ChangeSet, DeviceState, FieldChange, diff};
pub use types::{MacAddress, Param, ParamValue};
