// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process configuration.
//!
//! Every option can be given as a flag or through a `CLIMATE_HUB_*`
//! environment variable; all have defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};
use std::time::Duration;

use clap::Parser;

use crate::manager::ManagerConfig;
use crate::poller::PollerConfig;

/// Command-line and environment configuration of the `climate-hub` binary.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "climate-hub")]
#[command(about = "REST and WebSocket bridge for local-network climate devices")]
#[command(version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "CLIMATE_HUB_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "CLIMATE_HUB_PORT", default_value_t = 8123)]
    pub port: u16,

    /// How long discovery collects replies, in seconds
    #[arg(short = 'd', long, env = "CLIMATE_HUB_DISCOVERY_TIMEOUT", default_value = "3")]
    pub discovery_timeout: NonZeroU64,

    /// Interval between two reads of a device, in seconds
    #[arg(short = 'i', long, env = "CLIMATE_HUB_POLLING_INTERVAL", default_value = "2")]
    pub polling_interval: NonZeroU64,

    /// Timeout of each device read or write, in milliseconds
    #[arg(long, env = "CLIMATE_HUB_IO_TIMEOUT", default_value = "2000")]
    pub io_timeout: NonZeroU64,

    /// Consecutive failed reads before a device is reported disconnected
    #[arg(long, env = "CLIMATE_HUB_FAILURE_THRESHOLD", default_value = "3")]
    pub failure_threshold: NonZeroU32,

    /// Destination of discovery probes
    #[arg(long, env = "CLIMATE_HUB_BROADCAST_ADDRESS", default_value = "255.255.255.255:7000")]
    pub broadcast_address: SocketAddr,

    /// Events buffered per WebSocket client before it is disconnected
    #[arg(long, env = "CLIMATE_HUB_CLIENT_QUEUE", default_value = "64")]
    pub client_queue: NonZeroUsize,

    /// Enable debug logging
    #[arg(short, long, env = "CLIMATE_HUB_VERBOSE")]
    pub verbose: bool,
}

impl Config {
    /// Returns the address the server binds to.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the default log filter, used when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "climate_hub=debug,tower_http=debug,info"
        } else {
            "info"
        }
    }

    /// Builds the engine settings.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        let poller = PollerConfig::new(Duration::from_secs(self.polling_interval.get()))
            .with_io_timeout(Duration::from_millis(self.io_timeout.get()))
            .with_failure_threshold(self.failure_threshold.get());

        ManagerConfig::new()
            .with_discovery_timeout(Duration::from_secs(self.discovery_timeout.get()))
            .with_poller(poller)
            .with_client_queue(self.client_queue.get())
    }
}
