// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use climate_hub::transport::udp::{UdpConnector, UdpDiscovery};
use climate_hub::{ClimateManager, Config, server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "climate-hub starting");

    let manager = Arc::new(ClimateManager::new(
        Arc::new(UdpDiscovery::new(config.broadcast_address)),
        Arc::new(UdpConnector),
        config.manager_config(),
    ));

    let listener = TcpListener::bind(config.listen_addr()).await?;
    let report = manager.start().await;
    tracing::info!(devices = report.discovered.len(), "Initial discovery finished");

    let shutdown = {
        let manager = Arc::clone(&manager);
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
            manager.shutdown().await;
        }
    };

    server::serve(listener, manager, shutdown).await?;
    tracing::info!("climate-hub stopped");
    Ok(())
}
