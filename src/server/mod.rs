// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP surface: REST endpoints and the WebSocket stream.
//!
//! | route | handler |
//! |---|---|
//! | `GET /` | application name, version and known devices |
//! | `GET /devices` | every device summary |
//! | `GET /devices/:mac` | one device summary |
//! | `PATCH /devices/:mac` | apply an update request |
//! | `POST /discover` | rescan the network |
//! | `GET /ws` | event stream and `update` requests |

pub mod rest;
pub mod ws;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::manager::ClimateManager;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The synchronization engine.
    pub manager: Arc<ClimateManager>,
}

/// Builds the router.
pub fn router(manager: Arc<ClimateManager>) -> Router {
    Router::new()
        .route("/", get(rest::index))
        .route("/devices", get(rest::list_devices))
        .route(
            "/devices/:mac",
            get(rest::get_device).patch(rest::update_device),
        )
        .route("/discover", post(rest::discover))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { manager })
}

/// Serves the API on `listener` until `shutdown` completes.
///
/// # Errors
///
/// Returns an I/O error if the server fails.
pub async fn serve(
    listener: TcpListener,
    manager: Arc<ClimateManager>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP server listening");
    }

    axum::serve(listener, router(manager))
        .with_graceful_shutdown(shutdown)
        .await
}
