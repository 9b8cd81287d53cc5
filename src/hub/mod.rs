// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan-out of events to connected clients.
//!
//! Every client owns a bounded queue. [`NotificationHub::broadcast`] never
//! waits on a client: when a queue is full the client is disconnected and
//! the broadcast carries on with the others.
//!
//! A new client receives the `list` snapshot as the first item in its queue.
//! The snapshot is queued under the same lock that serializes broadcasts, so
//! no `report` can overtake it.
//!
//! # Examples
//!
//! ```
//! use climate_hub::hub::{NotificationHub, ServerEvent};
//!
//! # async fn example() {
//! let hub = NotificationHub::new(16);
//! let mut client = hub.connect(Vec::new);
//!
//! hub.broadcast(ServerEvent::error("demo"));
//!
//! assert_eq!(client.recv().await.unwrap().kind(), "list");
//! assert_eq!(client.recv().await.unwrap().kind(), "error");
//! # }
//! ```

mod event;

pub use event::{ClientMessage, ServerEvent};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::registry::DeviceSummary;

/// Default per-client queue capacity.
pub const DEFAULT_CLIENT_QUEUE: usize = 64;

/// Identifier of a connected client.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.0.to_string()[..8];
        write!(f, "ClientId({short}...)")
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving side of one client's queue.
///
/// `recv` returns `None` once the hub disconnected the client.
#[derive(Debug)]
pub struct ClientSubscription {
    id: ClientId,
    receiver: mpsc::Receiver<Arc<ServerEvent>>,
}

impl ClientSubscription {
    /// Returns the client identifier.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Waits for the next event.
    pub async fn recv(&mut self) -> Option<Arc<ServerEvent>> {
        self.receiver.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<ServerEvent>> {
        self.receiver.try_recv().ok()
    }
}

/// Broadcasts events to every connected client.
#[derive(Debug)]
pub struct NotificationHub {
    clients: Mutex<HashMap<ClientId, mpsc::Sender<Arc<ServerEvent>>>>,
    capacity: usize,
}

impl NotificationHub {
    /// Creates a hub whose clients each buffer up to `capacity` events.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Registers a client and queues the `list` snapshot built by `snapshot`.
    pub fn connect(&self, snapshot: impl FnOnce() -> Vec<DeviceSummary>) -> ClientSubscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = ClientId::new();

        let mut clients = self.clients.lock();
        let list = ServerEvent::List { data: snapshot() };
        // Fresh queue with capacity >= 1: cannot be full.
        let _ = sender.try_send(Arc::new(list));
        clients.insert(id, sender);

        tracing::debug!(client = %id, clients = clients.len(), "Client connected");
        ClientSubscription { id, receiver }
    }

    /// Delivers `event` to every connected client.
    ///
    /// Clients whose queue is full or closed are disconnected.
    pub fn broadcast(&self, event: ServerEvent) {
        let event = Arc::new(event);
        let mut clients = self.clients.lock();

        clients.retain(|id, sender| match sender.try_send(Arc::clone(&event)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(client = %id, "Client queue full, disconnecting");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(client = %id, "Client gone");
                false
            }
        });
    }

    /// Delivers `event` to one client.
    ///
    /// Returns `false` if the client is unknown or was disconnected because
    /// its queue is full.
    pub fn send_to(&self, id: ClientId, event: ServerEvent) -> bool {
        let mut clients = self.clients.lock();
        let Some(sender) = clients.get(&id) else {
            return false;
        };

        if sender.try_send(Arc::new(event)).is_ok() {
            return true;
        }
        tracing::warn!(client = %id, "Client queue unavailable, disconnecting");
        clients.remove(&id);
        false
    }

    /// Removes a client. Its subscription drains and then ends.
    pub fn disconnect(&self, id: ClientId) {
        if self.clients.lock().remove(&id).is_some() {
            tracing::debug!(client = %id, "Client disconnected");
        }
    }

    /// Disconnects every client.
    pub fn close_all(&self) {
        let mut clients = self.clients.lock();
        if !clients.is_empty() {
            tracing::info!(clients = clients.len(), "Closing all client connections");
        }
        clients.clear();
    }

    /// Returns the number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_QUEUE)
    }
}
