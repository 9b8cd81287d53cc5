// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket endpoint.
//!
//! Each connection gets a hub subscription. Events from the subscription are
//! written to the socket in order; `update` messages read from the socket are
//! handed to the dispatcher on their own task so a slow device never stalls
//! the outbound stream. Those tasks belong to the session and are joined
//! before it closes.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::task::{JoinError, JoinSet};

use super::AppState;
use crate::dispatcher::CommandOutcome;
use crate::hub::{ClientId, ClientMessage, ServerEvent};
use crate::manager::ClimateManager;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.manager))
}

async fn handle_socket(socket: WebSocket, manager: Arc<ClimateManager>) {
    let mut subscription = manager.connect_client();
    let client = subscription.id();
    let mut commands = Commands::new(Arc::clone(&manager), client);
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(%client, "WebSocket client connected");

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => commands.submit(text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(%client, error = %e, "WebSocket receive failed");
                    break;
                }
            },
            Some(joined) = commands.tasks.join_next(), if !commands.tasks.is_empty() => {
                commands.log_join(joined);
            }
        }
    }

    commands.finish().await;
    manager.hub().disconnect(client);
    tracing::info!(%client, "WebSocket client disconnected");
}

/// Commands submitted by one client.
///
/// Each runs on its own task; the session joins them before it ends.
struct Commands {
    manager: Arc<ClimateManager>,
    client: ClientId,
    tasks: JoinSet<()>,
}

impl Commands {
    fn new(manager: Arc<ClimateManager>, client: ClientId) -> Self {
        Self {
            manager,
            client,
            tasks: JoinSet::new(),
        }
    }

    fn submit(&mut self, text: String) {
        self.tasks
            .spawn(handle_message(Arc::clone(&self.manager), self.client, text));
    }

    fn log_join(&self, joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            tracing::error!(client = %self.client, error = %e, "Command task failed");
        }
    }

    /// Waits for every pending command. Each is bounded by the I/O timeouts.
    async fn finish(mut self) {
        if !self.tasks.is_empty() {
            tracing::debug!(client = %self.client, pending = self.tasks.len(), "Waiting for commands");
        }
        while let Some(joined) = self.tasks.join_next().await {
            self.log_join(joined);
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, kind = event.kind(), "Failed to serialize event");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}

/// Runs one client message and answers the requester.
///
/// `report` events are broadcast by the dispatcher itself; only
/// `not_changed` and `error` are addressed to the requester.
async fn handle_message(manager: Arc<ClimateManager>, client: ClientId, text: String) {
    let reply = match serde_json::from_str::<ClientMessage>(&text) {
        Err(e) => Some(ServerEvent::error(format!("malformed request: {e}"))),
        Ok(ClientMessage::Update { mac, data }) => match manager.apply(&mac, &data).await {
            Ok(CommandOutcome::Changed(_)) => None,
            Ok(CommandOutcome::NotChanged) => mac.parse().ok().map(ServerEvent::not_changed),
            Err(e) => Some(ServerEvent::error(e.to_string())),
        },
    };

    if let Some(reply) = reply {
        manager.hub().send_to(client, reply);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::DiscoveryError;
    use crate::manager::ManagerConfig;
    use crate::registry::DeviceIdentity;
    use crate::transport::Discovery;
    use crate::transport::udp::UdpConnector;

    struct EmptyNetwork;

    #[async_trait]
    impl Discovery for EmptyNetwork {
        async fn broadcast_probe(
            &self,
            _timeout: Duration,
        ) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
            Ok(Vec::new())
        }
    }

    fn manager() -> Arc<ClimateManager> {
        Arc::new(ClimateManager::new(
            Arc::new(EmptyNetwork),
            Arc::new(UdpConnector),
            ManagerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn malformed_message_answers_requester_only() {
        let manager = manager();
        let mut requester = manager.connect_client();
        let mut other = manager.connect_client();
        requester.recv().await.unwrap();
        other.recv().await.unwrap();

        handle_message(Arc::clone(&manager), requester.id(), "{not json".into()).await;

        let reply = requester.recv().await.unwrap();
        assert_eq!(reply.kind(), "error");
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn finished_session_has_answered_every_command() {
        let manager = manager();
        let mut client = manager.connect_client();
        client.recv().await.unwrap();

        let mut commands = Commands::new(Arc::clone(&manager), client.id());
        commands.submit("{not json".into());
        commands.submit(r#"{"type":"update","mac":"001122334455","data":{}}"#.into());
        commands.finish().await;

        assert_eq!(client.try_recv().unwrap().kind(), "error");
        assert_eq!(client.try_recv().unwrap().kind(), "error");
        assert!(client.try_recv().is_none());
    }

    #[tokio::test]
    async fn update_for_unknown_device_is_an_error_event() {
        let manager = manager();
        let mut client = manager.connect_client();
        client.recv().await.unwrap();

        let text = r#"{"type":"update","mac":"unknownmac","data":{"power":true}}"#;
        handle_message(Arc::clone(&manager), client.id(), text.into()).await;

        assert_eq!(
            *client.recv().await.unwrap(),
            ServerEvent::error("device unknownmac not found")
        );
        assert!(manager.devices().is_empty());
    }
}
