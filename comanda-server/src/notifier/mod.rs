//! Change Notifier
//!
//! Publish/subscribe fan-out of committed ledger changes to every
//! connected device. An explicitly constructed, owned object held by
//! `ServerState` — never a module-level global — with a defined
//! init/teardown lifecycle via its `CancellationToken`.
//!
//! # Message flow
//!
//! ```text
//! ledger commit ──► publish() ──► broadcast::Sender<ChangeEvent>
//!                                        │
//!                      ┌─────────────────┼─────────────────┐
//!                      ▼                 ▼                 ▼
//!                  device A          device B          device C
//!                  (WebSocket subscriptions, one per connection)
//! ```
//!
//! Delivery is fire-and-forget and at-most-once per currently-connected
//! device: there is no persistence and no replay buffer. A device that is
//! offline at publish time misses the event and heals through its
//! bootstrap pull.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use shared::event::{ChangeEvent, ChangeEventKind};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Default capacity of the broadcast channel
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A currently-connected device, as seen by the registry
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedClient {
    pub id: String,
    pub addr: Option<SocketAddr>,
    pub connected_at: i64,
}

/// Per-event-kind monotonic version counters
///
/// Lock-free via DashMap; consumers use the version to notice they fell
/// behind on a given resource.
#[derive(Debug, Default)]
struct EventVersions {
    versions: DashMap<String, u64>,
}

impl EventVersions {
    fn increment(&self, kind: ChangeEventKind) -> u64 {
        let mut entry = self.versions.entry(kind.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }
}

/// Change notifier — connection registry plus broadcast channel
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
    versions: Arc<EventVersions>,
    clients: Arc<DashMap<String, ConnectedClient>>,
    shutdown_token: CancellationToken,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            versions: Arc::new(EventVersions::default()),
            clients: Arc::new(DashMap::new()),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Publish one committed change to all connected devices
    ///
    /// Invoked synchronously right after the ledger transaction commits.
    /// Fire-and-forget: zero subscribers is not an error.
    pub fn publish(
        &self,
        tenant_id: &str,
        kind: ChangeEventKind,
        entity_id: &str,
        data: Option<serde_json::Value>,
    ) {
        let version = self.versions.increment(kind);
        let event = ChangeEvent {
            tenant_id: tenant_id.to_string(),
            event: kind,
            entity_id: entity_id.to_string(),
            version,
            data,
        };
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(%kind, entity_id, version, receivers, "change published");
            }
            Err(_) => {
                tracing::debug!(%kind, entity_id, "change published with no subscribers");
            }
        }
    }

    /// Serialize-and-publish convenience used by the handlers
    pub fn publish_resource<T: Serialize>(
        &self,
        tenant_id: &str,
        kind: ChangeEventKind,
        entity_id: &str,
        data: Option<&T>,
    ) {
        let data = data.and_then(|d| serde_json::to_value(d).ok());
        self.publish(tenant_id, kind, entity_id, data);
    }

    /// Subscribe to the event stream (one receiver per device connection)
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Register a connected device
    pub fn register(&self, id: &str, addr: Option<SocketAddr>) {
        self.clients.insert(
            id.to_string(),
            ConnectedClient {
                id: id.to_string(),
                addr,
                connected_at: shared::util::now_millis(),
            },
        );
        tracing::info!(client_id = id, total = self.clients.len(), "device connected");
    }

    /// Deregister a device on disconnect
    pub fn deregister(&self, id: &str) {
        self.clients.remove(id);
        tracing::info!(client_id = id, total = self.clients.len(), "device disconnected");
    }

    pub fn connected_clients(&self) -> Vec<ConnectedClient> {
        self.clients.iter().map(|e| e.value().clone()).collect()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// Cancel all connection tasks
    pub fn shutdown(&self) {
        tracing::info!("Shutting down change notifier");
        self.shutdown_token.cancel();
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let notifier = ChangeNotifier::with_capacity(16);
        let mut rx_a = notifier.subscribe();
        let mut rx_b = notifier.subscribe();

        notifier.publish("demo", ChangeEventKind::OrderNew, "o1", None);

        let ev_a = rx_a.recv().await.unwrap();
        let ev_b = rx_b.recv().await.unwrap();
        assert_eq!(ev_a, ev_b);
        assert_eq!(ev_a.event, ChangeEventKind::OrderNew);
        assert_eq!(ev_a.entity_id, "o1");
        assert_eq!(ev_a.version, 1);
    }

    #[tokio::test]
    async fn versions_increment_per_kind() {
        let notifier = ChangeNotifier::with_capacity(16);
        let mut rx = notifier.subscribe();

        notifier.publish("demo", ChangeEventKind::OrderNew, "o1", None);
        notifier.publish("demo", ChangeEventKind::OrderNew, "o2", None);
        notifier.publish("demo", ChangeEventKind::MenuUpdated, "m1", None);

        assert_eq!(rx.recv().await.unwrap().version, 1);
        assert_eq!(rx.recv().await.unwrap().version, 2);
        // independent counter per event kind
        assert_eq!(rx.recv().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let notifier = ChangeNotifier::new();
        notifier.publish("demo", ChangeEventKind::DayClosed, "", None);
    }

    #[test]
    fn registry_tracks_connections() {
        let notifier = ChangeNotifier::new();
        notifier.register("c1", None);
        notifier.register("c2", None);
        assert_eq!(notifier.connected_clients().len(), 2);
        notifier.deregister("c1");
        assert_eq!(notifier.connected_clients().len(), 1);
    }
}
