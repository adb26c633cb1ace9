use crate::connection::{BroadcastFilter, Connection, ConnectionId, OutboundFrame, Principal};
use crate::message::BroadcastMessage;
use events::Id;
use log::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

enum Command {
    Register(Connection),
    Unregister(ConnectionId),
    SetClassFilter {
        id: ConnectionId,
        class_id: Option<Id>,
    },
    Broadcast {
        filter: BroadcastFilter,
        frame: OutboundFrame,
    },
    DisconnectPrincipal {
        tenant_id: Id,
        principal: Principal,
        reply: oneshot::Sender<usize>,
    },
    Count {
        tenant_id: Option<Id>,
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Number of commands that may wait for the hub loop.
pub const COMMAND_BUFFER: usize = 1024;

/// Handle to the connection registry.
///
/// The registry itself lives inside a single task that processes commands in
/// arrival order; this handle only enqueues commands and is cheap to clone.
/// No method blocks on delivery to any connection. Broadcasts never wait for
/// room in the command queue: when the loop is saturated they are dropped.
/// Every other command waits for room.
#[derive(Clone)]
pub struct Hub {
    commands: Sender<Command>,
}

impl Hub {
    /// Starts the hub loop on the current runtime.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        Self::spawn_with_capacity(COMMAND_BUFFER)
    }

    pub fn spawn_with_capacity(capacity: usize) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(HubLoop::default().run(receiver));
        (Self { commands }, handle)
    }

    /// Adds a connection and returns its id once the command is queued.
    pub async fn register(&self, connection: Connection) -> ConnectionId {
        let id = connection.id;
        self.submit(Command::Register(connection)).await;
        id
    }

    /// Removes a connection. Unknown or already removed ids are ignored.
    pub async fn unregister(&self, id: ConnectionId) {
        self.submit(Command::Unregister(id)).await;
    }

    /// Changes the class a dashboard connection follows (`None` follows the
    /// whole school).
    pub async fn set_class_filter(&self, id: ConnectionId, class_id: Option<Id>) {
        self.submit(Command::SetClassFilter { id, class_id }).await;
    }

    /// Delivers `message` to every registered connection matching `filter`.
    /// Returns `false` when the message was not queued.
    pub fn broadcast(&self, filter: BroadcastFilter, message: &BroadcastMessage) -> bool {
        let frame = match serde_json::to_string(message) {
            Ok(json) => OutboundFrame::from(json),
            Err(e) => {
                error!("Failed to serialize broadcast message: {e}");
                return false;
            }
        };

        match self.commands.try_send(Command::Broadcast { filter, frame }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Hub command queue is full; dropping {} broadcast for school {}",
                    filter.audience, filter.tenant_id
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Hub loop has stopped; broadcast dropped");
                false
            }
        }
    }

    /// Closes every connection of `tenant_id` admitted with `principal`.
    /// Returns how many were closed.
    pub async fn disconnect_principal(&self, tenant_id: Id, principal: Principal) -> usize {
        let (reply, response) = oneshot::channel();
        self.submit(Command::DisconnectPrincipal {
            tenant_id,
            principal,
            reply,
        })
        .await;
        response.await.unwrap_or(0)
    }

    /// Number of live connections, optionally restricted to one tenant.
    ///
    /// The answer is produced by the loop after all previously submitted
    /// commands, so awaiting it also waits for those to be applied.
    pub async fn connection_count(&self, tenant_id: Option<Id>) -> usize {
        let (reply, response) = oneshot::channel();
        self.submit(Command::Count { tenant_id, reply }).await;
        response.await.unwrap_or(0)
    }

    /// Closes every connection and stops the loop.
    pub async fn shutdown(&self) {
        self.submit(Command::Shutdown).await;
    }

    async fn submit(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            debug!("Hub loop has stopped; command dropped");
        }
    }
}

#[derive(Default)]
struct HubLoop {
    connections: HashMap<ConnectionId, Connection>,
}

impl HubLoop {
    async fn run(mut self, mut commands: Receiver<Command>) {
        info!("Hub loop started");

        while let Some(command) = commands.recv().await {
            match command {
                Command::Register(connection) => self.register(connection),
                Command::Unregister(id) => self.unregister(id),
                Command::SetClassFilter { id, class_id } => {
                    if let Some(connection) = self.connections.get_mut(&id) {
                        debug!("Connection {id} now follows class {class_id:?}");
                        connection.class_filter = class_id;
                    }
                }
                Command::Broadcast { filter, frame } => self.broadcast(&filter, frame),
                Command::DisconnectPrincipal {
                    tenant_id,
                    principal,
                    reply,
                } => {
                    let closed = self.disconnect_principal(tenant_id, principal);
                    let _ = reply.send(closed);
                }
                Command::Count { tenant_id, reply } => {
                    let count = match tenant_id {
                        Some(tenant_id) => self
                            .connections
                            .values()
                            .filter(|c| c.tenant_id == tenant_id)
                            .count(),
                        None => self.connections.len(),
                    };
                    let _ = reply.send(count);
                }
                Command::Shutdown => break,
            }
        }

        info!(
            "Hub loop stopping, closing {} connection(s)",
            self.connections.len()
        );
        // Dropping the senders closes every outbound buffer.
        self.connections.clear();
    }

    fn register(&mut self, connection: Connection) {
        info!(
            "Registered {} connection {} for school {}",
            connection.audience, connection.id, connection.tenant_id
        );
        self.connections.insert(connection.id, connection);
    }

    fn unregister(&mut self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            info!("Unregistered connection {id}");
        }
    }

    fn broadcast(&mut self, filter: &BroadcastFilter, frame: OutboundFrame) {
        let mut delivered = 0usize;
        let mut dropped = Vec::new();

        for connection in self.connections.values() {
            if !filter.matches(connection) {
                continue;
            }

            match connection.try_deliver(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Outbound buffer full for connection {}; evicting slow consumer",
                        connection.id
                    );
                    dropped.push(connection.id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} already closed", connection.id);
                    dropped.push(connection.id);
                }
            }
        }

        for id in dropped {
            self.connections.remove(&id);
        }

        debug!(
            "Broadcast to {} connection(s) of school {} ({})",
            delivered, filter.tenant_id, filter.audience
        );
    }

    fn disconnect_principal(&mut self, tenant_id: Id, principal: Principal) -> usize {
        let before = self.connections.len();
        self.connections
            .retain(|_, c| !(c.tenant_id == tenant_id && c.principal == principal));
        let closed = before - self.connections.len();

        if closed > 0 {
            info!("Disconnected {closed} connection(s) for {principal:?} of school {tenant_id}");
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Audience;
    use crate::message::Stats;
    use tokio::sync::mpsc::Receiver;

    fn stats_update(school_id: Id) -> BroadcastMessage {
        BroadcastMessage::StatsUpdate {
            school_id,
            stats: Stats::default(),
            leaderboard: None,
        }
    }

    async fn dashboard(
        hub: &Hub,
        tenant_id: Id,
        class_filter: Option<Id>,
        buffer: usize,
    ) -> (ConnectionId, Receiver<OutboundFrame>) {
        let (connection, rx) = Connection::new(
            tenant_id,
            class_filter,
            Audience::Dashboard,
            Principal::User(1),
            buffer,
        );
        (hub.register(connection).await, rx)
    }

    fn drain(rx: &mut Receiver<OutboundFrame>) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn broadcast_reaches_each_matching_connection_exactly_once() {
        let (hub, _loop) = Hub::spawn();
        let (_, mut school_wide) = dashboard(&hub, 1, None, 8).await;
        let (_, mut class_a) = dashboard(&hub, 1, Some(10), 8).await;
        let (_, mut class_b) = dashboard(&hub, 1, Some(11), 8).await;
        let (_, mut other_school) = dashboard(&hub, 2, None, 8).await;

        hub.broadcast(BroadcastFilter::dashboards(1, Some(10)), &stats_update(1));
        assert_eq!(hub.connection_count(None).await, 4);

        assert_eq!(drain(&mut school_wide).len(), 1);
        assert_eq!(drain(&mut class_a).len(), 1);
        assert!(drain(&mut class_b).is_empty());
        assert!(drain(&mut other_school).is_empty());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let (hub, _loop) = Hub::spawn();
        let (id, _rx) = dashboard(&hub, 1, None, 8).await;

        hub.unregister(id).await;
        hub.unregister(id).await;
        hub.unregister(ConnectionId::new()).await;

        assert_eq!(hub.connection_count(None).await, 0);
    }

    #[tokio::test]
    async fn full_buffer_evicts_only_the_slow_consumer() {
        let (hub, _loop) = Hub::spawn();
        let (_, mut stalled) = dashboard(&hub, 1, None, 4).await;
        let (_, mut fast_one) = dashboard(&hub, 1, None, 64).await;
        let (_, mut fast_two) = dashboard(&hub, 1, None, 64).await;

        for _ in 0..50 {
            hub.broadcast(BroadcastFilter::dashboards(1, None), &stats_update(1));
        }
        assert_eq!(hub.connection_count(Some(1)).await, 2);

        assert_eq!(drain(&mut fast_one).len(), 50);
        assert_eq!(drain(&mut fast_two).len(), 50);

        assert_eq!(drain(&mut stalled).len(), 4);
        assert!(stalled.recv().await.is_none(), "evicted buffer must be closed");
    }

    #[tokio::test]
    async fn closed_receiver_is_removed_on_next_broadcast() {
        let (hub, _loop) = Hub::spawn();
        let (_, rx) = dashboard(&hub, 1, None, 4).await;
        drop(rx);

        hub.broadcast(BroadcastFilter::dashboards(1, None), &stats_update(1));
        assert_eq!(hub.connection_count(None).await, 0);
    }

    #[tokio::test]
    async fn class_filter_can_be_changed_after_registration() {
        let (hub, _loop) = Hub::spawn();
        let (id, mut rx) = dashboard(&hub, 1, None, 8).await;

        hub.set_class_filter(id, Some(11)).await;
        hub.broadcast(BroadcastFilter::dashboards(1, Some(10)), &stats_update(1));
        hub.broadcast(BroadcastFilter::dashboards(1, Some(11)), &stats_update(1));
        hub.connection_count(None).await;

        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn disconnect_principal_closes_matching_displays() {
        let (hub, _loop) = Hub::spawn();
        let (revoked, mut revoked_rx) = Connection::new(
            1,
            None,
            Audience::PublicDisplay,
            Principal::DisplayToken(5),
            8,
        );
        let (kept, _kept_rx) = Connection::new(
            1,
            None,
            Audience::PublicDisplay,
            Principal::DisplayToken(6),
            8,
        );
        hub.register(revoked).await;
        hub.register(kept).await;

        let closed = hub
            .disconnect_principal(1, Principal::DisplayToken(5))
            .await;

        assert_eq!(closed, 1);
        assert_eq!(hub.connection_count(Some(1)).await, 1);
        assert!(revoked_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn shutdown_closes_all_connections() {
        let (hub, handle) = Hub::spawn();
        let (_, mut rx) = dashboard(&hub, 1, None, 8).await;

        hub.shutdown().await;
        handle.await.unwrap();

        assert!(rx.recv().await.is_none());
        assert_eq!(hub.connection_count(None).await, 0);
    }

    #[tokio::test]
    async fn saturated_hub_drops_broadcasts_but_keeps_control_commands() {
        let (hub, _loop) = Hub::spawn_with_capacity(2);
        let (_, mut rx) = dashboard(&hub, 1, None, 8).await;

        // The loop has not run yet: one slot holds the registration.
        assert!(hub.broadcast(BroadcastFilter::dashboards(1, None), &stats_update(1)));
        assert!(!hub.broadcast(BroadcastFilter::dashboards(1, None), &stats_update(1)));
        assert!(!hub.broadcast(BroadcastFilter::dashboards(1, None), &stats_update(1)));

        let (_, mut late) = dashboard(&hub, 1, None, 8).await;
        assert_eq!(hub.connection_count(None).await, 2);
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(drain(&mut late).is_empty());

        assert!(hub.broadcast(BroadcastFilter::dashboards(1, None), &stats_update(1)));
        hub.connection_count(None).await;
        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(drain(&mut late).len(), 1);
    }
}
