use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, broadcast, mpsc};

use agora_types::events::{ChatEvent, RoomAddress};

/// A room-scoped publication flowing through the broadcast channel.
/// Connections filter on the room and render the topic at send time.
#[derive(Debug, Clone)]
pub struct Published {
    pub room: RoomAddress,
    pub event: ChatEvent,
}

/// Manages all connected clients and fans events out to room subscribers.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for room events — every connection receives every
    /// publication and drops the ones for rooms it is not subscribed to.
    broadcast_tx: broadcast::Sender<Published>,

    /// Per-user targeted channels for private events (send errors),
    /// guarded by a connection id so a stale connection cannot evict a
    /// newer one.
    user_channels: RwLock<HashMap<i64, (u64, mpsc::UnboundedSender<ChatEvent>)>>,

    next_conn_id: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
                next_conn_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to the publication stream. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish a room event to all current subscribers. Fire-and-forget and
    /// at-most-once: with no subscribers the event is simply dropped, and a
    /// failure here never affects the committed state it describes.
    pub fn publish(&self, room: RoomAddress, event: ChatEvent) {
        let _ = self.inner.broadcast_tx.send(Published { room, event });
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: i64,
    ) -> (u64, mpsc::UnboundedReceiver<ChatEvent>) {
        let conn_id = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister a per-user targeted channel, but only if conn_id matches —
    /// a newer connection may have taken the slot over.
    pub async fn unregister_user_channel(&self, user_id: i64, conn_id: u64) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(&user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(&user_id);
            }
        }
    }

    /// Send a private event to a specific user's current connection.
    pub async fn send_to_user(&self, user_id: i64, event: ChatEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some((_, tx)) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_types::api::ReadReceipt;

    #[tokio::test]
    async fn publications_reach_subscribers_and_vanish_without_any() {
        let dispatcher = Dispatcher::new();
        let room = RoomAddress::direct(3);

        // No subscribers: fire-and-forget, no error.
        dispatcher.publish(
            room,
            ChatEvent::MessageDeleted { message_id: 1 },
        );

        let mut rx = dispatcher.subscribe();
        dispatcher.publish(
            room,
            ChatEvent::Read(ReadReceipt {
                message_id: 2,
                user_id: 1,
                username: "ana".into(),
                read_count: 1,
            }),
        );

        let published = rx.recv().await.unwrap();
        assert_eq!(published.room, room);
        assert!(matches!(published.event, ChatEvent::Read(_)));
    }

    #[tokio::test]
    async fn stale_connections_cannot_evict_newer_user_channels() {
        let dispatcher = Dispatcher::new();

        let (old_conn, _old_rx) = dispatcher.register_user_channel(7).await;
        let (_new_conn, mut new_rx) = dispatcher.register_user_channel(7).await;

        // The old connection going away must not tear down the new channel.
        dispatcher.unregister_user_channel(7, old_conn).await;

        dispatcher
            .send_to_user(
                7,
                ChatEvent::Error {
                    code: "CHAT_403".into(),
                    message: "admin-only room".into(),
                },
            )
            .await;

        assert!(matches!(
            new_rx.recv().await,
            Some(ChatEvent::Error { .. })
        ));
    }
}
