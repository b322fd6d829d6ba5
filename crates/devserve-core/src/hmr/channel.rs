//! Broadcast set of live client connections.
//!
//! The channel owns one outbound queue per connection. The transport (the
//! WebSocket task in the server crate) drains its [`Connection`] and writes
//! frames in order; dropping the [`Connection`] removes it from the set.

use super::message::UpdateMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// How long [`UpdateChannel::close`] waits for each connection to finish.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection identifier, unique per channel.
pub type ConnectionId = u64;

/// A frame queued for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized [`UpdateMessage`].
    Text(Arc<str>),
    /// The server is shutting down: send a close frame and stop.
    Close,
}

struct Slot {
    tx: mpsc::UnboundedSender<Outbound>,
    done: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Inner {
    closed: bool,
    connections: HashMap<ConnectionId, Slot>,
}

/// Broadcast channel to all connected client runtimes.
///
/// Mutation of the connection set is serialized by a mutex; `send` never
/// blocks on a slow client.
pub struct UpdateChannel {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    close_timeout: Duration,
}

impl std::fmt::Debug for UpdateChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("UpdateChannel")
            .field("closed", &inner.closed)
            .field("connections", &inner.connections.len())
            .finish()
    }
}

impl Default for UpdateChannel {
    fn default() -> Self {
        Self::with_close_timeout(DEFAULT_CLOSE_TIMEOUT)
    }
}

impl UpdateChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_close_timeout(close_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1),
            close_timeout,
        }
    }

    /// Add a connection to the broadcast set.
    ///
    /// Returns `None` once the channel has been closed.
    pub fn register(self: &Arc<Self>) -> Option<Connection> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        inner.connections.insert(id, Slot { tx, done: done_rx });
        debug!(conn_id = id, total = inner.connections.len(), "client connected");

        Some(Connection {
            id,
            rx,
            _done: done_tx,
            channel: Arc::clone(self),
        })
    }

    /// Queue `message` for every open connection.
    ///
    /// Connections whose queue is gone are dropped from the set; this never
    /// fails. Returns the number of connections the message was queued for.
    pub fn send(&self, message: &UpdateMessage) -> usize {
        let json: Arc<str> = match message.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "failed to serialize update message");
                return 0;
            }
        };

        let mut inner = self.lock();
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, slot) in &inner.connections {
            if slot.tx.send(Outbound::Text(Arc::clone(&json))).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            inner.connections.remove(&id);
            debug!(conn_id = id, "dropped dead connection");
        }
        delivered
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Close every connection and refuse new ones.
    ///
    /// Waits until each connection's transport task has dropped its
    /// [`Connection`], bounded by the close timeout per connection.
    pub async fn close(&self) -> usize {
        let slots: Vec<(ConnectionId, Slot)> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.connections.drain().collect()
        };

        let count = slots.len();
        for (_, slot) in &slots {
            let _ = slot.tx.send(Outbound::Close);
        }
        for (id, slot) in slots {
            if tokio::time::timeout(self.close_timeout, slot.done)
                .await
                .is_err()
            {
                warn!(conn_id = id, "connection did not close in time");
            }
        }

        info!(count, "update channel closed");
        count
    }

    fn remove(&self, id: ConnectionId) {
        let mut inner = self.lock();
        if inner.connections.remove(&id).is_some() {
            debug!(conn_id = id, total = inner.connections.len(), "client disconnected");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// One registered client connection.
///
/// Dropping it removes the connection from the channel.
pub struct Connection {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<Outbound>,
    _done: oneshot::Sender<()>,
    channel: Arc<UpdateChannel>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Next frame to write, in send order. `None` once the channel dropped
    /// this connection.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.channel.remove(self.id);
    }
}
