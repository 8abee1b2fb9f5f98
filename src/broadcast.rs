use crate::protocol::ServerMessage;
use crate::types::ConnId;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Buffered deliveries per game before slow sockets start lagging
const CHANNEL_CAPACITY: usize = 256;

/// A message addressed to an explicit set of connections
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: Vec<ConnId>,
    pub msg: ServerMessage,
}

impl Delivery {
    pub fn is_for(&self, conn: &str) -> bool {
        self.to.iter().any(|c| c == conn)
    }
}

/// Hands deliveries to whatever transport is attached. Fire and forget.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, delivery: Delivery);
}

/// Publishes into a per-game tokio broadcast channel. Each socket task
/// subscribes and keeps only what is addressed to it.
#[derive(Debug)]
pub struct ChannelDispatcher {
    tx: broadcast::Sender<Arc<Delivery>>,
}

impl Default for ChannelDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Delivery>> {
        self.tx.subscribe()
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, delivery: Delivery) {
        // Ignore send errors (no receivers connected is fine)
        let _ = self.tx.send(Arc::new(delivery));
    }
}
