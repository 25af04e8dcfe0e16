use std::sync::Arc;

use tokio::sync::broadcast;

/// Bounded broadcast topic for pose snapshots.
///
/// Publishers never block; a slow subscriber misses old snapshots
/// (`RecvError::Lagged`) instead of holding up playback.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish `msg`, returning how many subscribers saw it.
    pub fn publish(&self, msg: T) -> usize {
        self.tx.send(Arc::new(msg)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}
