use futures::{stream::BoxStream, StreamExt};
use guessme_types::events::SessionEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// In-process fan-out of session events backed by a broadcast channel.
///
/// Slow subscribers that lag behind silently skip the events they missed.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> BoxStream<'static, SessionEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(64)
    }
}
