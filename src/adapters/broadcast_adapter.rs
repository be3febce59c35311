//! In-process event fan-out over a tokio broadcast channel.
//!
//! Each event is serialized once to JSON and handed to every live receiver.
//! Slow receivers lag and lose the oldest messages; the engine never waits.
//!
//! The CLI writes events to JSON lines only. This adapter is for programs
//! that embed the engine and want live subscribers: register it on the
//! [`EventBus`](crate::domain::events::EventBus) passed to
//! [`replay_stream`](crate::cli::replay_stream) or to a
//! [`BarOrchestrator`](crate::domain::orchestrator::BarOrchestrator).

use crate::domain::error::PaperError;
use crate::domain::events::CoreEvent;
use crate::ports::event_port::EventPort;
use tokio::sync::broadcast;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct BroadcastEventAdapter {
    tx: broadcast::Sender<String>,
}

impl BroadcastEventAdapter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastEventAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventPort for BroadcastEventAdapter {
    fn name(&self) -> &str {
        "broadcast"
    }

    /// Having no subscribers is not an error.
    fn publish(&self, event: &CoreEvent) -> Result<(), PaperError> {
        let message = event.to_json().map_err(|e| PaperError::EventSink {
            sink: "broadcast".into(),
            reason: e.to_string(),
        })?;
        let _ = self.tx.send(message);
        Ok(())
    }
}
