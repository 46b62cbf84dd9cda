//! Observer interface the core reports into

use resumer_types::{FailureKind, TransferEvent, TransferOutcome};
use std::path::Path;
use tokio::sync::broadcast;

/// Receives progress and terminal notifications.
///
/// Callbacks run on the engine's worker task, so implementations must be
/// cheap and must not block. Exactly one terminal callback is made per
/// attempt, after the last `on_progress` of that attempt.
pub trait TransferObserver: Send + Sync {
    /// An attempt was launched; the host should show a busy state
    fn on_started(&self, _url: &str, _destination: &Path) {}

    /// Percent in `[0, 100]`, strictly increasing within one attempt
    fn on_progress(&self, percent: u8);

    fn on_success(&self);

    fn on_failed(&self, kind: FailureKind);

    fn on_paused(&self);

    fn on_canceled(&self);

    /// Dispatch a terminal outcome to the matching callback
    fn on_outcome(&self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Succeeded => self.on_success(),
            TransferOutcome::Failed(kind) => self.on_failed(kind),
            TransferOutcome::Paused => self.on_paused(),
            TransferOutcome::Canceled => self.on_canceled(),
        }
    }
}

/// Observer that republishes every callback as a `TransferEvent`
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    event_tx: broadcast::Sender<TransferEvent>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    /// Subscribe to transfer events
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: TransferEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

impl Default for ChannelObserver {
    fn default() -> Self {
        Self::new(256)
    }
}

impl TransferObserver for ChannelObserver {
    fn on_started(&self, url: &str, destination: &Path) {
        self.emit(TransferEvent::Started {
            url: url.to_string(),
            destination: destination.to_path_buf(),
        });
    }

    fn on_progress(&self, percent: u8) {
        self.emit(TransferEvent::Progress { percent });
    }

    fn on_success(&self) {
        self.emit(TransferEvent::Succeeded);
    }

    fn on_failed(&self, kind: FailureKind) {
        self.emit(TransferEvent::Failed { kind });
    }

    fn on_paused(&self) {
        self.emit(TransferEvent::Paused);
    }

    fn on_canceled(&self) {
        self.emit(TransferEvent::Canceled);
    }
}
