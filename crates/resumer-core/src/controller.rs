//! Transfer controller - the host-facing lifecycle manager
//!
//! Keeps at most one engine running, routes pause/cancel to it, and
//! forwards the engine's terminal outcome to the observer.

use crate::engine::{discard_partial, TransferEngine, TransferSignals};
use crate::error::TransferError;
use crate::observer::TransferObserver;
use crate::transport::{HttpTransport, Transport};
use parking_lot::Mutex;
use resumer_types::{Settings, TransferOutcome, TransferRequest};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Handle to the running engine
struct ActiveTransfer {
    id: u64,
    request: TransferRequest,
    signals: TransferSignals,
}

struct ControllerInner {
    transport: Arc<dyn Transport>,
    observer: Arc<dyn TransferObserver>,
    settings: Settings,
    /// Runtime the engines are spawned on
    runtime: Handle,
    /// Single-flight guard, only flipped while `current` is locked
    active: AtomicBool,
    current: Mutex<Option<ActiveTransfer>>,
    /// Kept after the engine is gone so an idle cancel can find the file
    last_url: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl ControllerInner {
    /// Terminal hand-off from the engine task
    fn finish(&self, id: u64, outcome: TransferOutcome) {
        {
            let mut current = self.current.lock();
            if current.as_ref().map(|t| t.id) == Some(id) {
                *current = None;
            }
            self.active.store(false, Ordering::Release);
        }

        info!("Transfer {} finished: {}", id, outcome);
        // Lock released so the observer may start the next transfer
        self.observer.on_outcome(outcome);
    }
}

/// Lifecycle manager owning at most one active transfer
#[derive(Clone)]
pub struct TransferController {
    inner: Arc<ControllerInner>,
}

impl TransferController {
    /// Create a controller with an explicit transport.
    ///
    /// Engines run on `runtime`, so the commands may be called from any
    /// thread, including ones outside the runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        observer: Arc<dyn TransferObserver>,
        settings: Settings,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                transport,
                observer,
                settings,
                runtime,
                active: AtomicBool::new(false),
                current: Mutex::new(None),
                last_url: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Create a controller backed by the reqwest transport
    pub fn with_http(
        settings: Settings,
        observer: Arc<dyn TransferObserver>,
        runtime: Handle,
    ) -> Result<Self, TransferError> {
        let transport = Arc::new(HttpTransport::new(&settings)?);
        Ok(Self::new(transport, observer, settings, runtime))
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Start downloading `url` unless a transfer is already running.
    ///
    /// Returns whether a new engine was launched; a busy controller
    /// silently drops the call. `on_started` is delivered before the engine
    /// is spawned and without any lock held.
    pub fn start(&self, url: &str) -> bool {
        let inner = &self.inner;
        let mut current = inner.current.lock();

        if inner
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Transfer already running, ignoring start for {}", url);
            return false;
        }

        *inner.last_url.lock() = Some(url.to_string());

        let request = TransferRequest::new(url, &inner.settings.destination_dir);
        let signals = TransferSignals::new();
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let engine = TransferEngine::new(
            request.clone(),
            inner.transport.clone(),
            inner.observer.clone(),
            signals.clone(),
            &inner.settings,
        );

        *current = Some(ActiveTransfer {
            id,
            request: request.clone(),
            signals,
        });
        drop(current);

        info!("Starting transfer {}: {}", id, url);
        inner
            .observer
            .on_started(&request.url, &request.destination);

        let task_inner = Arc::clone(inner);
        inner.runtime.spawn(async move {
            let outcome = engine.run().await;
            task_inner.finish(id, outcome);
        });
        true
    }

    /// Ask the running transfer to stop at the next chunk boundary,
    /// keeping the partial file
    pub fn pause(&self) {
        match self.inner.current.lock().as_ref() {
            Some(active) => {
                active.signals.request_pause();
                info!("Signaled pause for transfer {}", active.id);
            }
            None => debug!("Pause ignored, no active transfer"),
        }
    }

    /// Cancel the running transfer, or delete the last URL's file when idle.
    ///
    /// The idle delete is a single synchronous unlink on the calling thread,
    /// done before `on_canceled` is reported.
    pub fn cancel(&self) {
        let inner = &self.inner;
        let current = inner.current.lock();

        if let Some(active) = current.as_ref() {
            active.signals.request_cancel();
            info!("Signaled cancel for transfer {}", active.id);
            return;
        }

        let Some(url) = inner.last_url.lock().clone() else {
            debug!("Cancel ignored, nothing to clean up");
            return;
        };

        let request = TransferRequest::new(url, &inner.settings.destination_dir);
        match discard_partial(&request.destination) {
            Ok(true) => info!("Removed {:?}", request.destination),
            Ok(false) => debug!("No file at {:?}", request.destination),
            Err(e) => warn!("Failed to remove {:?}: {}", request.destination, e),
        }
        drop(current);

        inner.observer.on_canceled();
    }

    /// Whether an engine is currently running
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// URL of the most recent `start`
    pub fn last_url(&self) -> Option<String> {
        self.inner.last_url.lock().clone()
    }

    /// Request of the running transfer, if any
    pub fn current_request(&self) -> Option<TransferRequest> {
        self.inner
            .current
            .lock()
            .as_ref()
            .map(|active| active.request.clone())
    }
}
