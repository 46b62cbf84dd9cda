//! In-memory doubles shared by the engine and controller tests

use crate::error::TransferError;
use crate::observer::TransferObserver;
use crate::transport::{RangedBody, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use resumer_types::{FailureKind, TransferEvent};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

const CHUNK: usize = 1024;

/// Deterministic, non-repeating-per-KiB test payload
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

type ChunkHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Serves a byte vector in 1 KiB chunks and honors offsets
pub struct MockTransport {
    data: Vec<u8>,
    reported_length: Option<u64>,
    probe_fails: bool,
    ignore_range: bool,
    break_at: Option<usize>,
    hook: Option<ChunkHook>,
    gate: Option<Arc<Notify>>,
    probes: AtomicUsize,
    fetch_offsets: Mutex<Vec<u64>>,
}

impl MockTransport {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            reported_length: None,
            probe_fails: false,
            ignore_range: false,
            break_at: None,
            hook: None,
            gate: None,
            probes: AtomicUsize::new(0),
            fetch_offsets: Mutex::new(Vec::new()),
        }
    }

    /// Call `hook(index)` as chunk `index` is handed to the reader
    pub fn on_chunk(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Hold the first chunk until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn reporting_length(mut self, len: u64) -> Self {
        self.reported_length = Some(len);
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.probe_fails = true;
        self
    }

    pub fn ignoring_range(mut self) -> Self {
        self.ignore_range = true;
        self
    }

    /// Yield an error instead of chunk `index`
    pub fn breaking_at(mut self, index: usize) -> Self {
        self.break_at = Some(index);
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn fetch_offsets(&self) -> Vec<u64> {
        self.fetch_offsets.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn probe(&self, _url: &str) -> Result<u64, TransferError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.probe_fails {
            return Err(TransferError::Probe("connection refused".to_string()));
        }
        Ok(self.reported_length.unwrap_or(self.data.len() as u64))
    }

    async fn fetch_from(&self, _url: &str, offset: u64) -> Result<RangedBody, TransferError> {
        self.fetch_offsets.lock().push(offset);
        let start = if self.ignore_range { 0 } else { offset };

        let chunks: Vec<Bytes> = self.data[start as usize..]
            .chunks(CHUNK)
            .map(Bytes::copy_from_slice)
            .collect();
        let hook = self.hook.clone();
        let gate = self.gate.clone();
        let break_at = self.break_at;

        let stream = futures::stream::iter(chunks.into_iter().enumerate())
            .then(move |(index, chunk)| {
                let hook = hook.clone();
                let gate = gate.clone();
                async move {
                    if index == 0 {
                        if let Some(gate) = gate {
                            gate.notified().await;
                        }
                    }
                    if let Some(hook) = hook {
                        (hook.as_ref())(index);
                    }
                    if break_at == Some(index) {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            "connection reset",
                        ));
                    }
                    Ok(chunk)
                }
            })
            .boxed();

        Ok(RangedBody { start, stream })
    }
}

type StartHook = Box<dyn Fn() + Send + Sync>;

/// Records every callback as a `TransferEvent`
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TransferEvent>>,
    terminal: Notify,
    start_hook: Option<StartHook>,
}

impl RecordingObserver {
    /// Call `hook` from inside `on_started`, after recording the event
    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.start_hook = Some(Box::new(hook));
        self
    }

    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().clone()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_events(&self) -> Vec<TransferEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.is_terminal())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Wait for the next terminal callback
    pub async fn wait_terminal(&self) {
        self.terminal.notified().await;
    }

    fn push(&self, event: TransferEvent) {
        let terminal = event.is_terminal();
        self.events.lock().push(event);
        if terminal {
            self.terminal.notify_one();
        }
    }
}

impl TransferObserver for RecordingObserver {
    fn on_started(&self, url: &str, destination: &Path) {
        self.push(TransferEvent::Started {
            url: url.to_string(),
            destination: destination.to_path_buf(),
        });
        if let Some(hook) = &self.start_hook {
            hook();
        }
    }

    fn on_progress(&self, percent: u8) {
        self.push(TransferEvent::Progress { percent });
    }

    fn on_success(&self) {
        self.push(TransferEvent::Succeeded);
    }

    fn on_failed(&self, kind: FailureKind) {
        self.push(TransferEvent::Failed { kind });
    }

    fn on_paused(&self) {
        self.push(TransferEvent::Paused);
    }

    fn on_canceled(&self) {
        self.push(TransferEvent::Canceled);
    }
}
