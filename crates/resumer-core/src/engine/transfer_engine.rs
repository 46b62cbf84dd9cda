//! Transfer engine - runs one download attempt
//!
//! An engine is created per attempt and consumed by `run`. It probes the
//! remote length, resumes from whatever the destination file already holds,
//! streams the remaining bytes in fixed-size chunks and checks the cancel and
//! pause flags between every chunk read and the following write.

use crate::engine::{RateLimiter, TransferSignals};
use crate::error::TransferError;
use crate::observer::TransferObserver;
use crate::transport::Transport;
use resumer_types::{Settings, TransferOutcome, TransferRequest};
use std::future::Future;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, error, info, warn};

/// Byte accounting for one attempt
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    /// Bytes already on disk when the attempt started
    pub resume_offset: u64,
    /// Remote length, 0 until probed
    pub total_length: u64,
    /// Bytes written during this attempt, excluding `resume_offset`
    pub bytes_written: u64,
    /// Last percent handed to the observer
    pub last_reported_percent: u8,
}

impl TransferState {
    /// Bytes the destination file holds right now
    pub fn on_disk(&self) -> u64 {
        self.resume_offset + self.bytes_written
    }

    /// Truncating integer percent of the total, 0 while the total is unknown
    pub fn percent(&self) -> u8 {
        if self.total_length == 0 {
            return 0;
        }
        let percent = self.on_disk() as u128 * 100 / self.total_length as u128;
        percent.min(100) as u8
    }
}

/// A single download attempt
pub struct TransferEngine {
    request: TransferRequest,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn TransferObserver>,
    signals: TransferSignals,
    rate_limiter: RateLimiter,
    chunk_size: usize,
    /// None disables the timeout
    io_timeout: Option<Duration>,
    state: TransferState,
}

impl TransferEngine {
    /// Create an engine for `request`
    pub fn new(
        request: TransferRequest,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn TransferObserver>,
        signals: TransferSignals,
        settings: &Settings,
    ) -> Self {
        let io_timeout = match settings.io_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            request,
            transport,
            observer,
            signals,
            rate_limiter: RateLimiter::new(settings.speed_limit),
            chunk_size: settings.effective_chunk_size(),
            io_timeout,
            state: TransferState::default(),
        }
    }

    /// Flags that pause or cancel this attempt
    pub fn signals(&self) -> TransferSignals {
        self.signals.clone()
    }

    pub fn request(&self) -> &TransferRequest {
        &self.request
    }

    /// Run the attempt to its terminal outcome.
    ///
    /// Never returns an error: every failure becomes `Failed`. Cleanup runs
    /// exactly once before returning.
    pub async fn run(mut self) -> TransferOutcome {
        info!(
            "Starting transfer of {} into {:?}",
            self.request.url, self.request.destination
        );

        let mut file = None;
        let outcome = match self.transfer(&mut file).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Transfer failed: {} - {}", self.request.filename(), e);
                TransferOutcome::Failed(e.kind())
            }
        };

        self.cleanup(file, outcome).await;

        info!(
            "Transfer of {} {} ({} of {} bytes on disk)",
            self.request.filename(),
            outcome,
            self.state.on_disk(),
            self.state.total_length
        );
        outcome
    }

    async fn transfer(
        &mut self,
        file_slot: &mut Option<File>,
    ) -> Result<TransferOutcome, TransferError> {
        let destination = self.request.destination.clone();

        if let Some(dir) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        self.state.resume_offset = existing_length(&destination).await?;

        let total = self
            .with_timeout(self.transport.probe(&self.request.url))
            .await?;
        if total == 0 {
            return Err(TransferError::ZeroLength);
        }
        self.state.total_length = total;
        debug!(
            "Probed {}: {} bytes remote, {} bytes local",
            self.request.url, total, self.state.resume_offset
        );

        if self.state.resume_offset == total {
            info!("{} already complete", self.request.filename());
            return Ok(TransferOutcome::Succeeded);
        }
        if self.state.resume_offset > total {
            return Err(TransferError::LocalFileTooLarge {
                local: self.state.resume_offset,
                remote: total,
            });
        }

        // Probe may have taken a while
        if let Some(outcome) = self.interruption() {
            return Ok(outcome);
        }

        let body = self
            .with_timeout(
                self.transport
                    .fetch_from(&self.request.url, self.state.resume_offset),
            )
            .await?;

        let mut restart = false;
        if body.start != self.state.resume_offset {
            if body.start != 0 {
                return Err(TransferError::UnsupportedRange {
                    requested: self.state.resume_offset,
                    status: format!("body starts at byte {}", body.start),
                });
            }
            warn!(
                "Server ignored range request at byte {}, restarting {} from zero",
                self.state.resume_offset,
                self.request.filename()
            );
            self.state.resume_offset = 0;
            restart = true;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&destination)
            .await?;
        if restart {
            file.set_len(0).await?;
        }
        file.seek(SeekFrom::Start(self.state.resume_offset)).await?;
        let file = file_slot.insert(file);

        let mut reader = StreamReader::new(body.stream);
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let read = reader.read(&mut buffer);
            let n = match self.io_timeout {
                Some(limit) => match tokio::time::timeout(limit, read).await {
                    Ok(result) => result,
                    Err(_) => return Err(TransferError::Timeout),
                },
                None => read.await,
            }
            .map_err(TransferError::Stream)?;

            if n == 0 {
                break;
            }

            if let Some(outcome) = self.interruption() {
                return Ok(outcome);
            }

            let after = self.state.on_disk() + n as u64;
            if after > total {
                return Err(TransferError::LengthMismatch {
                    expected: total,
                    actual: after,
                });
            }

            self.rate_limiter.acquire(n as u64).await;
            file.write_all(&buffer[..n]).await?;
            self.state.bytes_written += n as u64;
            self.report_progress();
        }

        if self.state.on_disk() < total {
            warn!(
                "Stream for {} ended early at {} of {} bytes",
                self.request.filename(),
                self.state.on_disk(),
                total
            );
        }

        Ok(TransferOutcome::Succeeded)
    }

    /// Cancel wins over pause when both are set
    fn interruption(&self) -> Option<TransferOutcome> {
        if self.signals.is_cancelled() {
            info!("Transfer of {} cancelled", self.request.filename());
            Some(TransferOutcome::Canceled)
        } else if self.signals.is_paused() {
            info!("Transfer of {} paused", self.request.filename());
            Some(TransferOutcome::Paused)
        } else {
            None
        }
    }

    fn report_progress(&mut self) {
        let percent = self.state.percent();
        if percent > self.state.last_reported_percent {
            self.state.last_reported_percent = percent;
            self.observer.on_progress(percent);
        }
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, TransferError>>,
    ) -> Result<T, TransferError> {
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| TransferError::Timeout)?,
            None => call.await,
        }
    }

    /// Close the file and, for a cancelled attempt, delete it.
    /// Failures here are logged and never change the outcome.
    async fn cleanup(&self, file: Option<File>, outcome: TransferOutcome) {
        if let Some(mut file) = file {
            if let Err(e) = file.flush().await {
                warn!("Failed to flush {:?}: {}", self.request.destination, e);
            }
            if outcome != TransferOutcome::Canceled {
                if let Err(e) = file.sync_all().await {
                    warn!("Failed to sync {:?}: {}", self.request.destination, e);
                }
            }
        }

        if outcome == TransferOutcome::Canceled {
            match fs::remove_file(&self.request.destination).await {
                Ok(()) => info!("Removed partial file {:?}", self.request.destination),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Failed to remove partial file {:?}: {}",
                    self.request.destination, e
                ),
            }
        }
    }
}

/// Length of the file at `path`, 0 when it does not exist
async fn existing_length(path: &Path) -> Result<u64, TransferError> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Delete a partial download left by an earlier attempt.
///
/// Returns whether a file was removed.
pub fn discard_partial(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
