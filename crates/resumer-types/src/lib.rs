//! Shared types for Resumer
//!
//! This crate contains the plain data structures used by the core
//! engine and the command-line host.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Request Types
// ============================================================================

/// File name used when the URL has no usable trailing segment
pub const FALLBACK_FILENAME: &str = "download";

/// A single download request, fixed for the lifetime of one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub url: String,
    pub destination: PathBuf,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>, destination_dir: &Path) -> Self {
        let url = url.into();
        let destination = destination_dir.join(filename_for(&url));
        Self { url, destination }
    }

    /// Name of the destination file (no directory)
    pub fn filename(&self) -> &str {
        self.destination
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(FALLBACK_FILENAME)
    }
}

/// Derive the destination file name from the text after the URL's last `/`
pub fn filename_for(url: &str) -> &str {
    let name = url.rsplit('/').next().unwrap_or_default();
    match name {
        "" | "." | ".." => FALLBACK_FILENAME,
        name => name,
    }
}

// ============================================================================
// Outcome Types
// ============================================================================

/// Terminal classification of one download attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "kind", rename_all = "lowercase")]
pub enum TransferOutcome {
    Succeeded,
    Failed(FailureKind),
    Paused,
    Canceled,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TransferOutcome::Failed(_))
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Succeeded => write!(f, "succeeded"),
            TransferOutcome::Failed(kind) => write!(f, "failed ({})", kind),
            TransferOutcome::Paused => write!(f, "paused"),
            TransferOutcome::Canceled => write!(f, "canceled"),
        }
    }
}

/// Coarse reason attached to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Metadata request failed or reported a zero length
    Probe,
    /// Network failure while streaming, or a body of unexpected length
    Transfer,
    /// Local file open/seek/write failure
    Io,
    /// Server answered the ranged request at an unexpected offset
    UnsupportedRange,
    /// A network call exceeded the configured I/O timeout
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Probe => "probe",
            FailureKind::Transfer => "transfer",
            FailureKind::Io => "io",
            FailureKind::UnsupportedRange => "unsupported range",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Events emitted by the core to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TransferEvent {
    Started {
        url: String,
        destination: PathBuf,
    },
    Progress {
        percent: u8,
    },
    Succeeded,
    Failed {
        kind: FailureKind,
    },
    Paused,
    Canceled,
}

impl TransferEvent {
    /// Whether this event ends an attempt
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TransferEvent::Started { .. } | TransferEvent::Progress { .. }
        )
    }
}

impl From<TransferOutcome> for TransferEvent {
    fn from(outcome: TransferOutcome) -> Self {
        match outcome {
            TransferOutcome::Succeeded => TransferEvent::Succeeded,
            TransferOutcome::Failed(kind) => TransferEvent::Failed { kind },
            TransferOutcome::Paused => TransferEvent::Paused,
            TransferOutcome::Canceled => TransferEvent::Canceled,
        }
    }
}

// ============================================================================
// Settings Types
// ============================================================================

pub const MIN_CHUNK_SIZE: usize = 1024;
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory every download lands in
    pub destination_dir: PathBuf,
    /// Bytes read from the response per loop iteration
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Applies to the probe, the ranged request and each chunk read
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
    /// Bytes per second, None = unlimited
    #[serde(default)]
    pub speed_limit: Option<u64>,
}

impl Settings {
    /// Chunk size clamped into the supported range
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }
}

fn default_chunk_size() -> usize {
    8 * 1024
}

fn default_user_agent() -> String {
    format!("Resumer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_io_timeout() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            destination_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            chunk_size: default_chunk_size(),
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            io_timeout_secs: default_io_timeout(),
            speed_limit: None,
        }
    }
}
