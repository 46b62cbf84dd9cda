//! Resumer Core - resumable single-file download engine
//!
//! This crate provides the transfer engine (one download attempt with
//! resume, pause and cancel), the controller that keeps at most one engine
//! running, and the HTTP transport both rely on.

pub mod engine;

mod controller;
mod error;
mod observer;
mod storage;
mod transport;

#[cfg(test)]
mod testing;

pub use controller::*;
pub use engine::{discard_partial, TransferEngine, TransferSignals, TransferState};
pub use error::*;
pub use observer::*;
pub use storage::*;
pub use transport::*;

pub use resumer_types::{
    FailureKind, Settings, TransferEvent, TransferOutcome, TransferRequest,
};
