//! Transfer engine
//!
//! One engine runs one download attempt:
//! - Resume from the destination file's current length
//! - Ranged GET for the remaining bytes
//! - Cooperative pause/cancel checked at chunk boundaries
//! - Optional token bucket speed limit

mod rate_limiter;
mod signals;
mod transfer_engine;

pub use rate_limiter::*;
pub use signals::*;
pub use transfer_engine::*;
