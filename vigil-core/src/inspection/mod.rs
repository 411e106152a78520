//! Periodic self-inspection of the node's data pipeline.
//!
//! Block progress published by the scanner drives the normal trigger path:
//! every `cadence` blocks a target slightly behind the tip is pushed into a
//! single-slot queue. A watchdog covers the case where those signals stop
//! arriving by asking the chain directly. One worker drains the slot and runs
//! the [`InspectionRoutine`] under a [`RetryPolicy`].

mod backoff;
mod chain;
mod routine;
mod scheduler;
mod settings;
mod slot;
mod watchdog;

pub use backoff::*;
pub use chain::*;
pub use routine::*;
pub use scheduler::*;
pub use settings::*;
pub use slot::*;
pub use watchdog::*;

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InspectionError {
    #[error("inspection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("inspection failed: {0}")]
    Routine(String),

    #[error("gave up after {attempts} attempts in {elapsed:?}: {last}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: String,
    },

    #[error("chain rpc request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chain rpc error: {0}")]
    Rpc(String),

    #[error("inspection scheduler already started")]
    AlreadyStarted,

    #[error("inspection cancelled")]
    Cancelled,
}

impl InspectionError {
    pub fn routine(message: impl Into<String>) -> Self {
        Self::Routine(message.into())
    }
}
