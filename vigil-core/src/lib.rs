//! # Vigil Core
//!
//! Control-plane logic for a node that runs untrusted analysis agents in
//! containers and keeps an eye on the health of its own data pipeline.
//!
//! ## Overview
//!
//! - [`fleet`]: reconciles requested agents against running containers,
//!   keeping start/stop idempotent and wiring each agent's private network to
//!   the shared scanner and JSON-RPC proxy containers
//! - [`inspection`]: schedules periodic self-inspections from block progress,
//!   with a watchdog fallback and bounded retry
//! - [`bus`]: subject-keyed publish/subscribe seam plus an in-process bus
//! - [`runtime`]: container runtime seam plus a Docker CLI adapter
//! - [`health`]: named health reports for an external aggregator
//!
//! The fleet supervisor and the inspection scheduler share no state; they are
//! composed only through the bus.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod bus;
pub mod error;
pub mod fleet;
pub mod health;
pub mod inspection;
pub mod runtime;

pub use error::{CoreError, Result};
