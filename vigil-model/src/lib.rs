//! Core data model definitions shared across vigil crates.
//!
//! Everything in here crosses a process boundary at some point (bus payloads,
//! health output, container naming), so the types stay plain serde data with
//! no runtime behaviour beyond pure derivations.
#![allow(missing_docs)]

pub mod agent;
pub mod inspection;
pub mod payloads;
pub mod subjects;

pub use agent::{AgentDescriptor, AgentId};
pub use inspection::{InspectionInputs, InspectionResults};
pub use payloads::{AgentPayload, ScannerPayload};
