//! Agent fleet supervision.
//!
//! [`FleetSupervisor`] owns the table of running containers and turns
//! `agents:run` / `agents:stop` control messages into container runtime calls.
//! Start and stop are serialized against each other by one exclusive lock
//! held across the runtime calls, so the table never disagrees with what the
//! supervisor itself asked the runtime to do.

mod policy;
mod supervisor;
mod table;

pub use policy::*;
pub use supervisor::*;
pub use table::*;

use thiserror::Error;

use crate::runtime::{ContainerId, NetworkId, RuntimeError};

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("image '{image}' for {label} is not present locally and pulling is disabled")]
    ImageNotLocal { label: String, image: String },

    #[error("failed to ensure image '{image}' for {label}: {source}")]
    Image {
        label: String,
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to create network for '{container}': {source}")]
    Network {
        container: String,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to start container '{container}': {source}")]
    StartContainer {
        container: String,
        #[source]
        source: RuntimeError,
    },

    #[error(
        "failed to attach container '{container_id}' to network '{network_id}': {source}"
    )]
    AttachNetwork {
        container_id: ContainerId,
        network_id: NetworkId,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to stop container '{container_id}': {source}")]
    StopContainer {
        container_id: ContainerId,
        #[source]
        source: RuntimeError,
    },
}
