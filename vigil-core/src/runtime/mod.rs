//! Container runtime seam.
//!
//! The node never talks to a container engine directly; it goes through
//! [`ContainerRuntime`]. [`DockerCliRuntime`] is the production adapter and
//! test suites substitute stubs.

mod command;
mod docker;

pub use command::*;
pub use docker::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unexpected runtime output: {0}")]
    InvalidOutput(String),

    #[error("{0}")]
    Other(String),
}

/// Identity the runtime assigned to a container.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub String);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub String);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A started container as reported back by the runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
}

/// Log rotation applied to every container the node starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRotation {
    /// Size at which the log file is rotated, in engine notation (`50m`).
    pub max_size: String,
    pub max_files: u32,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_size: "50m".to_string(),
            max_files: 10,
        }
    }
}

/// Everything the runtime needs to start one container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub network_id: NetworkId,
    pub linked_network_ids: Vec<NetworkId>,
    pub env: BTreeMap<String, String>,
    pub log: LogRotation,
    /// CFS quota in microseconds per 100ms period; `None` leaves it unbounded.
    pub cpu_quota: Option<i64>,
    pub memory_bytes: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkAttachment {
    Attached,
    AlreadyAttached,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn has_image(&self, image: &str) -> Result<bool, RuntimeError>;

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Creates (or resolves) a bridge network named `name`.
    async fn create_public_network(
        &self,
        name: &str,
    ) -> Result<NetworkId, RuntimeError>;

    async fn start_container(
        &self,
        spec: ContainerSpec,
    ) -> Result<ContainerHandle, RuntimeError>;

    async fn attach_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
    ) -> Result<NetworkAttachment, RuntimeError>;

    async fn stop_container(
        &self,
        container: &ContainerId,
    ) -> Result<(), RuntimeError>;
}
