use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use vigil_model::AgentDescriptor;

use crate::runtime::LogRotation;

/// Environment variable telling an agent where the JSON-RPC proxy lives.
pub const ENV_JSON_RPC_HOST: &str = "JSON_RPC_HOST";
pub const ENV_JSON_RPC_PORT: &str = "JSON_RPC_PORT";
/// Port the agent must serve its gRPC API on.
pub const ENV_AGENT_GRPC_PORT: &str = "AGENT_GRPC_PORT";

pub const DEFAULT_JSON_RPC_PORT: u16 = 8545;

/// CFS period the engine applies when only a quota is given.
pub const CPU_PERIOD_MICROS: i64 = 100_000;

/// Static per-agent resource ceilings as configured by the operator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResources {
    /// Fractional CPUs, e.g. `0.5`. `None` leaves CPU unbounded.
    pub max_cpus: Option<f64>,
    pub max_memory_mib: Option<u64>,
}

impl Default for AgentResources {
    fn default() -> Self {
        Self {
            max_cpus: Some(0.5),
            max_memory_mib: Some(1024),
        }
    }
}

/// Limits handed to the runtime for one container start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    pub cpu_quota: Option<i64>,
    pub memory_bytes: Option<i64>,
}

impl ResourceLimits {
    /// Non-positive values are treated as "no limit".
    pub fn resolve(resources: &AgentResources) -> Self {
        let cpu_quota = resources
            .max_cpus
            .filter(|cpus| cpus.is_finite() && *cpus > 0.0)
            .map(|cpus| (cpus * CPU_PERIOD_MICROS as f64).round() as i64)
            .filter(|quota| *quota > 0);

        let memory_bytes = resources
            .max_memory_mib
            .filter(|mib| *mib > 0)
            .and_then(|mib| i64::try_from(mib).ok())
            .and_then(|mib| mib.checked_mul(1024 * 1024));

        Self {
            cpu_quota,
            memory_bytes,
        }
    }
}

/// Static policy applied by the supervisor to every agent start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FleetPolicy {
    pub resources: AgentResources,
    pub log: LogRotation,
    /// Pull missing agent images instead of failing the start.
    pub pull_images: bool,
    pub json_rpc_port: u16,
}

impl Default for FleetPolicy {
    fn default() -> Self {
        Self {
            resources: AgentResources::default(),
            log: LogRotation::default(),
            pull_images: true,
            json_rpc_port: DEFAULT_JSON_RPC_PORT,
        }
    }
}

impl FleetPolicy {
    /// Fixed environment for an agent container.
    pub fn agent_env(
        &self,
        agent: &AgentDescriptor,
        json_rpc_host: &str,
    ) -> BTreeMap<String, String> {
        BTreeMap::from([
            (ENV_JSON_RPC_HOST.to_string(), json_rpc_host.to_string()),
            (ENV_JSON_RPC_PORT.to_string(), self.json_rpc_port.to_string()),
            (ENV_AGENT_GRPC_PORT.to_string(), agent.grpc_port().to_string()),
        ])
    }
}

/// One always-running container shared by every agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Shared infrastructure started before any agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureSpec {
    /// Network the infrastructure containers start on.
    pub network_name: String,
    pub scanner: InfraContainerSpec,
    pub json_rpc_proxy: InfraContainerSpec,
}
