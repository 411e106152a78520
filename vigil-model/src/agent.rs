use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix shared by every agent container name.
pub const AGENT_CONTAINER_PREFIX: &str = "vigil-agent";

/// First gRPC port handed out to agents.
pub const AGENT_GRPC_PORT_BASE: u16 = 50051;

/// Number of ports agents are spread across, starting at the base port.
pub const AGENT_GRPC_PORT_SPAN: u16 = 1000;

const CONTAINER_NAME_HASH_LEN: usize = 12;

/// Opaque agent identity as assigned by the agent registry.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Description of one agent as carried by run/stop control messages.
///
/// Immutable once received. The container name and gRPC port are derived
/// from the ID alone, so two descriptors with the same ID always map to the
/// same container regardless of which message they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub image: String,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<AgentId>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
        }
    }

    /// Docker-safe container name, e.g. `vigil-agent-3f29a0c1b2d4`.
    pub fn container_name(&self) -> String {
        let digest = hex::encode(id_digest(&self.id));
        format!(
            "{AGENT_CONTAINER_PREFIX}-{}",
            &digest[..CONTAINER_NAME_HASH_LEN]
        )
    }

    /// Port the agent's gRPC server is told to listen on.
    pub fn grpc_port(&self) -> u16 {
        let digest = id_digest(&self.id);
        let spread = u16::from_be_bytes([digest[0], digest[1]]);
        AGENT_GRPC_PORT_BASE + spread % AGENT_GRPC_PORT_SPAN
    }
}

fn id_digest(id: &AgentId) -> [u8; 32] {
    Sha256::digest(id.as_str().as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_is_stable_for_an_id() {
        let a = AgentDescriptor::new("0xabc", "registry/agent:1");
        let b = AgentDescriptor::new("0xabc", "registry/agent:2");

        assert_eq!(a.container_name(), b.container_name());
        assert_eq!(a.grpc_port(), b.grpc_port());
        assert!(a.container_name().starts_with("vigil-agent-"));
        assert_eq!(
            a.container_name().len(),
            AGENT_CONTAINER_PREFIX.len() + 1 + CONTAINER_NAME_HASH_LEN
        );
    }

    #[test]
    fn different_ids_get_different_names() {
        let a = AgentDescriptor::new("0xabc", "img");
        let b = AgentDescriptor::new("0xabd", "img");
        assert_ne!(a.container_name(), b.container_name());
    }

    #[test]
    fn grpc_port_stays_inside_the_agent_range() {
        for i in 0..200 {
            let port = AgentDescriptor::new(format!("agent-{i}"), "img")
                .grpc_port();
            assert!(port >= AGENT_GRPC_PORT_BASE);
            assert!(port < AGENT_GRPC_PORT_BASE + AGENT_GRPC_PORT_SPAN);
        }
    }

    #[test]
    fn descriptor_serializes_id_as_plain_string() {
        let agent = AgentDescriptor::new("0xabc", "img");
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["id"], "0xabc");
        assert_eq!(json["image"], "img");
    }
}
