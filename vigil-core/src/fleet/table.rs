use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use vigil_model::AgentDescriptor;

use crate::runtime::{ContainerHandle, ContainerId, NetworkId};

/// Why a container is running.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ContainerRole {
    Agent { agent: AgentDescriptor },
    Scanner,
    JsonRpcProxy,
}

impl ContainerRole {
    pub fn is_agent(&self) -> bool {
        matches!(self, ContainerRole::Agent { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub handle: ContainerHandle,
    pub role: ContainerRole,
    /// Private network created for the container, agents only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<NetworkId>,
    pub started_at: DateTime<Utc>,
}

impl ContainerRecord {
    pub fn agent(
        handle: ContainerHandle,
        agent: AgentDescriptor,
        network_id: NetworkId,
    ) -> Self {
        Self {
            handle,
            role: ContainerRole::Agent { agent },
            network_id: Some(network_id),
            started_at: Utc::now(),
        }
    }

    pub fn infrastructure(handle: ContainerHandle, role: ContainerRole) -> Self {
        Self {
            handle,
            role,
            network_id: None,
            started_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn id(&self) -> &ContainerId {
        &self.handle.id
    }
}

/// Running containers keyed by container name.
///
/// Holds at most one record per name. Callers are expected to hold the
/// supervisor lock around every read-modify-write.
#[derive(Debug, Default)]
pub struct FleetTable {
    records: HashMap<String, ContainerRecord>,
}

impl FleetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ContainerRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Inserts unless a record with the same name exists; returns whether
    /// the record was added.
    pub fn insert(&mut self, record: ContainerRecord) -> bool {
        if self.records.contains_key(record.name()) {
            return false;
        }
        self.records.insert(record.name().to_string(), record);
        true
    }

    /// Drops every record whose container ID is in `ids`.
    pub fn remove_ids(
        &mut self,
        ids: &HashSet<ContainerId>,
    ) -> Vec<ContainerRecord> {
        let names: Vec<String> = self
            .records
            .iter()
            .filter(|(_, record)| ids.contains(record.id()))
            .map(|(name, _)| name.clone())
            .collect();

        names
            .into_iter()
            .filter_map(|name| self.records.remove(&name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records sorted by container name.
    pub fn snapshot(&self) -> Vec<ContainerRecord> {
        let mut out: Vec<ContainerRecord> =
            self.records.values().cloned().collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    /// Empties the table, agents ordered before infrastructure.
    pub fn drain(&mut self) -> Vec<ContainerRecord> {
        let mut out: Vec<ContainerRecord> =
            self.records.drain().map(|(_, record)| record).collect();
        out.sort_by(|a, b| {
            b.role
                .is_agent()
                .cmp(&a.role.is_agent())
                .then_with(|| a.name().cmp(b.name()))
        });
        out
    }
}
