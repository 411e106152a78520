use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentDescriptor;

/// Batch of agents carried by run/stop requests and status broadcasts.
pub type AgentPayload = Vec<AgentDescriptor>;

/// Block progress notification published by the scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerPayload {
    /// Latest block the scanner has received from the chain.
    pub latest_block_input: u64,
    /// Latest block the scanner has finished handing to agents.
    #[serde(default)]
    pub latest_block_output: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl ScannerPayload {
    pub fn at_block(latest_block_input: u64) -> Self {
        Self {
            latest_block_input,
            ..Self::default()
        }
    }
}
