use serde::Serialize;

/// Per-chain defaults for self-inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainSettings {
    pub chain_id: u64,
    pub name: &'static str,
    /// Blocks between two inspections.
    pub inspection_interval: u64,
    /// Whether the chain's RPC providers are expected to support tracing.
    pub enable_trace: bool,
}

pub const DEFAULT_CHAIN_SETTINGS: ChainSettings = ChainSettings {
    chain_id: 0,
    name: "default",
    inspection_interval: 250,
    enable_trace: false,
};

const CHAIN_SETTINGS: &[ChainSettings] = &[
    ChainSettings {
        chain_id: 1,
        name: "ethereum",
        inspection_interval: 50,
        enable_trace: true,
    },
    ChainSettings {
        chain_id: 10,
        name: "optimism",
        inspection_interval: 1000,
        enable_trace: false,
    },
    ChainSettings {
        chain_id: 56,
        name: "bsc",
        inspection_interval: 250,
        enable_trace: false,
    },
    ChainSettings {
        chain_id: 137,
        name: "polygon",
        inspection_interval: 250,
        enable_trace: false,
    },
    ChainSettings {
        chain_id: 250,
        name: "fantom",
        inspection_interval: 500,
        enable_trace: false,
    },
    ChainSettings {
        chain_id: 42161,
        name: "arbitrum",
        inspection_interval: 1000,
        enable_trace: false,
    },
    ChainSettings {
        chain_id: 43114,
        name: "avalanche",
        inspection_interval: 250,
        enable_trace: false,
    },
];

/// Settings for `chain_id`, falling back to [`DEFAULT_CHAIN_SETTINGS`].
pub fn chain_settings(chain_id: u64) -> ChainSettings {
    known_chain(chain_id).unwrap_or(ChainSettings {
        chain_id,
        ..DEFAULT_CHAIN_SETTINGS
    })
}

pub fn known_chain(chain_id: u64) -> Option<ChainSettings> {
    CHAIN_SETTINGS
        .iter()
        .find(|settings| settings.chain_id == chain_id)
        .copied()
}
