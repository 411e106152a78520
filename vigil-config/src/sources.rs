use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

use crate::util::{non_empty, parse_bool, parse_value};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub chain: FileChainConfig,
    #[serde(default)]
    pub inspection: FileInspectionConfig,
    #[serde(default)]
    pub local_mode: FileLocalModeConfig,
    #[serde(default)]
    pub resources: FileResourcesConfig,
    #[serde(default)]
    pub log: FileLogConfig,
    #[serde(default)]
    pub containers: FileContainersConfig,
    #[serde(default)]
    pub server: FileServerConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileChainConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileInspectionConfig {
    /// Overrides the chain's inspection interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_trace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_saving_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLocalModeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_inspection: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileResourcesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cpus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_memory_mib: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileContainersConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_bin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner_image: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scanner_env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_rpc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_rpc_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_rpc_port: Option<u16>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub json_rpc_env: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub chain_id: Option<u64>,
    pub chain_rpc_url: Option<String>,
    pub trace_rpc_url: Option<String>,
    pub inspection_block_interval: Option<u64>,
    pub enable_trace: Option<bool>,
    pub network_saving_mode: Option<bool>,
    pub proxy_url: Option<String>,
    pub local_mode: Option<bool>,
    pub local_mode_inspection: Option<bool>,
    pub max_cpus: Option<f64>,
    pub max_memory_mib: Option<u64>,
    pub log_max_size: Option<String>,
    pub log_max_files: Option<u32>,
    pub docker_bin: Option<String>,
    pub pull_images: Option<bool>,
    pub scanner_image: Option<String>,
    pub json_rpc_image: Option<String>,
    pub json_rpc_port: Option<u16>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
}

impl EnvConfig {
    /// Reads `VIGIL_*` variables from the process environment.
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the environment layer from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str| non_empty(lookup(name));
        let boolean =
            |name: &str| string(name).and_then(|raw| parse_bool(&raw));

        Self {
            config_path: string("VIGIL_CONFIG_PATH").map(PathBuf::from),
            chain_id: parse_value(lookup("VIGIL_CHAIN_ID")),
            chain_rpc_url: string("VIGIL_CHAIN_RPC_URL"),
            trace_rpc_url: string("VIGIL_TRACE_RPC_URL"),
            inspection_block_interval: parse_value(lookup(
                "VIGIL_INSPECTION_BLOCK_INTERVAL",
            )),
            enable_trace: boolean("VIGIL_INSPECTION_ENABLE_TRACE"),
            network_saving_mode: boolean("VIGIL_NETWORK_SAVING_MODE"),
            proxy_url: string("VIGIL_PROXY_URL"),
            local_mode: boolean("VIGIL_LOCAL_MODE"),
            local_mode_inspection: boolean("VIGIL_LOCAL_MODE_INSPECTION"),
            max_cpus: parse_value(lookup("VIGIL_AGENT_MAX_CPUS")),
            max_memory_mib: parse_value(lookup("VIGIL_AGENT_MAX_MEMORY_MIB")),
            log_max_size: string("VIGIL_LOG_MAX_SIZE"),
            log_max_files: parse_value(lookup("VIGIL_LOG_MAX_FILES")),
            docker_bin: string("VIGIL_DOCKER_BIN"),
            pull_images: boolean("VIGIL_PULL_IMAGES"),
            scanner_image: string("VIGIL_SCANNER_IMAGE"),
            json_rpc_image: string("VIGIL_JSON_RPC_IMAGE"),
            json_rpc_port: parse_value(lookup("VIGIL_JSON_RPC_PORT")),
            server_host: string("VIGIL_SERVER_HOST"),
            server_port: parse_value(lookup("VIGIL_SERVER_PORT")),
        }
    }
}
