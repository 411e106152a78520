use serde::Serialize;
use std::path::PathBuf;

use vigil_core::{
    fleet::{FleetPolicy, InfrastructureSpec},
    inspection::InspectionSettings,
};

use crate::chain::ChainSettings;

/// Fully resolved node configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub inspection: InspectionConfig,
    pub local_mode: LocalModeConfig,
    pub fleet: FleetConfig,
    pub server: ServerConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Scheduler settings with retry and watchdog timings at their defaults.
    pub fn inspection_settings(&self) -> InspectionSettings {
        let mut settings = InspectionSettings::new(
            self.inspection.cadence,
            self.chain.rpc_url.clone(),
            self.inspection.proxy_url.clone(),
        );
        settings.check_trace = self.inspection.enable_trace;
        settings.trace_api_url = self.chain.trace_url.clone();
        settings.network_saving_mode = self.inspection.network_saving_mode;
        settings.enabled = self.local_mode.inspection_enabled();
        settings
    }

    pub fn fleet_policy(&self) -> FleetPolicy {
        self.fleet.policy.clone()
    }

    pub fn infrastructure(&self) -> &InfrastructureSpec {
        &self.fleet.infrastructure
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainConfig {
    pub id: u64,
    pub rpc_url: String,
    pub trace_url: Option<String>,
    pub settings: ChainSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectionConfig {
    pub cadence: u64,
    pub enable_trace: bool,
    pub network_saving_mode: bool,
    pub proxy_url: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LocalModeConfig {
    pub enable: bool,
    pub enable_inspection: bool,
}

impl LocalModeConfig {
    /// Inspection only runs outside local mode unless explicitly enabled.
    pub fn inspection_enabled(&self) -> bool {
        !self.enable || self.enable_inspection
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetConfig {
    pub docker_bin: String,
    pub policy: FleetPolicy,
    pub infrastructure: InfrastructureSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceSource {
    ChainTable,
    Override,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
    pub cadence_source: CadenceSource,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        Self {
            config_path: None,
            env_file_loaded: false,
            cadence_source: CadenceSource::ChainTable,
        }
    }
}
