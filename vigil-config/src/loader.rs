use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use vigil_core::{
    fleet::{
        AgentResources, DEFAULT_JSON_RPC_PORT, FleetPolicy, InfraContainerSpec,
        InfrastructureSpec,
    },
    runtime::LogRotation,
};

use crate::{
    chain::{chain_settings, known_chain},
    models::{
        CadenceSource, ChainConfig, Config, ConfigMetadata, FleetConfig,
        InspectionConfig, LocalModeConfig, ServerConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::ConfigWarnings,
};

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["vigil.toml", "config/vigil.toml"];

const DEFAULT_CHAIN_ID: u64 = 1;
const DEFAULT_NETWORK_NAME: &str = "vigil-node";
const DEFAULT_SCANNER_NAME: &str = "vigil-scanner";
const DEFAULT_SCANNER_IMAGE: &str = "ghcr.io/vigil-node/scanner:latest";
const DEFAULT_JSON_RPC_NAME: &str = "vigil-json-rpc";
const DEFAULT_JSON_RPC_IMAGE: &str = "ghcr.io/vigil-node/json-rpc:latest";
const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
const DEFAULT_SERVER_PORT: u16 = 8090;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, the process environment and the config file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`load`](Self::load) with an explicit environment layer and
    /// no `.env` handling.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (path.clone(), true),
            (None, None) => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => (path, false),
                None => return Ok((None, None)),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        debug!(target: "config", path = %path.display(), "reading configuration file");
        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if config_path.is_none() {
        warnings.push_with_hint(
            "No vigil.toml detected; falling back to environment variables",
            "Create vigil.toml or point VIGIL_CONFIG_PATH at a config file",
        );
    }

    let FileConfig {
        chain: file_chain,
        inspection: file_inspection,
        local_mode: file_local_mode,
        resources: file_resources,
        log: file_log,
        containers: file_containers,
        server: file_server,
    } = file_config.unwrap_or_default();

    // Chain
    let chain_id = env.chain_id.or(file_chain.id).unwrap_or(DEFAULT_CHAIN_ID);
    if known_chain(chain_id).is_none() {
        warnings.push(format!(
            "Chain {chain_id} has no dedicated settings; using defaults"
        ));
    }
    let settings = chain_settings(chain_id);

    let rpc_url = env
        .chain_rpc_url
        .or(file_chain.rpc_url)
        .ok_or(ConfigLoadError::MissingValue {
            field: "chain.rpc_url",
        })?;
    validate_url("chain.rpc_url", &rpc_url)?;

    let trace_url = env.trace_rpc_url.or(file_chain.trace_url);
    if let Some(url) = &trace_url {
        validate_url("chain.trace_url", url)?;
    }

    // Inspection
    let (cadence, cadence_source) = match env
        .inspection_block_interval
        .or(file_inspection.block_interval)
    {
        Some(interval) => (interval, CadenceSource::Override),
        None => (settings.inspection_interval, CadenceSource::ChainTable),
    };
    if cadence == 0 {
        return Err(ConfigLoadError::InvalidValue {
            field: "inspection.block_interval",
            reason: "must be greater than zero".to_string(),
        });
    }

    let mut enable_trace = env
        .enable_trace
        .or(file_inspection.enable_trace)
        .unwrap_or(settings.enable_trace);
    if enable_trace && trace_url.is_none() {
        warnings.push_with_hint(
            "Trace inspection requested without a trace RPC URL; disabling trace checks",
            "Set chain.trace_url or VIGIL_TRACE_RPC_URL",
        );
        enable_trace = false;
    }

    // Containers
    let json_rpc_name = file_containers
        .json_rpc_name
        .unwrap_or_else(|| DEFAULT_JSON_RPC_NAME.to_string());
    let json_rpc_port = env
        .json_rpc_port
        .or(file_containers.json_rpc_port)
        .unwrap_or(DEFAULT_JSON_RPC_PORT);

    let proxy_url = env
        .proxy_url
        .or(file_inspection.proxy_url)
        .unwrap_or_else(|| format!("http://{json_rpc_name}:{json_rpc_port}"));
    validate_url("inspection.proxy_url", &proxy_url)?;

    let local_mode = LocalModeConfig {
        enable: env.local_mode.or(file_local_mode.enable).unwrap_or(false),
        enable_inspection: env
            .local_mode_inspection
            .or(file_local_mode.enable_inspection)
            .unwrap_or(false),
    };
    if !local_mode.inspection_enabled() {
        warnings.push_with_hint(
            "Inspection is disabled in local mode",
            "Set local_mode.enable_inspection = true to run self-inspections",
        );
    }

    let defaults = AgentResources::default();
    let resources = AgentResources {
        max_cpus: env
            .max_cpus
            .or(file_resources.max_cpus)
            .or(defaults.max_cpus),
        max_memory_mib: env
            .max_memory_mib
            .or(file_resources.max_memory_mib)
            .or(defaults.max_memory_mib),
    };
    if resources.max_cpus.is_some_and(|cpus| cpus <= 0.0) {
        warnings.push("resources.max_cpus is not positive; CPU is unbounded");
    }

    let log_defaults = LogRotation::default();
    let log = LogRotation {
        max_size: env
            .log_max_size
            .or(file_log.max_size)
            .unwrap_or(log_defaults.max_size),
        max_files: env
            .log_max_files
            .or(file_log.max_files)
            .unwrap_or(log_defaults.max_files),
    };

    let scanner_image = require_image(
        "containers.scanner_image",
        env.scanner_image
            .or(file_containers.scanner_image)
            .unwrap_or_else(|| DEFAULT_SCANNER_IMAGE.to_string()),
    )?;
    let json_rpc_image = require_image(
        "containers.json_rpc_image",
        env.json_rpc_image
            .or(file_containers.json_rpc_image)
            .unwrap_or_else(|| DEFAULT_JSON_RPC_IMAGE.to_string()),
    )?;

    let fleet = FleetConfig {
        docker_bin: env
            .docker_bin
            .or(file_containers.docker_bin)
            .unwrap_or_else(|| "docker".to_string()),
        policy: FleetPolicy {
            resources,
            log,
            pull_images: env
                .pull_images
                .or(file_containers.pull_images)
                .unwrap_or(true),
            json_rpc_port,
        },
        infrastructure: InfrastructureSpec {
            network_name: file_containers
                .network_name
                .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string()),
            scanner: InfraContainerSpec {
                name: file_containers
                    .scanner_name
                    .unwrap_or_else(|| DEFAULT_SCANNER_NAME.to_string()),
                image: scanner_image,
                env: file_containers.scanner_env,
            },
            json_rpc_proxy: InfraContainerSpec {
                name: json_rpc_name,
                image: json_rpc_image,
                env: file_containers.json_rpc_env,
            },
        },
    };

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
        port: env
            .server_port
            .or(file_server.port)
            .unwrap_or(DEFAULT_SERVER_PORT),
    };

    let config = Config {
        chain: ChainConfig {
            id: chain_id,
            rpc_url,
            trace_url,
            settings,
        },
        inspection: InspectionConfig {
            cadence,
            enable_trace,
            network_saving_mode: env
                .network_saving_mode
                .or(file_inspection.network_saving_mode)
                .unwrap_or(false),
            proxy_url,
        },
        local_mode,
        fleet,
        server,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
            cadence_source,
        },
    };

    Ok((config, warnings))
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigLoadError> {
    let url =
        Url::parse(value).map_err(|source| ConfigLoadError::InvalidUrl {
            field,
            value: value.to_string(),
            source,
        })?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(()),
        other => Err(ConfigLoadError::InvalidValue {
            field,
            reason: format!("unsupported URL scheme '{other}'"),
        }),
    }
}

fn require_image(
    field: &'static str,
    image: String,
) -> Result<String, ConfigLoadError> {
    let image = image.trim().to_string();
    if image.is_empty() {
        return Err(ConfigLoadError::InvalidValue {
            field,
            reason: "image reference must not be empty".to_string(),
        });
    }
    Ok(image)
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("required setting {field} is not configured")]
    MissingValue { field: &'static str },
    #[error("invalid URL for {field}: '{value}'")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
