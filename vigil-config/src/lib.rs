//! Configuration loading for the vigil node.
//!
//! Values are layered: a TOML file (explicit path, `VIGIL_CONFIG_PATH`, or
//! `vigil.toml` / `config/vigil.toml`), then `.env`, then `VIGIL_*` process
//! variables, with the environment winning. Per-chain inspection defaults come
//! from [`chain::chain_settings`] unless overridden.

pub mod chain;
pub mod loader;
pub mod models;
pub mod sources;
pub mod util;
pub mod validation;

pub use chain::{ChainSettings, chain_settings};
pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    CadenceSource, ChainConfig, Config, ConfigMetadata, FleetConfig,
    InspectionConfig, LocalModeConfig, ServerConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigWarning, ConfigWarnings};
