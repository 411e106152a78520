use std::{collections::HashMap, fs, path::Path};

use tempfile::TempDir;

use vigil_config::{
    CadenceSource, ConfigLoadError, ConfigLoader, EnvConfig,
};

fn env(vars: &[(&str, &str)]) -> EnvConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| vars.get(name).cloned())
}

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("vigil.toml");
    fs::write(&path, contents).unwrap();
    path
}

const SAMPLE: &str = r#"
[chain]
id = 137
rpc_url = "https://polygon.example/rpc"

[inspection]
network_saving_mode = true

[resources]
max_cpus = 1.5
max_memory_mib = 2048

[containers]
scanner_image = "registry/scanner:7"
json_rpc_port = 9545

[containers.scanner_env]
SCANNER_MODE = "live"
"#;

#[test]
fn file_values_are_composed_with_chain_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), SAMPLE);

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env(&[]))
        .unwrap();
    let config = load.config;

    assert_eq!(config.chain.id, 137);
    assert_eq!(config.inspection.cadence, 250);
    assert_eq!(config.metadata.cadence_source, CadenceSource::ChainTable);
    assert!(!config.inspection.enable_trace);
    assert!(config.inspection.network_saving_mode);
    assert_eq!(config.inspection.proxy_url, "http://vigil-json-rpc:9545");
    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));

    let policy = config.fleet_policy();
    assert_eq!(policy.resources.max_cpus, Some(1.5));
    assert_eq!(policy.resources.max_memory_mib, Some(2048));
    assert_eq!(policy.json_rpc_port, 9545);

    let infra = config.infrastructure();
    assert_eq!(infra.scanner.image, "registry/scanner:7");
    assert_eq!(infra.scanner.env["SCANNER_MODE"], "live");

    let settings = config.inspection_settings();
    assert_eq!(settings.cadence, 250);
    assert_eq!(settings.scan_api_url, "https://polygon.example/rpc");
    assert!(settings.enabled);
    assert!(load.warnings.is_empty());
}

#[test]
fn environment_overrides_the_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), SAMPLE);

    let config = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env(&[
            ("VIGIL_CHAIN_ID", "1"),
            ("VIGIL_INSPECTION_BLOCK_INTERVAL", "10"),
            ("VIGIL_TRACE_RPC_URL", "http://trace.example"),
            ("VIGIL_AGENT_MAX_CPUS", "0.25"),
            ("VIGIL_SERVER_PORT", "9000"),
        ]))
        .unwrap()
        .config;

    assert_eq!(config.chain.id, 1);
    assert_eq!(config.inspection.cadence, 10);
    assert_eq!(config.metadata.cadence_source, CadenceSource::Override);
    assert!(config.inspection.enable_trace);
    assert_eq!(config.fleet.policy.resources.max_cpus, Some(0.25));
    assert_eq!(config.server_addr(), "127.0.0.1:9000");

    let settings = config.inspection_settings();
    assert!(settings.check_trace);
    assert_eq!(
        settings.trace_api_url.as_deref(),
        Some("http://trace.example")
    );
}

#[test]
fn config_path_can_come_from_the_environment() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), SAMPLE);
    let path_str = path.to_string_lossy().to_string();

    let config = ConfigLoader::new()
        .load_with_env(env(&[("VIGIL_CONFIG_PATH", path_str.as_str())]))
        .unwrap()
        .config;

    assert_eq!(config.chain.id, 137);
}

#[test]
fn trace_without_url_is_disabled_with_a_warning() {
    let load = ConfigLoader::new()
        .load_with_env(env(&[
            ("VIGIL_CHAIN_ID", "1"),
            ("VIGIL_CHAIN_RPC_URL", "http://localhost:8545"),
        ]))
        .unwrap();

    assert!(!load.config.inspection.enable_trace);
    assert!(load.warnings.mentions("trace RPC URL"));
    assert!(load.warnings.mentions("No vigil.toml"));
}

#[test]
fn local_mode_disables_inspection_unless_enabled() {
    let base = [
        ("VIGIL_CHAIN_RPC_URL", "http://localhost:8545"),
        ("VIGIL_LOCAL_MODE", "true"),
    ];

    let load = ConfigLoader::new().load_with_env(env(&base)).unwrap();
    assert!(!load.config.inspection_settings().enabled);
    assert!(load.warnings.mentions("local mode"));

    let mut vars = base.to_vec();
    vars.push(("VIGIL_LOCAL_MODE_INSPECTION", "1"));
    let load = ConfigLoader::new().load_with_env(env(&vars)).unwrap();
    assert!(load.config.inspection_settings().enabled);
}

#[test]
fn unknown_chain_warns_and_uses_defaults() {
    let load = ConfigLoader::new()
        .load_with_env(env(&[
            ("VIGIL_CHAIN_ID", "31337"),
            ("VIGIL_CHAIN_RPC_URL", "http://localhost:8545"),
        ]))
        .unwrap();

    assert_eq!(load.config.inspection.cadence, 250);
    assert!(load.warnings.mentions("31337"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("nope.toml"))
        .load_with_env(env(&[]))
        .unwrap_err();

    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn missing_rpc_url_is_an_error() {
    let err = ConfigLoader::new().load_with_env(env(&[])).unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::MissingValue {
            field: "chain.rpc_url"
        }
    ));
}

#[test]
fn invalid_values_are_rejected() {
    let err = ConfigLoader::new()
        .load_with_env(env(&[("VIGIL_CHAIN_RPC_URL", "not a url")]))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::InvalidUrl { .. }));

    let err = ConfigLoader::new()
        .load_with_env(env(&[
            ("VIGIL_CHAIN_RPC_URL", "http://localhost:8545"),
            ("VIGIL_INSPECTION_BLOCK_INTERVAL", "0"),
        ]))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::InvalidValue { .. }));
}

#[test]
fn malformed_toml_reports_the_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[chain\nid = ");

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env(&[]))
        .unwrap_err();

    match err {
        ConfigLoadError::Parse { path: reported, .. } => {
            assert_eq!(reported, path)
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn env_file_is_loaded_into_the_process_environment() {
    let dir = TempDir::new().unwrap();
    let env_file = dir.path().join(".env");
    fs::write(
        &env_file,
        "VIGIL_CHAIN_RPC_URL=http://from-dotenv.example:8545\n",
    )
    .unwrap();

    let load = ConfigLoader::new()
        .with_config_path(write_config(dir.path(), "[chain]\nid = 1\n"))
        .with_env_file(&env_file)
        .load()
        .unwrap();

    assert!(load.config.metadata.env_file_loaded);
    assert_eq!(
        load.config.chain.rpc_url,
        "http://from-dotenv.example:8545"
    );
}
