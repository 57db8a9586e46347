use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "node.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Snapshot file of the traffic store
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,

    /// Users seen within this many seconds count as online
    #[serde(default = "default_online_window_secs")]
    pub online_window_secs: u64,

    /// Disable both authentication gates
    #[serde(default)]
    pub no_auth: bool,

    /// Base64 JSON bundle handed out by the control plane
    #[serde(default)]
    pub secret_key: Option<String>,

    /// PEM public key verifying control-plane JWTs; wins over the bundle's key
    #[serde(default)]
    pub jwt_public_key: Option<String>,

    /// Bearer token required on /worker/* when set
    #[serde(default)]
    pub worker_token: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log directory for file-based logging; stdout when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Number of Tokio runtime worker threads (defaults to CPU cores)
    #[serde(default)]
    pub runtime_threads: Option<usize>,

    #[serde(default)]
    pub console_port: Option<u16>,

    /// Relay version reported to the control plane
    #[serde(default = "default_xray_version")]
    pub xray_version: String,

    #[serde(default = "default_node_version")]
    pub node_version: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:2222".to_string()
}

fn default_data_file() -> PathBuf {
    PathBuf::from("stats_data.json")
}

fn default_save_interval_secs() -> u64 {
    60
}

fn default_online_window_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "node.log".to_string()
}

fn default_xray_version() -> String {
    "1.8.24".to_string()
}

fn default_node_version() -> String {
    "1.0.0-worker".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            data_file: default_data_file(),
            save_interval_secs: default_save_interval_secs(),
            online_window_secs: default_online_window_secs(),
            no_auth: false,
            secret_key: None,
            jwt_public_key: None,
            worker_token: None,
            log_level: default_log_level(),
            log_dir: None,
            log_file: default_log_file(),
            runtime_threads: None,
            console_port: None,
            xray_version: default_xray_version(),
            node_version: default_node_version(),
        }
    }
}

impl NodeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: NodeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path` when given. Without one, `node.toml` is used if it exists
    /// and defaults otherwise.
    pub fn load_or_default(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }

    pub fn online_window(&self) -> Duration {
        Duration::from_secs(self.online_window_secs)
    }
}
