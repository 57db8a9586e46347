mod node_config;

pub use node_config::{DEFAULT_CONFIG_PATH, NodeConfig};
