use crate::config::NodeConfig;
use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Relay node control-plane emulator", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (defaults to node.toml when present)
    #[arg(short, long, env = "NODE_CONFIG")]
    pub config: Option<String>,

    /// Override listen address (host:port)
    #[arg(long, env = "NODE_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Override the listen port only
    #[arg(short, long, env = "NODE_PORT")]
    pub port: Option<u16>,

    /// Base64 secret key bundle issued by the control plane
    #[arg(short, long, env = "SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Disable authentication on every route
    #[arg(long)]
    pub no_auth: bool,

    /// Override snapshot file path
    #[arg(long, env = "NODE_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Bearer token required from workers
    #[arg(long, env = "NODE_WORKER_TOKEN")]
    pub worker_token: Option<String>,

    /// Force debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Override number of runtime worker threads
    #[arg(long)]
    pub runtime_threads: Option<usize>,
}

impl CliArgs {
    /// Load the configuration file and apply the command line on top of it.
    pub fn resolve(&self) -> anyhow::Result<NodeConfig> {
        let mut config = NodeConfig::load_or_default(self.config.as_deref())?;
        self.apply(&mut config)?;
        Ok(config)
    }

    fn apply(&self, config: &mut NodeConfig) -> anyhow::Result<()> {
        if let Some(listen_addr) = &self.listen_addr {
            config.listen_addr = listen_addr.clone();
        }
        if let Some(port) = self.port {
            let mut addr: SocketAddr = config
                .listen_addr
                .parse()
                .with_context(|| format!("Invalid listen_addr: {}", config.listen_addr))?;
            addr.set_port(port);
            config.listen_addr = addr.to_string();
        }
        if let Some(secret_key) = &self.secret_key {
            config.secret_key = Some(secret_key.clone());
        }
        if self.no_auth {
            config.no_auth = true;
        }
        if let Some(data_file) = &self.data_file {
            config.data_file = data_file.clone();
        }
        if let Some(worker_token) = &self.worker_token {
            config.worker_token = Some(worker_token.clone());
        }
        if self.debug {
            config.log_level = "debug".to_string();
        }
        if let Some(threads) = self.runtime_threads {
            config.runtime_threads = Some(threads);
        }
        Ok(())
    }
}
