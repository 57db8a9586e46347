use crate::api::{ApiServer, AppState};
use crate::auth;
use crate::config::NodeConfig;
use crate::error::Result;
use crate::persistence::DurabilityManager;
use crate::stats::TrafficStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// The node process: traffic store, snapshot scheduler and API server.
pub struct NodeServer {
    config: Arc<NodeConfig>,
    store: Arc<TrafficStore>,
    durability: Arc<DurabilityManager>,
}

impl NodeServer {
    pub async fn new(config: NodeConfig) -> Result<Self> {
        let config = Arc::new(config);
        let store = Arc::new(TrafficStore::new(config.online_window()));
        let durability = Arc::new(DurabilityManager::new(
            store.clone(),
            config.data_file.clone(),
        ));

        let restoring = durability.clone();
        let outcome = tokio::task::spawn_blocking(move || restoring.restore()).await?;
        info!(
            "Snapshot restore from {}: {:?}",
            durability.path().display(),
            outcome
        );

        Ok(Self {
            config,
            store,
            durability,
        })
    }

    /// Run until `shutdown` fires. The API server drains first, then the
    /// scheduler writes its final snapshot.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let state = AppState {
            config: self.config.clone(),
            store: self.store.clone(),
            control_gate: auth::control_plane_gate(&self.config)?,
            worker_gate: auth::worker_gate(&self.config),
        };

        // stopped only once the server has drained, so the final snapshot
        // includes every acknowledged report
        let stop_scheduler = CancellationToken::new();
        let scheduler = tokio::spawn(
            self.durability
                .clone()
                .run(self.config.save_interval(), stop_scheduler.clone()),
        );

        let served = ApiServer::new(state).run(shutdown).await;
        if let Err(e) = &served {
            error!("API server error: {}", e);
        }

        stop_scheduler.cancel();
        scheduler.await?;
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Snapshot;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn free_local_addr() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    async fn connect(addr: &str) -> TcpStream {
        for _ in 0..100 {
            if let Ok(stream) = TcpStream::connect(addr).await {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("server never came up on {addr}");
    }

    #[tokio::test]
    async fn report_acknowledged_during_drain_reaches_final_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = NodeConfig {
            listen_addr: free_local_addr(),
            data_file: dir.path().join("stats_data.json"),
            save_interval_secs: 3600,
            ..NodeConfig::default()
        };
        let addr = config.listen_addr.clone();
        let data_file = config.data_file.clone();

        let shutdown = CancellationToken::new();
        let server = NodeServer::new(config).await.unwrap();
        let running = tokio::spawn(server.run(shutdown.clone()));

        let body = r#"{"uuid":"late-user","uplink":5,"downlink":6}"#;
        let (head, tail) = body.split_at(10);
        let mut stream = connect(&addr).await;
        stream
            .write_all(
                format!(
                    "POST /worker/report HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{head}",
                    body.len()
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // the request is mid-body when shutdown starts
        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        stream.write_all(tail.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains(r#"{"success":true}"#), "{response}");

        running.await.unwrap().unwrap();

        let snapshot: Snapshot =
            serde_json::from_slice(&std::fs::read(&data_file).unwrap()).unwrap();
        assert!(snapshot.users.iter().any(|user| user.username == "late-user"));
    }
}
