//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use edge_gate::config::{ApiKeyConfig, GatewayConfig};
use edge_gate::storage::{MemoryBlobStore, MemoryKvStore, MemoryWindowStore, Stores};
use edge_gate::{GatewayServer, Shutdown};

pub const ADMIN_SECRET: &str = "admin-secret";

/// A gateway running on an ephemeral port with in-memory stores the test
/// can inspect directly.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
    pub kv: Arc<MemoryKvStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub windows: Arc<MemoryWindowStore>,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request builder already carrying the admin bearer secret.
    pub fn authed(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(ADMIN_SECRET)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.api_keys = vec![ApiKeyConfig {
        id: "admin-panel".into(),
        secret: ADMIN_SECRET.into(),
    }];
    config.upload.allowed_types = vec!["image/png".into(), "image/jpeg".into()];
    config.observability.metrics_enabled = false;
    config
}

/// Start a gateway. The listener is bound before this returns, so requests
/// can be sent immediately.
pub async fn spawn_gateway(mut config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();
    config.upload.public_base_url = format!("http://{addr}");

    let kv = Arc::new(MemoryKvStore::new(None));
    let blobs = Arc::new(MemoryBlobStore::new());
    let windows = Arc::new(MemoryWindowStore::new());
    let stores = Stores {
        kv: kv.clone(),
        blobs: blobs.clone(),
        windows: windows.clone(),
    };

    let server = GatewayServer::new(config, stores).unwrap();
    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    TestGateway {
        addr,
        shutdown,
        config_updates,
        kv,
        blobs,
        windows,
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
    }
}

#[allow(dead_code)]
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    bytes.resize(len.max(bytes.len()), 0);
    bytes
}
