//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::time::Duration;

use request_deadline::config::ServerConfig;
use request_deadline::HttpServer;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Config used by the demo scenarios: 1s deadline, 408 "request has timeout".
pub fn scenario_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeout.deadline_ms = 1000;
    config.timeout.status = 408;
    config.timeout.body = "request has timeout".into();
    config
}

/// A running demo server; dropping it shuts the server down.
pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the demo server on an ephemeral port.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = server
            .run_until(listener, async move {
                let _ = rx.await;
            })
            .await;
    });

    // Give the accept loop a moment
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        _shutdown: tx,
    }
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
