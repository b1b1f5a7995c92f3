#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use telemetry_relay::managers::ClientRegistry;
use telemetry_relay::relay::RelayStats;
use telemetry_relay::{Relay, RelayConfig};
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

pub struct TestRelay {
    pub udp_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub registry: Arc<ClientRegistry>,
    pub stats: Arc<RelayStats>,
    pub task: JoinHandle<()>,
}

impl TestRelay {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.ws_addr)
    }

    /// Wait until the relay has exactly `count` registered clients.
    pub async fn wait_for_clients(&self, count: usize) {
        tokio::time::timeout(WAIT, async {
            while self.registry.len() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {} clients, registry has {}",
                count,
                self.registry.len()
            )
        });
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn start_relay_on(ws_addr: &str) -> TestRelay {
    let config = RelayConfig {
        udp_addr: "127.0.0.1:0".to_string(),
        ws_addr: ws_addr.to_string(),
        ..RelayConfig::default()
    };
    let relay = Relay::bind(&config).await.unwrap();
    let udp_addr = relay.local_udp_addr().unwrap();
    let ws_addr = relay.local_ws_addr().unwrap();
    let registry = relay.registry();
    let stats = relay.stats();
    let task = tokio::spawn(async move {
        let _ = relay.run().await;
    });

    TestRelay {
        udp_addr,
        ws_addr,
        registry,
        stats,
        task,
    }
}

pub async fn start_relay() -> TestRelay {
    start_relay_on("127.0.0.1:0").await
}
