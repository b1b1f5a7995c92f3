//! Telemetry relay: UDP datagram ingress fanned out to WebSocket clients.
//!
//! [`Relay::bind`] claims both endpoints up front so a bind failure is
//! reported before anything runs. [`BoundRelay::run`] then drives the
//! ingress loop and the stream server until one of them stops.

mod ingress;
mod stats;

pub use ingress::{validate_datagram, IngressError};
pub use stats::{RelayStats, RelayStatsSnapshot};

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use tokio::net::{TcpListener, UdpSocket};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::http::{build_router, RelayHttpState};
use crate::managers::ClientRegistry;

/// Entry point for starting a relay.
pub struct Relay;

impl Relay {
    /// Bind the datagram socket and the stream listener.
    pub async fn bind(config: &RelayConfig) -> Result<BoundRelay, RelayError> {
        let udp = UdpSocket::bind(config.udp_addr.as_str())
            .await
            .map_err(|err| RelayError::BindFailed {
                endpoint: format!("udp {}", config.udp_addr),
                reason: err.to_string(),
            })?;
        let listener = TcpListener::bind(config.ws_addr.as_str())
            .await
            .map_err(|err| RelayError::BindFailed {
                endpoint: format!("ws {}", config.ws_addr),
                reason: err.to_string(),
            })?;

        Ok(BoundRelay {
            udp,
            listener,
            registry: Arc::new(ClientRegistry::new(config.send_timeout())),
            stats: Arc::new(RelayStats::new()),
            config: config.clone(),
        })
    }
}

/// A relay whose endpoints are bound but not yet serving.
pub struct BoundRelay {
    udp: UdpSocket,
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    stats: Arc<RelayStats>,
    config: RelayConfig,
}

impl BoundRelay {
    pub fn local_udp_addr(&self) -> std::io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    pub fn local_ws_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    /// Serve until the process is stopped or a component fails.
    pub async fn run(self) -> Result<(), RelayError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Returns `Ok(())` on shutdown; a stream server failure or a stopped
    /// ingress task is an error.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let BoundRelay {
            udp,
            listener,
            registry,
            stats,
            config,
        } = self;

        if let (Ok(udp_addr), Ok(ws_addr)) = (udp.local_addr(), listener.local_addr()) {
            info!(
                "[Relay] Ingress on udp://{}, stream server on ws://{}{}",
                udp_addr, ws_addr, config.ws_path
            );
        }

        let mut ingress = tokio::spawn(ingress::run_ingress(
            udp,
            Arc::clone(&registry),
            Arc::clone(&stats),
            config.max_datagram_bytes,
        ));

        let state = RelayHttpState::new(registry, stats, config.outbound_capacity);
        let router = build_router(state, &config.ws_path);
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .into_future();

        let result = tokio::select! {
            served = server => served.map_err(|err| RelayError::ServeFailed {
                reason: err.to_string(),
            }),
            joined = &mut ingress => Err(RelayError::IngressStopped {
                reason: match joined {
                    Ok(()) => "ingress loop returned".to_string(),
                    Err(err) => err.to_string(),
                },
            }),
        };

        ingress.abort();
        info!("[Relay] Stopped");
        result
    }
}
