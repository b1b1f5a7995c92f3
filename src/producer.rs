//! Producer-side helper: one telemetry message per UDP datagram.

use std::io;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::{ToSocketAddrs, UdpSocket};

use crate::telemetry::TelemetryMessage;

/// Connected UDP sender aimed at a relay's ingress endpoint.
///
/// Sends are fire-and-forget: nothing is acknowledged and a datagram that
/// arrives while the relay has no clients is simply dropped there.
pub struct DatagramPublisher {
    socket: UdpSocket,
}

impl DatagramPublisher {
    /// Bind an ephemeral local port and connect it to `target`.
    pub async fn connect<A: ToSocketAddrs>(target: A) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("binding publisher socket")?;
        socket
            .connect(target)
            .await
            .context("connecting publisher socket")?;
        Ok(Self { socket })
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    /// Send raw text as a single datagram.
    pub async fn send_text(&self, text: &str) -> Result<usize> {
        self.socket
            .send(text.as_bytes())
            .await
            .context("sending telemetry datagram")
    }

    /// Encode `message` with canonical keys and send it.
    pub async fn send_message(&self, message: &TelemetryMessage) -> Result<usize> {
        let text = serde_json::to_string(message).context("encoding telemetry message")?;
        self.send_text(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{Detection, Timestamp};

    #[tokio::test]
    async fn sends_canonical_json_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let publisher = DatagramPublisher::connect(receiver.local_addr().unwrap())
            .await
            .unwrap();

        let message = TelemetryMessage {
            person_detected: true,
            detections: vec![Detection::new([10.0, 10.0, 50.0, 50.0], "person", 0.91)],
            timestamp: Timestamp::EpochSeconds(1000.0),
            loop_rate_hz: 30.0,
            det_rate_hz: 10.0,
        };
        publisher.send_message(&message).await.unwrap();

        let mut buf = [0u8; 1024];
        let len = receiver.recv(&mut buf).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(json["person"], true);
        assert_eq!(json["ts"], 1000.0);
        assert_eq!(json["detections"][0]["cls"], "person");
        assert_eq!(json["detections"][0]["conf"], 0.91);
    }
}
