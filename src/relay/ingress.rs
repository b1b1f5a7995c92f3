//! Datagram ingress: validate each UDP datagram and hand it to the broadcaster.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::net::UdpSocket;

use crate::managers::{ClientRegistry, Payload};

use super::stats::RelayStats;

/// Why a datagram was dropped.
#[derive(Debug)]
pub enum IngressError {
    InvalidJson(serde_json::Error),
    /// Valid JSON, but not an object
    NotObject,
}

impl fmt::Display for IngressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngressError::InvalidJson(err) => write!(f, "datagram is not JSON: {}", err),
            IngressError::NotObject => write!(f, "datagram is not a JSON object"),
        }
    }
}

impl std::error::Error for IngressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngressError::InvalidJson(err) => Some(err),
            IngressError::NotObject => None,
        }
    }
}

/// Check one datagram and return the text to forward.
///
/// Invalid UTF-8 sequences are skipped, then surrounding whitespace is
/// trimmed. The payload is that text, unchanged otherwise; parsing only
/// decides whether it is forwarded.
pub fn validate_datagram(bytes: &[u8]) -> Result<Payload, IngressError> {
    let decoded = decode_skipping_invalid(bytes);
    let text = decoded.trim();
    let value: serde_json::Value = serde_json::from_str(text).map_err(IngressError::InvalidJson)?;
    if !value.is_object() {
        return Err(IngressError::NotObject);
    }
    Ok(Payload::from(text))
}

fn decode_skipping_invalid(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let mut text = String::with_capacity(bytes.len());
            for chunk in bytes.utf8_chunks() {
                text.push_str(chunk.valid());
            }
            Cow::Owned(text)
        }
    }
}

/// Receive datagrams until the task is dropped.
///
/// Messages are broadcast one at a time, in arrival order. Neither a bad
/// datagram nor a socket error ends the loop.
pub(crate) async fn run_ingress(
    socket: UdpSocket,
    registry: Arc<ClientRegistry>,
    stats: Arc<RelayStats>,
    max_datagram_bytes: usize,
) {
    let mut buf = vec![0u8; max_datagram_bytes.max(1)];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                warn!("[Ingress] Receive error: {}", err);
                continue;
            }
        };
        stats.record_received();

        let payload = match validate_datagram(&buf[..len]) {
            Ok(payload) => payload,
            Err(err) => {
                stats.record_malformed();
                debug!("[Ingress] Dropping datagram from {}: {}", peer, err);
                continue;
            }
        };

        let report = registry.broadcast(payload).await;
        trace!(
            "[Ingress] Forwarded {} bytes from {} to {} client(s)",
            len,
            peer,
            report.delivered
        );
        stats.record_broadcast(&report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_trimmed_object_verbatim() {
        let payload = validate_datagram(b"  {\"person\": true, \"ts\":1000}\n").unwrap();
        assert_eq!(&*payload, "{\"person\": true, \"ts\":1000}");
    }

    #[test]
    fn rejects_malformed_datagrams() {
        assert!(matches!(
            validate_datagram(&[0xff, 0xfe, 0xfd]),
            Err(IngressError::InvalidJson(_))
        ));
        assert!(matches!(
            validate_datagram(b"{not json"),
            Err(IngressError::InvalidJson(_))
        ));
        assert!(matches!(
            validate_datagram(b""),
            Err(IngressError::InvalidJson(_))
        ));
        for scalar in [&b"42"[..], b"\"text\"", b"[1,2]", b"null"] {
            assert!(matches!(
                validate_datagram(scalar),
                Err(IngressError::NotObject)
            ));
        }
    }

    #[test]
    fn stray_invalid_bytes_are_skipped() {
        let raw = b"{\"person\":true,\"detections\":[{\"cls\":\"per\xffson\",\"conf\":0.9}]}";
        let payload = validate_datagram(raw).unwrap();
        assert_eq!(
            &*payload,
            r#"{"person":true,"detections":[{"cls":"person","conf":0.9}]}"#
        );

        let payload = validate_datagram(&[0xfe, b' ', b'{', b'}', 0xff]).unwrap();
        assert_eq!(&*payload, "{}");
    }

    #[test]
    fn unknown_fields_are_kept() {
        let raw = r#"{"person":false,"extra":{"nested":[1,2,3]}}"#;
        assert_eq!(&*validate_datagram(raw.as_bytes()).unwrap(), raw);
    }
}
