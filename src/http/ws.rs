use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::managers::{ClientRegistry, Payload};

#[derive(Debug)]
enum ForwardError<E> {
    Send(E),
    TimedOut,
}

/// Drive one upgraded connection until it closes or is pruned.
///
/// Inbound frames are read only to notice close and error; their content is
/// ignored. A frame write is bounded by the registry's send timeout. The
/// client is unregistered on every exit path.
pub(super) async fn serve_client(
    mut socket: WebSocket,
    registry: Arc<ClientRegistry>,
    outbound_capacity: usize,
) {
    let (tx, mut rx) = mpsc::channel::<Payload>(outbound_capacity);
    let id = registry.register(tx);
    let write_timeout = registry.send_timeout();
    let span = tracing::info_span!("stream_client", client = %id);

    async {
        tracing::info!(clients = registry.len(), "connected");
        loop {
            tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(payload) => match forward(&mut socket, &payload, write_timeout).await {
                        Ok(()) => {}
                        Err(ForwardError::Send(err)) => {
                            tracing::debug!(error = %err, "send failed");
                            break;
                        }
                        Err(ForwardError::TimedOut) => {
                            tracing::info!(timeout_ms = write_timeout.as_millis() as u64, "send stalled");
                            break;
                        }
                    },
                    // Registry dropped our sender: we were pruned.
                    None => break,
                },
                inbound = socket.recv() => match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "receive failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
        registry.unregister(id);
        tracing::info!(clients = registry.len(), "disconnected");
    }
    .instrument(span)
    .await
}

/// Write one payload as a text frame, giving up after `limit`.
async fn forward<S>(
    sink: &mut S,
    payload: &Payload,
    limit: Duration,
) -> Result<(), ForwardError<S::Error>>
where
    S: Sink<Message> + Unpin,
{
    match tokio::time::timeout(limit, sink.send(Message::Text(payload.to_string()))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(ForwardError::Send(err)),
        Err(_) => Err(ForwardError::TimedOut),
    }
}
