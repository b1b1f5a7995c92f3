// ReconnectingSubscriber: supervised WebSocket task feeding one session
//
// The task connects to the relay, dispatches every text frame to the session
// in arrival order, and after any closure schedules a new attempt only while
// the session is RUNNING. Pausing keeps the connection; only an explicit
// close (reset, restart, drop) tears it down.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::core::ConnectionStatus;
use super::state::SessionState;
use super::SessionShared;

/// Default pause between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(800);

type RelayStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Handle to the running subscriber task. Dropping it closes the connection
/// and cancels any pending retry.
pub(crate) struct ReconnectingSubscriber {
    task: JoinHandle<()>,
}

impl ReconnectingSubscriber {
    /// Spawn the supervisor on the current Tokio runtime.
    pub(crate) fn open(
        shared: Arc<SessionShared>,
        generation: u64,
        url: String,
        retry_delay: Duration,
    ) -> Self {
        let state_rx = shared.watch_state();
        let task = tokio::spawn(supervise(shared, generation, url, retry_delay, state_rx));
        Self { task }
    }

    /// False once the supervisor stopped scheduling attempts.
    pub(crate) fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    pub(crate) fn close(self) {
        drop(self);
    }
}

impl Drop for ReconnectingSubscriber {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn supervise(
    shared: Arc<SessionShared>,
    generation: u64,
    url: String,
    retry_delay: Duration,
    mut state_rx: watch::Receiver<SessionState>,
) {
    loop {
        shared.set_connection(generation, ConnectionStatus::Connecting);
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!("[Subscriber] Connected to {}", url);
                shared.set_connection(generation, ConnectionStatus::Connected);
                pump(&shared, generation, stream).await;
                info!("[Subscriber] Connection to {} closed", url);
            }
            Err(err) => warn!("[Subscriber] Failed to connect to {}: {}", url, err),
        }
        shared.set_connection(generation, ConnectionStatus::Disconnected);

        if !wait_before_retry(&mut state_rx, retry_delay).await {
            debug!("[Subscriber] Session left RUNNING; no further attempts");
            break;
        }
    }
}

/// Read frames until the relay closes the stream or errors.
async fn pump(shared: &SessionShared, generation: u64, mut stream: RelayStream) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => shared.dispatch_frame(generation, &text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!("[Subscriber] Stream error: {}", err);
                break;
            }
        }
    }
}

/// Sleep for `delay` unless the session leaves RUNNING first.
///
/// Returns whether another attempt should be made.
async fn wait_before_retry(state_rx: &mut watch::Receiver<SessionState>, delay: Duration) -> bool {
    if !state_rx.borrow_and_update().is_running() {
        return false;
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return state_rx.borrow().is_running(),
            changed = state_rx.changed() => {
                if changed.is_err() || !state_rx.borrow_and_update().is_running() {
                    return false;
                }
            }
        }
    }
}
