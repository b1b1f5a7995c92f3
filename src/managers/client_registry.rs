// ClientRegistry: set of connected stream clients and the fan-out to them
// Single Responsibility: membership bookkeeping and concurrent delivery

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;

/// Shared, immutable message body; every client gets the same bytes.
pub type Payload = std::sync::Arc<str>;

/// Opaque handle for one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Outcome of one broadcast call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members that accepted the payload
    pub delivered: usize,
    /// Members removed because their send failed or timed out
    pub pruned: Vec<ClientId>,
}

/// Manages the set of live stream clients
///
/// Each client is represented by the sending half of its bounded outbound
/// queue. The connection task owns the receiving half and forwards whatever
/// arrives as a text frame.
///
/// # Concurrency
/// - Membership lives behind a std `Mutex` that is never held across `.await`
/// - `broadcast` works on a snapshot, so registrations during a send are
///   only reached by the next message
/// - Pruning happens after all sends of a message have finished
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, mpsc::Sender<Payload>>>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl ClientRegistry {
    /// Create an empty registry
    ///
    /// # Arguments
    /// * `send_timeout` - Upper bound for a single delivery before the client
    ///   is considered failed
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            send_timeout,
        }
    }

    /// Upper bound for a single delivery
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Add a client and return its handle
    pub fn register(&self, outbound: mpsc::Sender<Payload>) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.clients
            .lock()
            .expect("client registry lock poisoned")
            .insert(id, outbound);
        log::debug!("[Registry] Registered {}", id);
        id
    }

    /// Remove a client
    ///
    /// # Returns
    /// `true` if the client was a member; removing an absent client is a no-op
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self
            .clients
            .lock()
            .expect("client registry lock poisoned")
            .remove(&id)
            .is_some();
        if removed {
            log::debug!("[Registry] Unregistered {}", id);
        }
        removed
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients
            .lock()
            .expect("client registry lock poisoned")
            .contains_key(&id)
    }

    /// Handles of all current members, in no particular order
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients
            .lock()
            .expect("client registry lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .expect("client registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver one payload to every current member
    ///
    /// Sends run concurrently, each bounded by the registry's send timeout.
    /// A member whose queue is closed or stays full past the timeout is
    /// unregistered once every send has completed.
    ///
    /// # Returns
    /// Delivery count and the handles that were pruned
    pub async fn broadcast(&self, payload: Payload) -> BroadcastReport {
        let members: Vec<(ClientId, mpsc::Sender<Payload>)> = {
            let clients = self.clients.lock().expect("client registry lock poisoned");
            clients
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let timeout = self.send_timeout;
        let sends = members.into_iter().map(|(id, tx)| {
            let payload = Payload::clone(&payload);
            async move { (id, tx.send_timeout(payload, timeout).await.is_ok()) }
        });
        let results = join_all(sends).await;

        let mut report = BroadcastReport::default();
        for (id, ok) in results {
            if ok {
                report.delivered += 1;
            } else if self.unregister(id) {
                log::info!("[Registry] Pruned unresponsive {}", id);
                report.pruned.push(id);
            }
        }
        report
    }
}
