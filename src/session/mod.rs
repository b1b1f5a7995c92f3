//! Dashboard session: the client side of the telemetry stream.
//!
//! A [`DashboardSession`] owns the READY/RUNNING/PAUSED state machine, the
//! bounded presentation buffers, and at most one reconnecting subscriber. It
//! publishes everything the display shell needs as [`SessionEvent`]s on a
//! broadcast channel.
//!
//! Command methods spawn the subscriber with `tokio::spawn` and must be
//! called from within a Tokio runtime.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{Stream, StreamExt};
use log::{debug, error, info};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::overlay::{DisplayRect, OverlayBox};

pub mod buffers;
pub mod clock;
pub mod core;
pub mod entry;
pub mod state;
mod subscriber;

pub use buffers::{ConfidenceSeries, EventLog};
pub use clock::{FixedTimeSource, SystemTimeSource, TimeSource};
pub use self::core::{
    AcceptedTelemetry, ConnectionStatus, RateDiagnostics, SessionCore, SessionSnapshot,
    SubscriberAction, Transition,
};
pub use entry::{EntryStatus, LogEntry, StatusBanner};
pub use state::{SessionCommand, SessionState};
pub use subscriber::DEFAULT_RECONNECT_DELAY;

use subscriber::ReconnectingSubscriber;

/// Events published to the display shell, in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    Connection(ConnectionStatus),
    Entry(LogEntry),
    /// Raised once per accepted ALERT message, never debounced.
    Alert(LogEntry),
    Overlay(Vec<OverlayBox>),
}

/// State shared between the session handle and its subscriber task.
///
/// Each subscriber is opened with a generation number. Superseding or
/// closing it bumps the generation under the core lock, after which calls
/// from the old task are ignored even if it has not yet observed its abort.
pub(crate) struct SessionShared {
    core: Mutex<SessionCore>,
    events: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    generation: AtomicU64,
}

impl SessionShared {
    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine; the shell may attach later.
        let _ = self.events.send(event);
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Retire the current subscriber generation. Call with the core locked.
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Fold one inbound frame; events go out while the core is locked so
    /// their order matches the order of state mutation.
    pub(crate) fn dispatch_frame(&self, generation: u64, text: &str) {
        let mut core = match self.core.lock() {
            Ok(core) => core,
            Err(_) => {
                error!("[Session] Core lock poisoned; dropping frame");
                return;
            }
        };
        if !self.is_current(generation) {
            return;
        }

        match core.ingest_frame(text) {
            Ok(Some(accepted)) => {
                self.publish(SessionEvent::Entry(accepted.entry.clone()));
                if accepted.alert {
                    self.publish(SessionEvent::Alert(accepted.entry));
                }
                self.publish(SessionEvent::Overlay(accepted.overlay));
            }
            Ok(None) => {}
            Err(err) => debug!("[Session] Dropping undecodable frame: {}", err),
        }
    }

    pub(crate) fn set_connection(&self, generation: u64, status: ConnectionStatus) {
        if let Ok(mut core) = self.core.lock() {
            if self.is_current(generation) {
                self.update_connection(&mut core, status);
            }
        }
    }

    fn update_connection(&self, core: &mut SessionCore, status: ConnectionStatus) {
        if core.set_connection(status) {
            self.publish(SessionEvent::Connection(status));
        }
    }
}

/// One dashboard's view of the telemetry stream.
pub struct DashboardSession {
    shared: Arc<SessionShared>,
    subscriber: Mutex<Option<ReconnectingSubscriber>>,
    relay_url: String,
    reconnect_delay: Duration,
}

impl DashboardSession {
    /// Create a READY session using the system clock.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_time_source(config, Arc::new(SystemTimeSource::default()))
    }

    pub fn with_time_source(config: SessionConfig, clock: Arc<dyn TimeSource>) -> Self {
        let core = SessionCore::new(&config, clock);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (state_tx, _) = watch::channel(core.state());

        Self {
            shared: Arc::new(SessionShared {
                core: Mutex::new(core),
                events,
                state_tx,
                generation: AtomicU64::new(0),
            }),
            subscriber: Mutex::new(None),
            relay_url: config.relay_url.clone(),
            reconnect_delay: config.reconnect_delay(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Event stream that skips over lag gaps instead of ending.
    pub fn event_stream(&self) -> Pin<Box<dyn Stream<Item = SessionEvent> + Send>> {
        let stream = BroadcastStream::new(self.subscribe_events())
            .filter_map(|result| async move { result.ok() });
        Box::pin(stream)
    }

    pub fn state(&self) -> Result<SessionState, SessionError> {
        Ok(self.lock_core()?.state())
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        Ok(self.lock_core()?.snapshot())
    }

    /// True while a subscriber task is connected, connecting, or waiting to retry.
    pub fn is_subscribed(&self) -> bool {
        self.subscriber
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|sub| sub.is_alive()))
            .unwrap_or(false)
    }

    pub fn start(&self) -> Result<SessionState, SessionError> {
        self.command(SessionCommand::Start)
    }

    pub fn pause(&self) -> Result<SessionState, SessionError> {
        self.command(SessionCommand::Pause)
    }

    pub fn resume(&self) -> Result<SessionState, SessionError> {
        self.command(SessionCommand::Resume)
    }

    pub fn toggle_pause(&self) -> Result<SessionState, SessionError> {
        self.command(SessionCommand::TogglePause)
    }

    pub fn reset(&self) -> Result<SessionState, SessionError> {
        self.command(SessionCommand::Reset)
    }

    /// Apply a shell command and carry out its subscriber side effect.
    ///
    /// Returns the new state.
    pub fn command(&self, command: SessionCommand) -> Result<SessionState, SessionError> {
        // Held for the whole command so concurrent commands serialize.
        let mut subscriber = self
            .subscriber
            .lock()
            .map_err(|_| SessionError::LockPoisoned)?;

        let (transition, opened) = {
            let mut core = self.lock_core()?;
            let transition = core.apply(command)?;

            // A subscriber that already saw the connection drop may be about
            // to exit without retrying, so resume replaces it.
            let replace = match transition.action {
                SubscriberAction::Reopen | SubscriberAction::Close => true,
                SubscriberAction::EnsureOpen => {
                    core.connection() == ConnectionStatus::Disconnected
                        || !subscriber.as_ref().is_some_and(|sub| sub.is_alive())
                }
                SubscriberAction::Keep => false,
            };
            let generation = replace.then(|| self.shared.next_generation());

            self.shared.state_tx.send_replace(transition.to);
            self.shared.publish(SessionEvent::StateChanged {
                from: transition.from,
                to: transition.to,
            });
            if transition.action == SubscriberAction::Close {
                self.shared
                    .update_connection(&mut core, ConnectionStatus::Disconnected);
            }
            let opened = generation.filter(|_| transition.action != SubscriberAction::Close);
            (transition, opened)
        };

        info!(
            "[Session] {} : {} -> {}",
            command, transition.from, transition.to
        );

        if transition.action == SubscriberAction::Close {
            if let Some(previous) = subscriber.take() {
                previous.close();
            }
        }
        if let Some(generation) = opened {
            if let Some(previous) = subscriber.take() {
                previous.close();
            }
            *subscriber = Some(self.open_subscriber(generation));
        }

        Ok(transition.to)
    }

    /// Record a new display rect and publish the re-projected overlay.
    pub fn resize(&self, display: DisplayRect) -> Result<Vec<OverlayBox>, SessionError> {
        let mut core = self.lock_core()?;
        let overlay = core.resize(display);
        self.shared.publish(SessionEvent::Overlay(overlay.clone()));
        Ok(overlay)
    }

    fn open_subscriber(&self, generation: u64) -> ReconnectingSubscriber {
        ReconnectingSubscriber::open(
            Arc::clone(&self.shared),
            generation,
            self.relay_url.clone(),
            self.reconnect_delay,
        )
    }

    fn lock_core(&self) -> Result<std::sync::MutexGuard<'_, SessionCore>, SessionError> {
        self.shared
            .core
            .lock()
            .map_err(|_| SessionError::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn session() -> DashboardSession {
        let config = SessionConfig {
            // Nothing listens here; the subscriber just keeps retrying.
            relay_url: "ws://127.0.0.1:9/".to_string(),
            reconnect_delay_ms: 20,
            ..SessionConfig::default()
        };
        DashboardSession::with_time_source(
            config,
            Arc::new(FixedTimeSource::new(datetime!(2024-05-01 00:00:00 UTC))),
        )
    }

    #[tokio::test]
    async fn commands_publish_state_changes() {
        let session = session();
        let mut events = session.subscribe_events();

        assert_eq!(session.start().unwrap(), SessionState::Running);
        assert_eq!(session.toggle_pause().unwrap(), SessionState::Paused);
        assert_eq!(session.reset().unwrap(), SessionState::Ready);

        let mut transitions = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::StateChanged { from, to } = event {
                transitions.push((from, to));
            }
        }
        assert_eq!(
            transitions,
            vec![
                (SessionState::Ready, SessionState::Running),
                (SessionState::Running, SessionState::Paused),
                (SessionState::Paused, SessionState::Ready),
            ]
        );
    }

    #[tokio::test]
    async fn subscriber_lifecycle_follows_commands() {
        let session = session();
        assert!(!session.is_subscribed());

        session.start().unwrap();
        assert!(session.is_subscribed());

        session.reset().unwrap();
        assert!(!session.is_subscribed());
        assert_eq!(
            session.snapshot().unwrap().connection,
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn invalid_command_is_rejected() {
        let session = session();
        let err = session.pause().unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: SessionState::Ready,
                command: SessionCommand::Pause,
            }
        );
        assert_eq!(session.state().unwrap(), SessionState::Ready);
        assert!(!session.is_subscribed());
    }

    #[tokio::test]
    async fn resize_publishes_overlay() {
        let session = session();
        let mut events = session.subscribe_events();
        let overlay = session.resize(DisplayRect::sized(1280.0, 720.0)).unwrap();
        assert!(overlay.is_empty());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Overlay(Vec::new()));
    }

    const ALERT_FRAME: &str =
        r#"{"person":true,"detections":[{"bbox":[10,10,50,50],"cls":"person","conf":0.91}],"ts":1000}"#;

    fn generation(session: &DashboardSession) -> u64 {
        session.shared.generation.load(Ordering::Acquire)
    }

    #[tokio::test]
    async fn superseded_subscriber_is_ignored() {
        let session = session();
        session.start().unwrap();
        let stale = generation(&session);

        session.reset().unwrap();
        let mut events = session.subscribe_events();
        session
            .shared
            .set_connection(stale, ConnectionStatus::Connected);
        assert_eq!(
            session.snapshot().unwrap().connection,
            ConnectionStatus::Disconnected
        );
        assert!(events.try_recv().is_err());

        session.start().unwrap();
        session.shared.dispatch_frame(stale, ALERT_FRAME);
        assert!(session.snapshot().unwrap().entries.is_empty());

        session
            .shared
            .dispatch_frame(generation(&session), ALERT_FRAME);
        assert_eq!(session.snapshot().unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn resume_replaces_subscriber_that_lost_its_connection() {
        let session = session();
        session.start().unwrap();
        let first = generation(&session);
        session
            .shared
            .set_connection(first, ConnectionStatus::Connected);

        session.pause().unwrap();
        session
            .shared
            .set_connection(first, ConnectionStatus::Disconnected);
        session.resume().unwrap();

        assert!(generation(&session) > first);
        assert!(session.is_subscribed());
    }

    #[tokio::test]
    async fn resume_keeps_live_connection() {
        let session = session();
        session.start().unwrap();
        let first = generation(&session);
        session
            .shared
            .set_connection(first, ConnectionStatus::Connected);

        session.pause().unwrap();
        session.resume().unwrap();

        assert_eq!(generation(&session), first);
        assert_eq!(
            session.snapshot().unwrap().connection,
            ConnectionStatus::Connected
        );
    }
}
