//! Run/pause/ready state machine for one dashboard session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Lifecycle of a dashboard session. `Ready` is initial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    #[default]
    Ready,
    Running,
    Paused,
}

impl SessionState {
    /// Resolve the state a command leads to.
    ///
    /// `TogglePause` resolves against the current state first; any pair
    /// missing from the transition table is rejected without side effects.
    pub fn next(self, command: SessionCommand) -> Result<SessionState, SessionError> {
        use SessionCommand::*;
        use SessionState::*;

        match (self, command.resolve(self)) {
            (Ready | Paused, Start) => Ok(Running),
            (Running, Pause) => Ok(Paused),
            (Paused, Resume) => Ok(Running),
            (_, Reset) => Ok(Ready),
            _ => Err(SessionError::InvalidTransition {
                from: self,
                command,
            }),
        }
    }

    pub fn is_running(self) -> bool {
        self == SessionState::Running
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Ready => "READY",
            SessionState::Running => "RUNNING",
            SessionState::Paused => "PAUSED",
        };
        f.write_str(label)
    }
}

/// Commands accepted from the dashboard shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    /// Single pause/resume button: pause when running, resume when paused.
    TogglePause,
    Reset,
}

impl SessionCommand {
    /// Map `TogglePause` onto the concrete command for `state`.
    pub fn resolve(self, state: SessionState) -> SessionCommand {
        match (self, state) {
            (SessionCommand::TogglePause, SessionState::Running) => SessionCommand::Pause,
            (SessionCommand::TogglePause, SessionState::Paused) => SessionCommand::Resume,
            (command, _) => command,
        }
    }
}

impl fmt::Display for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionCommand::Start => "start",
            SessionCommand::Pause => "pause",
            SessionCommand::Resume => "resume",
            SessionCommand::TogglePause => "toggle_pause",
            SessionCommand::Reset => "reset",
        };
        f.write_str(label)
    }
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(SessionCommand::Start),
            "pause" => Ok(SessionCommand::Pause),
            "resume" => Ok(SessionCommand::Resume),
            "toggle" | "toggle_pause" => Ok(SessionCommand::TogglePause),
            "reset" => Ok(SessionCommand::Reset),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}
