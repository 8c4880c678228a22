// Session lifecycle state machine
//
// Every lifecycle change in the live session flows through the single
// `transition` function below, so the whole lifecycle is auditable in
// one place and testable without a transport.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session activity
    Idle,
    /// Connect and handshake in flight
    Requesting,
    /// Session established, chunks may be sent
    Open,
    /// Caller asked for close, teardown in progress
    Closing,
    /// Session fully torn down (terminal)
    Closed,
    /// Session ended with an error (terminal)
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl SessionState {
    /// Terminal states admit no further lifecycle activity
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// Lifecycle events that drive state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Caller asked to open the session
    OpenRequested,
    /// Remote acknowledged the session setup
    OpenAcknowledged,
    /// Connect or handshake failed
    ConnectFailed,
    /// Caller asked to close the session
    CloseRequested,
    /// Transport error while the session was live
    TransportFailed,
    /// Local teardown finished (socket closed, device released)
    TeardownComplete,
}

/// Apply one lifecycle event to a state
///
/// Pure function: unlisted (state, event) pairs keep the current state.
/// Late transport events after a terminal state are expected and must
/// not resurrect the session.
pub fn transition(state: SessionState, event: SessionEvent) -> SessionState {
    use SessionEvent::*;
    use SessionState::*;

    match (state, event) {
        (Idle, OpenRequested) => Requesting,
        (Requesting, OpenAcknowledged) => Open,
        (Requesting, ConnectFailed) => Failed,
        (Requesting, CloseRequested) => Closing,
        (Open, CloseRequested) => Closing,
        (Open, TransportFailed) => Failed,
        (Closing, TeardownComplete) => Closed,
        (Failed, TeardownComplete) => Closed,
        (state, _) => state,
    }
}
