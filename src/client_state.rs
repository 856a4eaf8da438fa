/// file: src/client_state.rs
/// description: connection state machine values and per-manager session bookkeeping
use crate::{scheduler::TimerHandle, transport::TransportHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Observable state of the push connection. Only the connection manager
/// changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// True while a socket is opening or open.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional scoping of the push subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub jurisdiction_ids: Vec<String>,
}

impl SubscriptionFilter {
    pub fn jurisdictions<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            jurisdiction_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.jurisdiction_ids.is_empty()
    }
}

/// Mutable state behind the manager's lock.
///
/// `generation` increases on every socket open and on explicit disconnect;
/// callbacks captured with an older generation are ignored.
pub(crate) struct SessionState {
    pub state: ConnectionState,
    pub generation: u64,
    pub attempt: u32,
    pub exhausted: bool,
    pub saw_error: bool,
    pub connection_id: Option<String>,
    pub filter: Option<SubscriptionFilter>,
    pub handle: Option<Box<dyn TransportHandle>>,
    pub heartbeat: Option<TimerHandle>,
    pub reconnect_timer: Option<TimerHandle>,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub total_messages_received: u64,
    pub parse_errors: u64,
    pub reconnect_count: u64,
    /// Transitions not yet delivered to status listeners, oldest first.
    pub pending_statuses: VecDeque<ConnectionState>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            attempt: 0,
            exhausted: false,
            saw_error: false,
            connection_id: None,
            filter: None,
            handle: None,
            heartbeat: None,
            reconnect_timer: None,
            connected_since: None,
            last_message_time: None,
            total_messages_received: 0,
            parse_errors: 0,
            reconnect_count: 0,
            pending_statuses: VecDeque::new(),
        }
    }
}

impl SessionState {
    /// Move to `connecting` for a fresh socket and return its generation.
    pub fn begin_session(&mut self) -> u64 {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.saw_error = false;
        self.connection_id = Some(uuid::Uuid::new_v4().to_string());
        self.reconnect_timer = None;
        self.generation
    }

    pub fn mark_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempt = 0;
        self.exhausted = false;
        self.connected_since = Some(Utc::now());
    }

    /// Drop the socket and its heartbeat after the transport reported a close.
    pub fn mark_closed(&mut self) -> ConnectionState {
        self.heartbeat = None;
        self.handle = None;
        self.connected_since = None;
        self.state = if self.saw_error {
            ConnectionState::Error
        } else {
            ConnectionState::Disconnected
        };
        self.state
    }

    /// Explicit shutdown: invalidate callbacks, cancel timers, close the socket.
    pub fn shutdown(&mut self) -> ConnectionState {
        let previous = self.state;
        self.generation += 1;
        self.heartbeat = None;
        self.reconnect_timer = None;
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.state = ConnectionState::Disconnected;
        self.attempt = 0;
        self.exhausted = false;
        self.connected_since = None;
        previous
    }

    /// Queue a transition for status listeners. Called under the manager's
    /// lock so the queue order is the transition order.
    pub fn announce(&mut self, state: ConnectionState) {
        self.pending_statuses.push_back(state);
    }

    pub fn record_message(&mut self) {
        self.last_message_time = Some(Utc::now());
        self.total_messages_received += 1;
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_session_bumps_generation_and_resets_error() {
        let mut session = SessionState::default();
        session.saw_error = true;

        let first = session.begin_session();
        let second = session.begin_session();

        assert_eq!(second, first + 1);
        assert_eq!(session.state, ConnectionState::Connecting);
        assert!(!session.saw_error);
        assert!(session.connection_id.is_some());
    }

    #[test]
    fn close_after_error_lands_in_error_state() {
        let mut session = SessionState::default();
        session.begin_session();
        session.mark_connected();
        session.saw_error = true;

        assert_eq!(session.mark_closed(), ConnectionState::Error);
    }

    #[test]
    fn shutdown_invalidates_generation() {
        let mut session = SessionState::default();
        let generation = session.begin_session();
        session.attempt = 3;

        let previous = session.shutdown();

        assert_eq!(previous, ConnectionState::Connecting);
        assert!(!session.is_current(generation));
        assert_eq!(session.state, ConnectionState::Disconnected);
        assert_eq!(session.attempt, 0);
    }

    #[test]
    fn shutdown_clears_exhaustion() {
        let mut session = SessionState::default();
        session.begin_session();
        session.exhausted = true;
        session.state = ConnectionState::Disconnected;

        session.shutdown();

        assert!(!session.exhausted);
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConnectionState::Connected).unwrap(),
            "\"connected\""
        );
        assert!(ConnectionState::Connecting.is_active());
        assert!(!ConnectionState::Error.is_active());
    }
}
