// file: src/client.rs
// description: push connection manager: lifecycle, heartbeat, backoff reconnection and fan-out

use crate::{
    backoff::{ReconnectDecision, apply_jitter},
    client_state::{ConnectionState, SessionState, SubscriptionFilter},
    config::ConnectionConfig,
    error::MonitorError,
    listeners::{ListenerRegistry, Subscription},
    monitoring::{
        CONNECTED_GAUGE, FRAMES_RECEIVED_COUNTER, HealthStatus, PARSE_ERROR_COUNTER,
        RECONNECT_COUNTER,
    },
    scheduler::{Scheduler, TimerHandle},
    transport::{Transport, TransportEvent, TransportSink, redact},
    types::{PushMessage, parse_frame},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Owns one logical push connection.
///
/// Cloning is cheap and every clone drives the same connection. Listeners
/// receive parsed messages and state transitions; they run outside the
/// manager's lock and may call back into the manager. Status listeners see
/// transitions in the order they happened, even when a listener causes a
/// new one.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    session: Mutex<SessionState>,
    messages: ListenerRegistry<PushMessage>,
    statuses: ListenerRegistry<ConnectionState>,
    /// Set while one caller drains `pending_statuses`.
    dispatching: AtomicBool,
}

/// A socket to open once the lock is released.
struct PendingOpen {
    generation: u64,
    url: url::Url,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                transport,
                scheduler,
                session: Mutex::new(SessionState::default()),
                messages: ListenerRegistry::new("messages"),
                statuses: ListenerRegistry::new("status"),
                dispatching: AtomicBool::new(false),
            }),
        }
    }

    /// Open the push connection. A no-op while already connecting or connected.
    ///
    /// Cancels a pending backoff timer and connects right away. After the
    /// retry budget was exhausted this restores it.
    pub fn connect(&self, filter: Option<SubscriptionFilter>) {
        let pending = {
            let mut session = self.inner.lock();
            if session.state.is_active() {
                debug!(state = %session.state, "connect() ignored, connection already active");
                return;
            }
            if session.exhausted {
                session.exhausted = false;
                session.attempt = 0;
            }
            session.filter = filter;
            self.inner.prepare_open(&mut session)
        };

        self.inner.open(pending);
    }

    /// Close the connection and stop all timers. No reconnection happens until
    /// the next `connect`.
    pub fn disconnect(&self) {
        let previous = {
            let mut session = self.inner.lock();
            let previous = session.shutdown();
            if previous != ConnectionState::Disconnected {
                session.announce(ConnectionState::Disconnected);
            }
            previous
        };
        CONNECTED_GAUGE.set(0.0);

        info!(from = %previous, "Push connection disconnected");
        self.inner.drain_statuses();
    }

    /// Send a frame on the open socket. Dropped with a warning unless connected.
    pub fn send(&self, payload: &str) -> Result<(), MonitorError> {
        self.inner.send(payload)
    }

    pub fn add_message_listener(
        &self,
        listener: impl Fn(&PushMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.messages.add(listener)
    }

    /// Register a status listener. It is called immediately with the current
    /// state, then on every transition.
    pub fn add_status_listener(
        &self,
        listener: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        let subscription = self.inner.statuses.add(listener);
        let current = self.state();
        self.inner.statuses.deliver_to(&subscription, &current);
        subscription
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// True once the reconnection policy gave up; cleared by `connect`.
    pub fn is_exhausted(&self) -> bool {
        self.inner.lock().exhausted
    }

    /// Consecutive failures since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.inner.lock().attempt
    }

    pub fn health(&self) -> HealthStatus {
        let session = self.inner.lock();
        HealthStatus {
            state: session.state,
            exhausted: session.exhausted,
            attempt: session.attempt,
            connection_id: session.connection_id.clone(),
            connected_since: session.connected_since,
            last_message_time: session.last_message_time,
            total_messages: session.total_messages_received,
            parse_errors: session.parse_errors,
            reconnect_count: session.reconnect_count,
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &redact(&self.inner.config.url))
            .field("state", &self.state())
            .finish()
    }
}

impl ManagerInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prepare_open(&self, session: &mut SessionState) -> PendingOpen {
        let generation = session.begin_session();
        session.announce(ConnectionState::Connecting);
        let url = self.config.endpoint(session.filter.as_ref());
        PendingOpen { generation, url }
    }

    /// Announce `connecting` and open the socket. Called without the lock.
    fn open(self: &Arc<Self>, pending: PendingOpen) {
        let PendingOpen { generation, url } = pending;

        info!(url = %redact(&url), generation, "Connecting push socket");
        self.drain_statuses();

        let weak = Arc::downgrade(self);
        let sink: TransportSink = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_transport_event(generation, event);
            }
        });
        let mut handle = self.transport.open(&url, sink);

        let mut session = self.lock();
        if session.is_current(generation) {
            session.handle = Some(handle);
        } else {
            drop(session);
            debug!(generation, "Session superseded while opening, closing socket");
            handle.close();
        }
    }

    fn send(&self, payload: &str) -> Result<(), MonitorError> {
        let session = self.lock();
        match (&session.state, &session.handle) {
            (ConnectionState::Connected, Some(handle)) => handle.send(payload),
            (state, _) => {
                warn!(%state, "Dropping outbound message, not connected");
                Err(MonitorError::NotConnected)
            }
        }
    }

    fn on_transport_event(self: &Arc<Self>, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_opened(generation),
            TransportEvent::Message(raw) => self.on_message(generation, &raw),
            TransportEvent::Error(reason) => {
                let mut session = self.lock();
                if session.is_current(generation) {
                    session.saw_error = true;
                    warn!(generation, %reason, "Push transport error");
                }
            }
            TransportEvent::Closed { code, clean } => self.on_closed(generation, code, clean),
        }
    }

    fn on_opened(self: &Arc<Self>, generation: u64) {
        {
            let mut session = self.lock();
            if !session.is_current(generation) || session.state != ConnectionState::Connecting {
                trace!(generation, "Ignoring open from stale session");
                return;
            }
            session.mark_connected();
            session.announce(ConnectionState::Connected);
            session.heartbeat = Some(self.start_heartbeat(generation));
            info!(
                connection_id = session.connection_id.as_deref().unwrap_or("-"),
                "Push connection established"
            );
        }

        CONNECTED_GAUGE.set(1.0);
        self.drain_statuses();
    }

    fn on_message(&self, generation: u64, raw: &str) {
        {
            let mut session = self.lock();
            if !session.is_current(generation) || session.state != ConnectionState::Connected {
                trace!(generation, "Ignoring frame from stale session");
                return;
            }
            session.record_message();
        }
        FRAMES_RECEIVED_COUNTER.increment(1);

        match parse_frame(raw) {
            Ok(PushMessage::Unknown) => {
                debug!(
                    "Dropping frame with unknown type: {}",
                    raw.chars().take(100).collect::<String>()
                );
            }
            Ok(message) => {
                trace!(kind = message.kind(), "Dispatching push message");
                self.messages.dispatch(&message);
            }
            Err(e) => {
                PARSE_ERROR_COUNTER.increment(1);
                self.lock().parse_errors += 1;
                warn!(
                    "Failed to parse push frame: {}. Frame: {}",
                    e,
                    raw.chars().take(100).collect::<String>()
                );
            }
        }
    }

    fn on_closed(self: &Arc<Self>, generation: u64, code: Option<u16>, clean: bool) {
        {
            let mut session = self.lock();
            if !session.is_current(generation) || !session.state.is_active() {
                trace!(generation, "Ignoring close from stale session");
                return;
            }

            if !clean {
                session.saw_error = true;
            }
            let closed_state = session.mark_closed();
            session.announce(closed_state);

            match self.config.reconnect.decide(session.attempt) {
                ReconnectDecision::Retry(delay) => {
                    let delay = apply_jitter(delay, self.config.jitter);
                    session.attempt += 1;
                    session.reconnect_count += 1;
                    warn!(
                        ?code,
                        clean,
                        attempt = session.attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Push connection lost, reconnecting"
                    );
                    session.reconnect_timer = Some(self.schedule_reconnect(generation, delay));
                }
                ReconnectDecision::GiveUp => {
                    session.exhausted = true;
                    session.state = ConnectionState::Disconnected;
                    error!(
                        attempts = session.attempt,
                        "Maximum reconnection attempts reached, giving up"
                    );
                    if closed_state != ConnectionState::Disconnected {
                        session.announce(ConnectionState::Disconnected);
                    }
                }
            }
        }

        CONNECTED_GAUGE.set(0.0);
        self.drain_statuses();
    }

    /// Deliver queued transitions in order. Only one caller drains at a time;
    /// a transition queued by a listener (or another thread) mid-drain is
    /// delivered by the drainer after the current one reaches every listener.
    fn drain_statuses(&self) {
        loop {
            if self
                .dispatching
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            loop {
                let next = self.lock().pending_statuses.pop_front();
                let Some(state) = next else { break };
                self.statuses.dispatch(&state);
            }

            self.dispatching.store(false, Ordering::Release);
            // A transition queued between the last pop and the release has no drainer yet.
            if self.lock().pending_statuses.is_empty() {
                return;
            }
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64, delay: Duration) -> TimerHandle {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.scheduler.schedule_once(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_reconnect_due(generation);
                }
            }),
        )
    }

    fn on_reconnect_due(self: &Arc<Self>, generation: u64) {
        let pending = {
            let mut session = self.lock();
            if !session.is_current(generation) || session.state.is_active() || session.exhausted {
                debug!(generation, "Stale reconnect timer ignored");
                return;
            }
            RECONNECT_COUNTER.increment(1);
            self.prepare_open(&mut session)
        };

        self.open(pending);
    }

    fn start_heartbeat(self: &Arc<Self>, generation: u64) -> TimerHandle {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.scheduler.schedule_repeating(
            self.config.heartbeat_interval,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else { return };
                if !inner.lock().is_current(generation) {
                    return;
                }
                if let Err(e) = inner.send(&inner.config.heartbeat_payload) {
                    debug!("Heartbeat not sent: {}", e);
                }
            }),
        )
    }
}
