// file: src/transport.rs
// description: single-attempt push socket wrapper; lifecycle is reported through a sink
// reference: https://docs.rs/tokio-tungstenite/latest/tokio_tungstenite/

use crate::error::MonitorError;
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};
use url::Url;

/// Lifecycle and traffic of one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    /// Always the last event of a socket. `clean` is true when a close frame
    /// was exchanged.
    Closed { code: Option<u16>, clean: bool },
}

pub type TransportSink = Arc<dyn Fn(TransportEvent) + Send + Sync + 'static>;

/// Opens push sockets. One call, one attempt: retrying is the manager's job.
///
/// `open` returns immediately and must never invoke `sink` before returning.
pub trait Transport: Send + Sync {
    fn open(&self, url: &Url, sink: TransportSink) -> Box<dyn TransportHandle>;
}

pub trait TransportHandle: Send {
    fn send(&self, payload: &str) -> Result<(), MonitorError>;

    /// Close the socket. Idempotent.
    fn close(&mut self);
}

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// WebSocket transport over `tokio-tungstenite`, one task per socket.
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    runtime: Handle,
    connect_timeout: Duration,
}

impl TungsteniteTransport {
    pub fn new(runtime: Handle, connect_timeout: Duration) -> Self {
        Self {
            runtime,
            connect_timeout,
        }
    }

    pub fn current(connect_timeout: Duration) -> Result<Self, MonitorError> {
        let runtime = Handle::try_current().map_err(|e| MonitorError::NoRuntime(e.to_string()))?;
        Ok(Self::new(runtime, connect_timeout))
    }
}

impl Transport for TungsteniteTransport {
    fn open(&self, url: &Url, sink: TransportSink) -> Box<dyn TransportHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.runtime
            .spawn(run_socket(url.clone(), self.connect_timeout, sink, rx));
        Box::new(TungsteniteHandle { tx, closed: false })
    }
}

struct TungsteniteHandle {
    tx: mpsc::UnboundedSender<Outbound>,
    closed: bool,
}

impl TransportHandle for TungsteniteHandle {
    fn send(&self, payload: &str) -> Result<(), MonitorError> {
        if self.closed {
            return Err(MonitorError::NotConnected);
        }
        self.tx
            .send(Outbound::Text(payload.to_string()))
            .map_err(|_| MonitorError::NotConnected)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.tx.send(Outbound::Close);
        }
    }
}

async fn run_socket(
    url: Url,
    connect_timeout: Duration,
    sink: TransportSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let fail = |error: MonitorError| {
        sink(TransportEvent::Error(error.to_string()));
        sink(TransportEvent::Closed {
            code: None,
            clean: false,
        });
    };

    debug!(url = %redact(&url), "Opening push socket");

    let connected = tokio::select! {
        result = timeout(connect_timeout, connect_async(url.as_str())) => result,
        // Handle closed or dropped before the handshake finished.
        _ = outbound.recv() => {
            debug!("Push socket closed while connecting");
            return;
        }
    };

    let ws_stream = match connected {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => return fail(e.into()),
        Err(_) => {
            return fail(
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {connect_timeout:?}"),
                )
                .into(),
            );
        }
    };

    sink(TransportEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        return fail(e.into());
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    sink(TransportEvent::Closed { code: Some(1000), clean: true });
                    return;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    trace!("Received text frame: {}", text.as_str());
                    sink(TransportEvent::Message(text.as_str().to_string()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.as_ref().map(|f| u16::from(f.code));
                    debug!(?code, "Received close frame");
                    sink(TransportEvent::Closed { code, clean: true });
                    return;
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!("Ignoring binary frame of {} bytes", data.len());
                }
                Some(Ok(_)) => {
                    // ping/pong are answered by tungstenite
                }
                Some(Err(e)) => return fail(e.into()),
                None => {
                    sink(TransportEvent::Closed { code: None, clean: false });
                    return;
                }
            },
        }
    }
}

/// URL with the auth token query parameter masked, for logs.
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(key, _)| key == "token") {
        return url.to_string();
    }

    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "token" { "***".to_string() } else { value.into_owned() };
            (key.into_owned(), value)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
