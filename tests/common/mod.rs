#![allow(dead_code)]

use chrono::{DateTime, Utc};
use jurisdiction_monitor::{
    error::MonitorError,
    scheduler::{OnceTask, RepeatingTask, Scheduler, TimerHandle},
    transport::{Transport, TransportEvent, TransportHandle, TransportSink},
    types::{EventType, MonitoringEvent, Severity},
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Records every socket the manager opens; tests drive each socket's lifecycle
/// through `emit`.
#[derive(Default)]
pub struct FakeTransport {
    sockets: Mutex<Vec<FakeSocket>>,
}

struct FakeSocket {
    url: Url,
    sink: TransportSink,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

struct FakeHandle {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Transport for FakeTransport {
    fn open(&self, url: &Url, sink: TransportSink) -> Box<dyn TransportHandle> {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        self.sockets.lock().unwrap().push(FakeSocket {
            url: url.clone(),
            sink,
            sent: sent.clone(),
            closed: closed.clone(),
        });
        Box::new(FakeHandle { sent, closed })
    }
}

impl TransportHandle for FakeHandle {
    fn send(&self, payload: &str) -> Result<(), MonitorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MonitorError::NotConnected);
        }
        self.sent.lock().unwrap().push(payload.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl FakeTransport {
    pub fn open_count(&self) -> usize {
        self.sockets.lock().unwrap().len()
    }

    pub fn url(&self, socket: usize) -> Url {
        self.sockets.lock().unwrap()[socket].url.clone()
    }

    /// Deliver `event` as if socket `socket` produced it. The lock is released
    /// first so the manager may open new sockets from inside the callback.
    pub fn emit(&self, socket: usize, event: TransportEvent) {
        let sink = self.sockets.lock().unwrap()[socket].sink.clone();
        sink(event);
    }

    pub fn emit_text(&self, socket: usize, text: impl Into<String>) {
        self.emit(socket, TransportEvent::Message(text.into()));
    }

    /// Connection refused: an error followed by an unclean close.
    pub fn fail(&self, socket: usize) {
        self.emit(socket, TransportEvent::Error("connection refused".into()));
        self.emit(
            socket,
            TransportEvent::Closed {
                code: None,
                clean: false,
            },
        );
    }

    pub fn sent(&self, socket: usize) -> Vec<String> {
        self.sockets.lock().unwrap()[socket].sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self, socket: usize) -> bool {
        self.sockets.lock().unwrap()[socket]
            .closed
            .load(Ordering::SeqCst)
    }
}

enum Task {
    Once(OnceTask),
    Repeating(RepeatingTask, Duration),
}

struct Timer {
    due: Duration,
    seq: u64,
    task: Task,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    seq: u64,
    timers: Vec<Timer>,
}

/// Virtual clock. Nothing fires until `advance` is called.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<Clock>,
}

impl ManualScheduler {
    fn insert(&self, due_in: Duration, task: Task) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.clock.lock().unwrap();
        clock.seq += 1;
        let timer = Timer {
            due: clock.now + due_in,
            seq: clock.seq,
            task,
            cancelled: cancelled.clone(),
        };
        clock.timers.push(timer);
        TimerHandle::new(move || cancelled.store(true, Ordering::SeqCst))
    }

    /// Move time forward, running due timers in order. Tasks run without the
    /// clock locked so they can schedule further timers.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.lock().unwrap().now + by;

        loop {
            let timer = {
                let mut clock = self.clock.lock().unwrap();
                clock.timers.retain(|t| !t.cancelled.load(Ordering::SeqCst));
                let next = clock
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.seq))
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let timer = clock.timers.remove(index);
                        clock.now = timer.due;
                        timer
                    }
                    None => break,
                }
            };

            match timer.task {
                Task::Once(task) => task(),
                Task::Repeating(mut task, period) => {
                    task();
                    if !timer.cancelled.load(Ordering::SeqCst) {
                        let mut clock = self.clock.lock().unwrap();
                        clock.seq += 1;
                        let seq = clock.seq;
                        clock.timers.push(Timer {
                            due: timer.due + period,
                            seq,
                            task: Task::Repeating(task, period),
                            cancelled: timer.cancelled,
                        });
                    }
                }
            }
        }

        self.clock.lock().unwrap().now = target;
    }

    /// Timers armed and not cancelled.
    pub fn pending(&self) -> usize {
        self.clock
            .lock()
            .unwrap()
            .timers
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        self.insert(delay, Task::Once(task))
    }

    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerHandle {
        self.insert(period, Task::Repeating(task, period))
    }
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

pub fn event(id: &str, jurisdiction: &str, severity: Severity) -> MonitoringEvent {
    MonitoringEvent {
        id: id.into(),
        jurisdiction_id: jurisdiction.into(),
        event_type: EventType::RateChange,
        severity,
        title: format!("Event {id}"),
        summary: String::new(),
        source_url: None,
        detected_at: at("2026-05-01T12:00:00Z"),
        read_at: None,
        created_at: None,
        updated_at: None,
        metadata: None,
    }
}

pub fn event_frame(event: &MonitoringEvent) -> String {
    json!({ "type": "monitoring_event", "event": event }).to_string()
}
