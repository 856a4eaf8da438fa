/// file: src/events.rs
/// description: Event system to decouple the pipeline from UI presentation
use crate::{
    client_state::ConnectionState, hydrate::HydrateReport, store::Upsert, types::MonitoringEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum DashboardEvent {
    Status(ConnectionState),
    Subscribed {
        status: String,
        subscriptions: usize,
    },
    LiveEvent {
        event: Arc<MonitoringEvent>,
        outcome: Upsert,
        notified: bool,
    },
    Hydrated(HydrateReport),
    HydrateFailed(String),
    MarkReadFailed {
        id: String,
        reason: String,
    },
    Stopping,
}

// Listener callbacks use try_send; a full channel drops display updates,
// never store updates.
const EVENT_CHANNEL_CAPACITY: usize = 1_024;

pub type EventSender = mpsc::Sender<DashboardEvent>;
pub type EventReceiver = mpsc::Receiver<DashboardEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}
