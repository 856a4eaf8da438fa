// file: src/pipeline.rs
// description: wires push messages into the event store, alerts and the UI channel

use crate::{
    client::ConnectionManager,
    events::{DashboardEvent, EventSender},
    listeners::Subscription,
    monitoring::{EVENTS_RECEIVED_COUNTER, UNREAD_GAUGE},
    notify::{Notifier, should_notify},
    store::{SharedEventStore, Upsert, lock_store},
    types::PushMessage,
};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

/// Live half of the dashboard: every `monitoring_event` frame is merged into
/// the store before anything else sees it.
///
/// Detaching (or dropping the manager) stops delivery; the store keeps what it
/// already holds.
#[derive(Debug)]
pub struct LivePipeline {
    messages: Subscription,
    statuses: Subscription,
}

impl LivePipeline {
    pub fn attach(
        manager: &ConnectionManager,
        store: SharedEventStore,
        notifier: Arc<dyn Notifier>,
        ui: Option<EventSender>,
    ) -> Self {
        let message_ui = ui.clone();
        let messages = manager.add_message_listener(move |message| {
            handle_message(message, &store, notifier.as_ref(), message_ui.as_ref());
        });

        let statuses = manager.add_status_listener(move |state| {
            forward(ui.as_ref(), DashboardEvent::Status(*state));
        });

        Self { messages, statuses }
    }

    pub fn detach(&self) {
        self.messages.unsubscribe();
        self.statuses.unsubscribe();
    }
}

fn handle_message(
    message: &PushMessage,
    store: &SharedEventStore,
    notifier: &dyn Notifier,
    ui: Option<&EventSender>,
) {
    match message {
        PushMessage::MonitoringEvent { event } => {
            EVENTS_RECEIVED_COUNTER.increment(1);

            let (outcome, unread) = {
                let mut store = lock_store(store);
                let outcome = store.append_live(event.clone());
                (outcome, store.unread_count())
            };
            UNREAD_GAUGE.set(unread as f64);
            debug!(id = %event.id, ?outcome, unread, "Live event merged");

            // Updates to an event already shown do not alert twice.
            let notified = outcome == Upsert::Inserted && should_notify(event);
            if notified {
                notifier.notify(event);
            }

            forward(
                ui,
                DashboardEvent::LiveEvent {
                    event: Arc::new(event.clone()),
                    outcome,
                    notified,
                },
            );
        }
        PushMessage::Connection {
            status,
            subscriptions,
        } => {
            debug!(%status, subscriptions = subscriptions.len(), "Subscription acknowledged");
            forward(
                ui,
                DashboardEvent::Subscribed {
                    status: status.clone(),
                    subscriptions: subscriptions.len(),
                },
            );
        }
        PushMessage::Pong => trace!("Heartbeat acknowledged"),
        PushMessage::Unknown => {}
    }
}

fn forward(ui: Option<&EventSender>, event: DashboardEvent) {
    let Some(ui) = ui else { return };
    match ui.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => debug!("UI channel full, dropping display update"),
        Err(TrySendError::Closed(_)) => trace!("UI channel closed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EventStore;
    use crate::types::{EventType, MonitoringEvent, Severity};
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: &MonitoringEvent) {
            self.seen.lock().unwrap().push(event.id.clone());
        }
    }

    fn event(id: &str, severity: Severity) -> MonitoringEvent {
        MonitoringEvent {
            id: id.into(),
            jurisdiction_id: "us-ca".into(),
            event_type: EventType::RateChange,
            severity,
            title: "Rate change".into(),
            summary: String::new(),
            source_url: None,
            detected_at: Utc::now(),
            read_at: None,
            created_at: None,
            updated_at: None,
            metadata: None,
        }
    }

    #[test]
    fn critical_insert_notifies_once() {
        let store = EventStore::shared(None);
        let notifier = RecordingNotifier::default();
        let message = PushMessage::MonitoringEvent {
            event: event("e1", Severity::Critical),
        };

        handle_message(&message, &store, &notifier, None);
        handle_message(&message, &store, &notifier, None);

        assert_eq!(*notifier.seen.lock().unwrap(), vec!["e1".to_string()]);
        assert_eq!(lock_store(&store).len(), 1);
        assert_eq!(lock_store(&store).unread_count(), 1);
    }

    #[test]
    fn warnings_are_stored_without_alert() {
        let store = EventStore::shared(None);
        let notifier = RecordingNotifier::default();
        let message = PushMessage::MonitoringEvent {
            event: event("e2", Severity::Warning),
        };

        handle_message(&message, &store, &notifier, None);

        assert!(notifier.seen.lock().unwrap().is_empty());
        assert!(lock_store(&store).get("e2").is_some());
    }

    #[tokio::test]
    async fn ui_receives_live_event_and_ack() {
        let store = EventStore::shared(None);
        let notifier = RecordingNotifier::default();
        let (tx, mut rx) = crate::events::create_event_channel();

        let ack = PushMessage::Connection {
            status: "connected".into(),
            subscriptions: vec![serde_json::json!("us-ca")],
        };
        handle_message(&ack, &store, &notifier, Some(&tx));
        handle_message(
            &PushMessage::MonitoringEvent {
                event: event("e3", Severity::Info),
            },
            &store,
            &notifier,
            Some(&tx),
        );

        match rx.recv().await {
            Some(DashboardEvent::Subscribed { subscriptions, .. }) => assert_eq!(subscriptions, 1),
            other => panic!("unexpected: {other:?}"),
        }
        match rx.recv().await {
            Some(DashboardEvent::LiveEvent {
                event,
                outcome,
                notified,
            }) => {
                assert_eq!(event.id, "e3");
                assert_eq!(outcome, Upsert::Inserted);
                assert!(!notified);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
