// file: src/hydrate.rs
// description: loads REST history into the event store and confirms optimistic mark-read

use crate::{
    api::HttpEventsApi,
    error::MonitorError,
    monitoring::UNREAD_GAUGE,
    store::{MarkRead, SharedEventStore, lock_store},
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrateReport {
    /// Events fetched in the page.
    pub fetched: usize,
    /// Events inserted or replaced by the merge.
    pub changed: usize,
    /// Whether the server's unread count was applied.
    pub authoritative_unread: bool,
    pub unread: u64,
}

/// Fetch one history page and the unread count, and merge both into the store.
///
/// The page is required; a failed unread-count fetch only degrades the store
/// to its locally derived count.
pub async fn hydrate(
    store: &SharedEventStore,
    api: &HttpEventsApi,
    page_size: u32,
) -> Result<HydrateReport, MonitorError> {
    let (page, unread) = tokio::join!(api.fetch_page(page_size), api.fetch_unread_count());
    let events = page?;
    let fetched = events.len();

    let mut store = lock_store(store);
    let changed = store.load_page(events);
    let authoritative_unread = match unread {
        Ok(count) => {
            store.set_unread_count(count);
            true
        }
        Err(e) => {
            warn!("Unread count unavailable, using local count: {}", e);
            store.clear_unread_count();
            false
        }
    };
    let unread = store.unread_count();
    UNREAD_GAUGE.set(unread as f64);

    debug!(fetched, changed, unread, "Hydrated event store");
    Ok(HydrateReport {
        fetched,
        changed,
        authoritative_unread,
        unread,
    })
}

/// Re-hydrate every `period` so events missed by the push channel show up.
pub fn spawn_refresh(
    store: SharedEventStore,
    api: HttpEventsApi,
    period: Duration,
    page_size: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial load is done by the caller.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match hydrate(&store, &api, page_size).await {
                Ok(report) => debug!(changed = report.changed, "Periodic refresh complete"),
                Err(e) => warn!("Periodic refresh failed: {}", e),
            }
        }
    })
}

/// Mark an event read locally, confirm with the server, and roll the local
/// change back if the server refuses.
pub async fn mark_read_confirmed(
    store: &SharedEventStore,
    api: &HttpEventsApi,
    id: &str,
) -> Result<MarkRead, MonitorError> {
    let outcome = lock_store(store).mark_read(id);

    let read_at = match outcome {
        MarkRead::Marked { read_at } => read_at,
        MarkRead::AlreadyRead { .. } => return Ok(outcome),
        MarkRead::Unknown => {
            return Err(MonitorError::UnknownEvent { id: id.to_string() });
        }
    };

    match api.mark_read(id).await {
        Ok(()) => {
            info!(%id, "Event marked read");
            UNREAD_GAUGE.set(lock_store(store).unread_count() as f64);
            Ok(outcome)
        }
        Err(e) => {
            let reverted = lock_store(store).rollback_read(id, read_at);
            warn!(%id, reverted, "Mark-read rejected by server, reverted: {}", e);
            Err(e)
        }
    }
}
