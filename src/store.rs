//! Canonical in-memory view of monitoring events.
//!
//! Events reach the store from three directions that race freely: history
//! pages, the unread-count endpoint and live pushes. Every insert goes
//! through one merge rule so the outcome does not depend on arrival order:
//!
//! * an id is stored at most once;
//! * the stored copy is replaced unless it carries a strictly later
//!   `updatedAt` than the incoming one;
//! * a local `readAt` survives a replacement unless `updatedAt` advanced.

use crate::types::{MonitoringEvent, Severity};
use chrono::{DateTime, Utc};
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

pub type SharedEventStore = Arc<Mutex<EventStore>>;

/// Lock a shared store, recovering from a poisoned mutex.
pub fn lock_store(store: &SharedEventStore) -> MutexGuard<'_, EventStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of merging one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
    /// The stored copy is newer; the incoming one was discarded.
    Kept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkRead {
    Marked { read_at: DateTime<Utc> },
    AlreadyRead { read_at: DateTime<Utc> },
    Unknown,
}

/// Where the unread counter comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnreadCount {
    /// Counted from the events held locally.
    #[default]
    Derived,
    /// Last value reported by the server.
    Authoritative(u64),
}

/// Selection applied before ranking in [`EventStore::list_top`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Empty means every jurisdiction.
    pub jurisdictions: Vec<String>,
    /// Empty means every severity.
    pub severities: Vec<Severity>,
    pub unread_only: bool,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn unread() -> Self {
        Self {
            unread_only: true,
            ..Self::default()
        }
    }

    pub fn with_jurisdictions<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jurisdictions = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.severities = severities.into_iter().collect();
        self
    }

    pub fn matches(&self, event: &MonitoringEvent) -> bool {
        (self.jurisdictions.is_empty() || self.jurisdictions.contains(&event.jurisdiction_id))
            && (self.severities.is_empty() || self.severities.contains(&event.severity))
            && (!self.unread_only || event.is_unread())
    }
}

#[derive(Debug, Clone)]
struct StoredEvent {
    event: MonitoringEvent,
    /// Order of first insertion, the final ranking tiebreak.
    seq: u64,
}

#[derive(Debug, Default)]
pub struct EventStore {
    events: HashMap<String, StoredEvent>,
    next_seq: u64,
    unread: UnreadCount,
    capacity: Option<usize>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that evicts the oldest `detectedAt` once it holds `capacity` events.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn shared(capacity: Option<usize>) -> SharedEventStore {
        let store = match capacity {
            Some(capacity) => Self::with_capacity_limit(capacity),
            None => Self::new(),
        };
        Arc::new(Mutex::new(store))
    }

    /// Merge a fetched history page.
    pub fn load_page(&mut self, events: impl IntoIterator<Item = MonitoringEvent>) -> usize {
        let mut changed = 0;
        for event in events {
            if self.merge(event) != Upsert::Kept {
                changed += 1;
            }
        }
        debug!(changed, total = self.events.len(), "Loaded event page");
        changed
    }

    /// Record the server's unread count; it takes precedence over the local count.
    pub fn set_unread_count(&mut self, count: u64) {
        self.unread = UnreadCount::Authoritative(count);
    }

    /// Forget the server's count and fall back to counting locally.
    pub fn clear_unread_count(&mut self) {
        self.unread = UnreadCount::Derived;
    }

    /// Merge one pushed event.
    ///
    /// A new unread event raises the derived count by one. An authoritative
    /// count is left alone: the server may filter events this client cannot
    /// see, so it is refreshed by the next fetch instead.
    pub fn append_live(&mut self, event: MonitoringEvent) -> Upsert {
        self.merge(event)
    }

    /// Optimistically mark an event read now.
    pub fn mark_read(&mut self, id: &str) -> MarkRead {
        self.mark_read_at(id, Utc::now())
    }

    pub fn mark_read_at(&mut self, id: &str, at: DateTime<Utc>) -> MarkRead {
        let Some(stored) = self.events.get_mut(id) else {
            return MarkRead::Unknown;
        };
        if let Some(read_at) = stored.event.read_at {
            return MarkRead::AlreadyRead { read_at };
        }

        stored.event.read_at = Some(at);
        if let UnreadCount::Authoritative(count) = &mut self.unread {
            *count = count.saturating_sub(1);
        }
        MarkRead::Marked { read_at: at }
    }

    /// Undo an optimistic mark-read whose server call failed. Only reverts if
    /// the event still carries the timestamp set by that call.
    pub fn rollback_read(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        let Some(stored) = self.events.get_mut(id) else {
            return false;
        };
        if stored.event.read_at != Some(at) {
            return false;
        }

        stored.event.read_at = None;
        if let UnreadCount::Authoritative(count) = &mut self.unread {
            *count += 1;
        }
        true
    }

    pub fn unread_count(&self) -> u64 {
        match self.unread {
            UnreadCount::Authoritative(count) => count,
            UnreadCount::Derived => self.derived_unread_count(),
        }
    }

    pub fn derived_unread_count(&self) -> u64 {
        self.events.values().filter(|s| s.event.is_unread()).count() as u64
    }

    pub fn unread_source(&self) -> UnreadCount {
        self.unread
    }

    pub fn get(&self, id: &str) -> Option<&MonitoringEvent> {
        self.events.get(id).map(|s| &s.event)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Top `n` matching events: critical before warning before info, unread
    /// before read, newest `detectedAt` first, then first-seen order.
    pub fn list_top(&self, n: usize, filter: &EventFilter) -> Vec<MonitoringEvent> {
        let mut matching: Vec<&StoredEvent> = self
            .events
            .values()
            .filter(|s| filter.matches(&s.event))
            .collect();
        matching.sort_by(|a, b| rank_order(a, b));
        matching.into_iter().take(n).map(|s| s.event.clone()).collect()
    }

    /// Every event, newest `detectedAt` first.
    pub fn feed(&self) -> Vec<MonitoringEvent> {
        let mut all: Vec<&StoredEvent> = self.events.values().collect();
        all.sort_by_key(|s| (Reverse(s.event.detected_at), s.seq));
        all.into_iter().map(|s| s.event.clone()).collect()
    }

    fn merge(&mut self, incoming: MonitoringEvent) -> Upsert {
        let Some(stored) = self.events.get_mut(&incoming.id) else {
            self.insert(incoming);
            return Upsert::Inserted;
        };

        if let (Some(current), Some(candidate)) = (stored.event.updated_at, incoming.updated_at)
            && current > candidate
        {
            trace!(id = %incoming.id, "Discarding stale copy");
            return Upsert::Kept;
        }

        let advanced = matches!(
            (stored.event.updated_at, incoming.updated_at),
            (Some(current), Some(candidate)) if candidate > current
        );
        let local_read = stored.event.read_at;

        stored.event = incoming;
        if !advanced && stored.event.read_at.is_none() {
            stored.event.read_at = local_read;
        }
        Upsert::Replaced
    }

    fn insert(&mut self, event: MonitoringEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.insert(event.id.clone(), StoredEvent { event, seq });
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        while self.events.len() > capacity {
            let oldest = self
                .events
                .values()
                .min_by_key(|s| (s.event.detected_at, s.seq))
                .map(|s| s.event.id.clone());
            match oldest {
                Some(id) => {
                    debug!(%id, "Evicting oldest event");
                    self.events.remove(&id);
                }
                None => break,
            }
        }
    }
}

fn rank_order(a: &StoredEvent, b: &StoredEvent) -> Ordering {
    a.event
        .severity
        .rank()
        .cmp(&b.event.severity.rank())
        .then_with(|| a.event.is_read().cmp(&b.event.is_read()))
        .then_with(|| b.event.detected_at.cmp(&a.event.detected_at))
        .then_with(|| a.seq.cmp(&b.seq))
}
