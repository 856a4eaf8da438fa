#![doc = include_str!("../docs/rustdoc.md")]

/// REST client for event history, unread count and mark-read.
pub mod api;
/// Exponential reconnection policy.
pub mod backoff;
/// Command-line argument definitions.
pub mod cli;
/// Push connection manager: lifecycle, heartbeat, reconnection and fan-out.
pub mod client;
/// Connection states and per-session bookkeeping.
pub mod client_state;
/// Runtime configuration model.
pub mod config;
/// Error types used across the crate.
pub mod error;
/// Event bus messages between pipeline and UI.
pub mod events;
/// Terminal output formatters.
pub mod formatter;
/// History loading, periodic refresh and confirmed mark-read.
pub mod hydrate;
/// Listener registry with unsubscribe tokens.
pub mod listeners;
/// Metrics and health status structures.
pub mod monitoring;
/// Alert policy and terminal notifier.
pub mod notify;
/// Glue from push messages to store, alerts and UI.
pub mod pipeline;
/// One-shot and repeating timers.
pub mod scheduler;
/// Event reconciliation store.
pub mod store;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Push socket abstraction and its WebSocket implementation.
pub mod transport;
/// Monitoring event model and push message codec.
pub mod types;
/// UI controller and presentation loop.
pub mod ui;

/// Primary crate error type.
pub use error::MonitorError;
