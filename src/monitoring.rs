use crate::{client_state::ConnectionState, error::MonitorError};
use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{Counter, Gauge, counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static FRAMES_RECEIVED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("monitor_frames_received_total"));
pub static EVENTS_RECEIVED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("monitor_live_events_total"));
pub static PARSE_ERROR_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("monitor_parse_errors_total"));
pub static RECONNECT_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("monitor_reconnects_total"));
pub static CONNECTED_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("monitor_connected"));
pub static UNREAD_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("monitor_unread_events"));

pub async fn setup_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "jurisdiction-monitor")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(_handle) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            FRAMES_RECEIVED_COUNTER.absolute(0);
            EVENTS_RECEIVED_COUNTER.absolute(0);
            PARSE_ERROR_COUNTER.absolute(0);
            RECONNECT_COUNTER.absolute(0);
            CONNECTED_GAUGE.set(0.0);
            UNREAD_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(MonitorError::MetricsError(e.to_string()).into())
        }
    }
}

/// Point-in-time view of the connection manager, for logs and status output.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub state: ConnectionState,
    pub exhausted: bool,
    pub attempt: u32,
    pub connection_id: Option<String>,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub total_messages: u64,
    pub parse_errors: u64,
    pub reconnect_count: u64,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn uptime(&self) -> chrono::Duration {
        self.connected_since
            .map(|since| Utc::now() - since)
            .unwrap_or_else(chrono::Duration::zero)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": if self.is_healthy() { "healthy" } else { "unhealthy" },
            "state": self.state,
            "exhausted": self.exhausted,
            "attempt": self.attempt,
            "connection_id": self.connection_id,
            "last_message_time": self.last_message_time,
            "total_messages": self.total_messages,
            "parse_errors": self.parse_errors,
            "reconnect_count": self.reconnect_count,
            "uptime_seconds": self.uptime().num_seconds(),
            "timestamp": Utc::now()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_json_reports_state() {
        let status = HealthStatus {
            state: ConnectionState::Disconnected,
            exhausted: true,
            attempt: 5,
            connection_id: None,
            connected_since: None,
            last_message_time: None,
            total_messages: 12,
            parse_errors: 1,
            reconnect_count: 5,
        };

        let json = status.to_json();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["state"], "disconnected");
        assert_eq!(json["exhausted"], true);
        assert_eq!(json["uptime_seconds"], 0);
    }
}
