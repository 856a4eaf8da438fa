// file: src/types.rs
// description: monitoring event model and push-channel message codec

use crate::error::MonitorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event severity as sent by the server.
///
/// Known values get their own variant; anything else lands in `Unknown` so a
/// server can introduce new levels without breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Unknown(String),
}

impl Severity {
    /// Sort rank, lower is more urgent. Unknown severities sort after `Info`.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
            Severity::Unknown(_) => 3,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Unknown(other) => other,
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            "info" => Severity::Info,
            _ => Severity::Unknown(value),
        }
    }
}

impl From<&str> for Severity {
    fn from(value: &str) -> Self {
        Severity::from(value.to_string())
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        match value {
            Severity::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change a monitoring event reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    RateChange,
    NewProgram,
    Expiration,
    News,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::RateChange => "rate_change",
            EventType::NewProgram => "new_program",
            EventType::Expiration => "expiration",
            EventType::News => "news",
            EventType::Other(other) => other,
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "rate_change" => EventType::RateChange,
            "new_program" => EventType::NewProgram,
            "expiration" => EventType::Expiration,
            "news" => EventType::News,
            _ => EventType::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected external change (rate change, new program, ...) relevant to
/// a jurisdiction. Field names follow the server's camelCase JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringEvent {
    pub id: String,
    pub jurisdiction_id: String,
    pub event_type: EventType,
    pub severity: Severity,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl MonitoringEvent {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Inbound frame on the push channel, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// Server acknowledgement sent right after the socket opens.
    Connection {
        status: String,
        #[serde(default)]
        subscriptions: Vec<serde_json::Value>,
    },
    MonitoringEvent {
        event: MonitoringEvent,
    },
    Pong,
    /// Any `type` this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl PushMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::Connection { .. } => "connection",
            PushMessage::MonitoringEvent { .. } => "monitoring_event",
            PushMessage::Pong => "pong",
            PushMessage::Unknown => "unknown",
        }
    }
}

/// Decode one raw text frame.
pub fn parse_frame(raw: &str) -> Result<PushMessage, MonitorError> {
    Ok(serde_json::from_str(raw)?)
}
