// file: src/notify.rs
// description: decides which live events raise a user alert, and raises it

use crate::{formatter::Colors, types::MonitoringEvent};
use std::io::Write;
use tracing::{debug, warn};

/// Only critical events interrupt the user.
pub fn should_notify(event: &MonitoringEvent) -> bool {
    event.is_critical()
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &MonitoringEvent);
}

/// Alerts on the controlling terminal: a bell plus a highlighted line on stderr.
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    permitted: bool,
    colored: bool,
}

impl TerminalNotifier {
    pub fn new(permitted: bool, colored: bool) -> Self {
        Self { permitted, colored }
    }

    pub fn render(&self, event: &MonitoringEvent) -> String {
        let text = format!(
            "[ALERT] {} {} - {}",
            event.jurisdiction_id.to_uppercase(),
            event.severity.as_str().to_uppercase(),
            event.title
        );
        if self.colored {
            format!("{}{}{}{}", Colors::BOLD, Colors::BRIGHT_RED, text, Colors::RESET)
        } else {
            text
        }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, event: &MonitoringEvent) {
        if !self.permitted {
            debug!(id = %event.id, "Notification suppressed, not permitted");
            return;
        }

        let mut stderr = std::io::stderr().lock();
        if let Err(e) = writeln!(stderr, "\x07{}", self.render(event)) {
            warn!("Failed to write alert: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Severity};
    use chrono::Utc;

    fn event(severity: Severity) -> MonitoringEvent {
        MonitoringEvent {
            id: "e1".into(),
            jurisdiction_id: "us-ga".into(),
            event_type: EventType::Expiration,
            severity,
            title: "Credit sunset announced".into(),
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
    fn only_critical_events_notify() {
        assert!(should_notify(&event(Severity::Critical)));
        assert!(!should_notify(&event(Severity::Warning)));
        assert!(!should_notify(&event(Severity::Info)));
        assert!(!should_notify(&event(Severity::Unknown("urgent".into()))));
    }

    #[test]
    fn plain_render_has_no_escape_codes() {
        let notifier = TerminalNotifier::new(true, false);
        assert_eq!(
            notifier.render(&event(Severity::Critical)),
            "[ALERT] US-GA CRITICAL - Credit sunset announced"
        );
    }
}
