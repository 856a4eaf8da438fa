use crate::{
    client_state::ConnectionState,
    store::Upsert,
    types::{MonitoringEvent, Severity},
};

// ANSI color codes
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";

    // Colors
    pub const RED: &'static str = "\x1b[31m";
    pub const WHITE: &'static str = "\x1b[37m";
    pub const GRAY: &'static str = "\x1b[90m";

    // Bright colors
    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_BLUE: &'static str = "\x1b[94m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Minimal,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "minimal" => OutputFormat::Minimal,
            _ => OutputFormat::Table,
        }
    }
}

const TITLE_WIDTH: usize = 48;

pub struct EventFormatter {
    format: OutputFormat,
    colored: bool,
}

impl EventFormatter {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colored {
            format!("{}{}{}", color, text, Colors::RESET)
        } else {
            text.to_string()
        }
    }

    fn severity_color(severity: &Severity) -> &'static str {
        match severity {
            Severity::Critical => Colors::BRIGHT_RED,
            Severity::Warning => Colors::BRIGHT_YELLOW,
            Severity::Info => Colors::BRIGHT_BLUE,
            Severity::Unknown(_) => Colors::GRAY,
        }
    }

    /// One line for a live event.
    pub fn format_event(&self, event: &MonitoringEvent, outcome: Upsert) -> String {
        match self.format {
            OutputFormat::Json => {
                let outcome = match outcome {
                    Upsert::Inserted => "new",
                    Upsert::Replaced => "updated",
                    Upsert::Kept => "stale",
                };
                serde_json::json!({ "outcome": outcome, "event": event }).to_string()
            }
            OutputFormat::Minimal => format!(
                "{} {} {} {}",
                event.detected_at.format("%H:%M:%S"),
                self.paint(Self::severity_color(&event.severity), event.severity.as_str()),
                event.jurisdiction_id,
                event.title
            ),
            OutputFormat::Table => {
                let marker = match outcome {
                    Upsert::Inserted => "NEW",
                    Upsert::Replaced => "UPD",
                    Upsert::Kept => "OLD",
                };
                format!(
                    "{} {:<8} {:<12} {:<12} {}",
                    self.paint(Colors::BOLD, &format!("[{marker}]")),
                    self.paint(
                        Self::severity_color(&event.severity),
                        &format!("{:<8}", event.severity.as_str().to_uppercase())
                    ),
                    event.jurisdiction_id,
                    event.event_type.as_str(),
                    truncate(&event.title, TITLE_WIDTH)
                )
            }
        }
    }

    /// Ranked table of the most urgent events plus the unread counter.
    pub fn format_top(&self, events: &[MonitoringEvent], unread: u64) -> String {
        if self.format == OutputFormat::Json {
            return serde_json::json!({ "unread": unread, "top": events }).to_string();
        }

        let mut output = self.paint(
            &format!("{}{}", Colors::BOLD, Colors::BRIGHT_CYAN),
            &format!("TOP ALERTS ({unread} unread)"),
        );
        output.push('\n');

        if events.is_empty() {
            output.push_str(&self.paint(Colors::DIM, "  no events"));
            return output;
        }

        for (rank, event) in events.iter().enumerate() {
            let read_marker = if event.is_read() { " " } else { "*" };
            output.push_str(&format!(
                "{:>3}. {}{} {:<12} {} {}\n",
                rank + 1,
                read_marker,
                self.paint(
                    Self::severity_color(&event.severity),
                    &format!("{:<8}", event.severity.as_str().to_uppercase())
                ),
                event.jurisdiction_id,
                event.detected_at.format("%Y-%m-%d %H:%M"),
                truncate(&event.title, TITLE_WIDTH)
            ));
        }
        output.truncate(output.trim_end().len());
        output
    }

    pub fn format_status(&self, state: ConnectionState, detail: &str) -> String {
        let (color, symbol) = match state {
            ConnectionState::Connecting => (Colors::BRIGHT_YELLOW, "*"),
            ConnectionState::Connected => (Colors::BRIGHT_GREEN, "+"),
            ConnectionState::Disconnected => (Colors::BRIGHT_MAGENTA, "X"),
            ConnectionState::Error => (Colors::BRIGHT_RED, "!"),
        };
        let label = format!("[{}]", state.as_str().to_uppercase());

        if detail.is_empty() {
            format!("{} {}", self.paint(color, &label), symbol)
        } else {
            format!(
                "{} {} {}",
                self.paint(color, &label),
                symbol,
                self.paint(Colors::WHITE, detail)
            )
        }
    }

    pub fn format_error(&self, error_type: &str, message: &str) -> String {
        format!(
            "{} ! {}",
            self.paint(Colors::BRIGHT_RED, &format!("[{error_type}]")),
            self.paint(Colors::RED, message)
        )
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
