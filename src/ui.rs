/// file: src/ui.rs
/// description: ui presentation layer that renders pipeline events and the alert summary
use crate::{
    client_state::ConnectionState,
    events::{DashboardEvent, EventReceiver},
    formatter::{Colors, EventFormatter, OutputFormat},
    hydrate::HydrateReport,
    store::{EventFilter, SharedEventStore, lock_store},
};
use tracing::{debug, info};

pub struct UIController {
    event_receiver: EventReceiver,
    formatter: EventFormatter,
    store: SharedEventStore,
    quiet_mode: bool,
    colored: bool,
    top: usize,
    filter: EventFilter,
    last_state: Option<ConnectionState>,
}

pub struct UIOptions {
    pub colored: bool,
    pub quiet: bool,
    /// Rows in the alert summary; 0 hides it.
    pub top: usize,
    pub filter: EventFilter,
}

impl UIController {
    pub fn new(
        event_receiver: EventReceiver,
        store: SharedEventStore,
        format: OutputFormat,
        options: UIOptions,
    ) -> Self {
        Self {
            event_receiver,
            formatter: EventFormatter::new(format, options.colored),
            store,
            quiet_mode: options.quiet,
            colored: options.colored,
            top: options.top,
            filter: options.filter,
            last_state: None,
        }
    }

    pub async fn run(&mut self) {
        self.print_startup_banner();
        while let Some(event) = self.event_receiver.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
    }

    fn handle_event(&mut self, event: DashboardEvent) -> bool {
        match event {
            DashboardEvent::Status(state) => {
                // Status listeners replay the current state on registration.
                if self.last_state == Some(state) {
                    return true;
                }
                self.last_state = Some(state);
                self.print_status(state);
            }
            DashboardEvent::Subscribed {
                status,
                subscriptions,
            } => {
                info!(%status, subscriptions, "Subscribed to monitoring feed");
                if !self.quiet_mode {
                    println!(
                        "{}",
                        self.formatter.format_status(
                            ConnectionState::Connected,
                            &format!("{status}, {subscriptions} subscription(s)")
                        )
                    );
                }
            }
            DashboardEvent::LiveEvent {
                event,
                outcome,
                notified,
            } => {
                debug!(id = %event.id, ?outcome, notified, "Rendering live event");
                // In quiet mode only alerts reach the terminal, via the notifier.
                if !self.quiet_mode {
                    println!("{}", self.formatter.format_event(&event, outcome));
                }
            }
            DashboardEvent::Hydrated(report) => {
                self.print_hydrated(report);
                self.print_top();
            }
            DashboardEvent::HydrateFailed(reason) => {
                println!("{}", self.formatter.format_error("HISTORY UNAVAILABLE", &reason));
            }
            DashboardEvent::MarkReadFailed { id, reason } => {
                println!(
                    "{}",
                    self.formatter
                        .format_error("MARK READ FAILED", &format!("{id}: {reason}"))
                );
            }
            DashboardEvent::Stopping => {
                self.print_top();
                if !self.quiet_mode {
                    println!(
                        "{}",
                        self.formatter
                            .format_status(ConnectionState::Disconnected, "Shutting down")
                    );
                }
                return false;
            }
        }

        true
    }

    fn print_startup_banner(&self) {
        if self.quiet_mode || self.formatter.format() == OutputFormat::Json {
            return;
        }

        let (bold, cyan, reset) = if self.colored {
            (Colors::BOLD, Colors::BRIGHT_CYAN, Colors::RESET)
        } else {
            ("", "", "")
        };

        println!();
        println!(
            "{bold}{cyan}JURISDICTION MONITOR v{}{reset}",
            env!("CARGO_PKG_VERSION")
        );
        println!("{bold}{cyan}{}{reset}", "=".repeat(40));
        println!();
    }

    fn print_status(&self, state: ConnectionState) {
        if self.quiet_mode && state != ConnectionState::Error {
            return;
        }
        let detail = match state {
            ConnectionState::Connecting => "Opening push connection",
            ConnectionState::Connected => "Listening for events",
            ConnectionState::Disconnected => "Connection closed",
            ConnectionState::Error => "Connection failed",
        };
        println!("{}", self.formatter.format_status(state, detail));
    }

    fn print_hydrated(&self, report: HydrateReport) {
        if self.quiet_mode {
            return;
        }
        let source = if report.authoritative_unread {
            "server"
        } else {
            "local"
        };
        println!(
            "{}",
            self.formatter.format_status(
                ConnectionState::Connected,
                &format!(
                    "Loaded {} events ({} changed), {} unread ({source} count)",
                    report.fetched, report.changed, report.unread
                )
            )
        );
    }

    fn print_top(&self) {
        if self.top == 0 {
            return;
        }
        let (events, unread) = {
            let store = lock_store(&self.store);
            (store.list_top(self.top, &self.filter), store.unread_count())
        };
        println!("{}", self.formatter.format_top(&events, unread));
    }
}
