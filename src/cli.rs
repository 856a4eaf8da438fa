use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "jurisdiction-monitor",
    about = "live jurisdiction monitoring feed with reconnecting push stream and unread tracking",
    version
)]
pub struct Args {
    /// Push endpoint URL
    #[arg(
        short,
        long,
        env = "MONITOR_WS_URL",
        default_value = "ws://localhost:8000/ws/monitoring"
    )]
    pub url: String,

    /// REST base URL for history, unread count and mark-read (hydration is skipped when unset)
    #[arg(long, env = "MONITOR_API_URL")]
    pub api_url: Option<String>,

    /// Access token, sent as a query parameter on the push URL and as a bearer token to the REST API
    #[arg(long, env = "MONITOR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Only receive events for these jurisdiction ids (comma-separated or repeated)
    #[arg(short, long = "jurisdiction", value_delimiter = ',')]
    pub jurisdictions: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Connection timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// First reconnection delay in milliseconds (doubles per failure)
    #[arg(long, default_value = "1000")]
    pub reconnect_base_ms: u64,

    /// Upper bound on the reconnection delay in milliseconds
    #[arg(long, default_value = "30000")]
    pub reconnect_max_ms: u64,

    /// Maximum number of consecutive reconnection attempts (0 for unlimited)
    #[arg(long, default_value = "5")]
    pub max_reconnects: u32,

    /// Random spread applied to reconnection delays, as a fraction (0.0 - 1.0)
    #[arg(long, default_value = "0.0")]
    pub reconnect_jitter: f64,

    /// Keepalive interval in seconds
    #[arg(long, default_value = "30")]
    pub heartbeat_interval: u64,

    /// Number of events requested per history fetch
    #[arg(long, default_value = "50")]
    pub page_size: u32,

    /// Seconds between history re-fetches (0 disables periodic refresh)
    #[arg(long, default_value = "60")]
    pub refresh_interval: u64,

    /// Maximum number of events kept in memory (0 for unlimited)
    #[arg(long, default_value = "0")]
    pub max_events: usize,

    /// Number of entries in the top alerts table
    #[arg(long, default_value = "5")]
    pub top: usize,

    /// Mark these event ids as read after the first history fetch
    #[arg(long, value_delimiter = ',')]
    pub mark_read: Vec<String>,

    /// Output format: table, json, minimal
    #[arg(long, default_value = "table")]
    pub format: String,

    /// Disable colored output (useful for piping to files)
    #[arg(long)]
    pub no_color: bool,

    /// Disable terminal alerts for critical events
    #[arg(long)]
    pub no_notify: bool,

    /// Quiet mode - only alerts and errors
    #[arg(long)]
    pub quiet: bool,
}
