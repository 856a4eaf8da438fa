/// file: src/config.rs
/// description: typed runtime configuration built from CLI arguments
use crate::{backoff::ReconnectPolicy, cli::Args, client_state::SubscriptionFilter};
use anyhow::{Result, bail};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HEARTBEAT_PAYLOAD: &str = "ping";

#[derive(Debug, Clone)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub metrics: MetricsConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: Url,
    pub auth_token: Option<String>,
    pub filter: Option<SubscriptionFilter>,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub jitter: f64,
    pub heartbeat_interval: Duration,
    pub heartbeat_payload: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Option<Url>,
    pub auth_token: Option<String>,
    pub page_size: u32,
    /// `None` disables periodic refresh.
    pub refresh_interval: Option<Duration>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub format: String,
    pub colored: bool,
    pub quiet: bool,
    pub notifications: bool,
    pub top: usize,
    pub mark_read: Vec<String>,
}

impl ConnectionConfig {
    /// Defaults for everything but the endpoint.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            auth_token: None,
            filter: None,
            connect_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            jitter: 0.0,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_payload: DEFAULT_HEARTBEAT_PAYLOAD.to_string(),
        }
    }

    /// Push URL for one session: base address, optional jurisdiction scoping
    /// and the auth token as query parameters.
    pub fn endpoint(&self, filter: Option<&SubscriptionFilter>) -> Url {
        let mut url = self.url.clone();
        let scoped = filter.filter(|f| !f.is_empty());

        if scoped.is_some() || self.auth_token.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(filter) = scoped {
                query.append_pair("jurisdictions", &filter.jurisdiction_ids.join(","));
            }
            if let Some(token) = &self.auth_token {
                query.append_pair("token", token);
            }
        }
        url
    }
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let url = Url::parse(&args.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            bail!("push URL must use ws:// or wss://, got {}", url.scheme());
        }

        if args.reconnect_base_ms == 0 || args.reconnect_max_ms < args.reconnect_base_ms {
            bail!("reconnect delays must satisfy 0 < base <= max");
        }

        let api_base = args.api_url.as_deref().map(Url::parse).transpose()?;

        let filter = if args.jurisdictions.is_empty() {
            None
        } else {
            Some(SubscriptionFilter::jurisdictions(
                args.jurisdictions.iter().map(|id| id.trim()).filter(|id| !id.is_empty()),
            ))
        };

        Ok(Config {
            connection: ConnectionConfig {
                url,
                auth_token: args.token.clone(),
                filter,
                connect_timeout: Duration::from_secs(args.timeout),
                reconnect: ReconnectPolicy::new(
                    Duration::from_millis(args.reconnect_base_ms),
                    Duration::from_millis(args.reconnect_max_ms),
                    (args.max_reconnects > 0).then_some(args.max_reconnects),
                ),
                jitter: args.reconnect_jitter.clamp(0.0, 1.0),
                heartbeat_interval: Duration::from_secs(args.heartbeat_interval.max(1)),
                heartbeat_payload: DEFAULT_HEARTBEAT_PAYLOAD.to_string(),
            },
            api: ApiConfig {
                base_url: api_base,
                auth_token: args.token.clone(),
                page_size: args.page_size.max(1),
                refresh_interval: (args.refresh_interval > 0)
                    .then(|| Duration::from_secs(args.refresh_interval)),
                request_timeout: Duration::from_secs(args.timeout),
            },
            store: StoreConfig {
                capacity: (args.max_events > 0).then_some(args.max_events),
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            display: DisplayConfig {
                format: args.format.clone(),
                colored: !args.no_color,
                quiet: args.quiet,
                notifications: !args.no_notify,
                top: args.top,
                mark_read: args.mark_read.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["jurisdiction-monitor"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_map_to_five_attempt_policy() {
        let config = Config::from_args(&parse(&[])).unwrap();
        let policy = &config.connection.reconnect;

        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
        assert_eq!(policy.max_attempts, Some(5));
        assert!(config.connection.filter.is_none());
        assert!(config.api.base_url.is_none());
        assert_eq!(config.api.refresh_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_max_reconnects_means_unlimited() {
        let config = Config::from_args(&parse(&["--max-reconnects", "0"])).unwrap();
        assert_eq!(config.connection.reconnect.max_attempts, None);
    }

    #[test]
    fn jurisdictions_accept_commas_and_repeats() {
        let config = Config::from_args(&parse(&["-j", "us-ca,us-ny", "-j", "uk"])).unwrap();
        assert_eq!(
            config.connection.filter.unwrap().jurisdiction_ids,
            vec!["us-ca", "us-ny", "uk"]
        );
    }

    #[test]
    fn endpoint_encodes_filter_and_token() {
        let mut connection =
            ConnectionConfig::new(Url::parse("wss://dash.example.com/ws/monitoring").unwrap());
        connection.auth_token = Some("tok".into());
        let filter = SubscriptionFilter::jurisdictions(["us-ca", "us-ny"]);

        let url = connection.endpoint(Some(&filter));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(
            pairs,
            vec![
                ("jurisdictions".to_string(), "us-ca,us-ny".to_string()),
                ("token".to_string(), "tok".to_string()),
            ]
        );
    }

    #[test]
    fn endpoint_without_filter_or_token_is_base_url() {
        let connection =
            ConnectionConfig::new(Url::parse("ws://localhost:8000/ws/monitoring").unwrap());
        let empty = SubscriptionFilter::default();
        assert_eq!(
            connection.endpoint(Some(&empty)).as_str(),
            "ws://localhost:8000/ws/monitoring"
        );
    }

    #[test]
    fn rejects_http_push_url() {
        assert!(Config::from_args(&parse(&["--url", "http://localhost/ws"])).is_err());
    }
}
