use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};
use uuid::Uuid;

/// Countries denied by default when `GATEWAY_DENIED_COUNTRIES` is unset.
pub const DEFAULT_DENIED_COUNTRIES: [&str; 9] = [
    "North Korea",
    "Iran",
    "Cuba",
    "Myanmar",
    "Iraq",
    "Libya",
    "Sudan",
    "Zimbabwe",
    "Syria",
];

pub const DEFAULT_REJECTION_STREAM: &str = "forbidden-requests";
pub const DEFAULT_CONSUMER_GROUP: &str = "forbidden-requests-sub";
pub const DEFAULT_ZONE_METADATA_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/zone";

/// Centralized gateway configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub redis_url: String,
    pub rejection_stream: String,
    pub denied_countries: Vec<String>,
    pub publish_timeout: Duration,
    /// Empty disables the zone lookup.
    pub zone_metadata_url: String,
    pub log_level: String,
}

/// Command-line arguments for the gateway.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Geo-fenced file retrieval gateway")]
pub struct GatewayArgs {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root directory holding one sub-directory per bucket (overrides GATEWAY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Audit database URL (overrides GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Redis URL for rejection notifications (overrides GATEWAY_REDIS_URL)
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Stream receiving rejection notifications (overrides GATEWAY_REJECTION_STREAM)
    #[arg(long)]
    pub rejection_stream: Option<String>,

    /// Apply the audit schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl GatewayConfig {
    /// Parse environment variables + CLI args into GatewayConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = GatewayArgs::parse();
        let migrate = args.migrate;
        let cfg = Self::merge(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values looked up through `var`.
    pub fn merge(args: GatewayArgs, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_port = parse_var(&var, "GATEWAY_PORT", 8080)?;
        let publish_timeout_ms = parse_var(&var, "GATEWAY_PUBLISH_TIMEOUT_MS", 2000_u64)?;

        let denied_countries = match var("GATEWAY_DENIED_COUNTRIES") {
            Some(list) => parse_country_list(&list),
            None => DEFAULT_DENIED_COUNTRIES.iter().map(|c| c.to_string()).collect(),
        };

        Ok(Self {
            host: args
                .host
                .or_else(|| var("GATEWAY_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.unwrap_or(env_port),
            storage_dir: args
                .storage_dir
                .or_else(|| var("GATEWAY_STORAGE_DIR"))
                .unwrap_or_else(|| "./data/buckets".into()),
            database_url: args
                .database_url
                .or_else(|| var("GATEWAY_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/audit/gateway.db".into()),
            redis_url: args
                .redis_url
                .or_else(|| var("GATEWAY_REDIS_URL"))
                .unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
            rejection_stream: args
                .rejection_stream
                .or_else(|| var("GATEWAY_REJECTION_STREAM"))
                .unwrap_or_else(|| DEFAULT_REJECTION_STREAM.into()),
            denied_countries,
            publish_timeout: Duration::from_millis(publish_timeout_ms),
            zone_metadata_url: var("GATEWAY_ZONE_METADATA_URL")
                .unwrap_or_else(|| DEFAULT_ZONE_METADATA_URL.into()),
            log_level: var("GATEWAY_LOG_LEVEL").unwrap_or_else(|| "info".into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration for the rejection consumer process.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub redis_url: String,
    pub stream: String,
    pub group: String,
    pub consumer_name: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub log_level: String,
}

/// Command-line arguments for the rejection consumer.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Consumes rejection notifications from the gateway")]
pub struct ConsumerArgs {
    /// Redis URL (overrides CONSUMER_REDIS_URL)
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Stream to subscribe to (overrides CONSUMER_STREAM)
    #[arg(long)]
    pub stream: Option<String>,

    /// Consumer group name (overrides CONSUMER_GROUP)
    #[arg(long)]
    pub group: Option<String>,

    /// Consumer name inside the group (overrides CONSUMER_NAME)
    #[arg(long)]
    pub consumer_name: Option<String>,
}

impl ConsumerConfig {
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(ConsumerArgs::parse(), |key| env::var(key).ok())
    }

    pub fn merge(args: ConsumerArgs, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let batch_size = parse_var(&var, "CONSUMER_BATCH_SIZE", 16_usize)?;
        let poll_interval_ms = parse_var(&var, "CONSUMER_POLL_INTERVAL_MS", 1000_u64)?;

        Ok(Self {
            redis_url: args
                .redis_url
                .or_else(|| var("CONSUMER_REDIS_URL"))
                .unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
            stream: args
                .stream
                .or_else(|| var("CONSUMER_STREAM"))
                .unwrap_or_else(|| DEFAULT_REJECTION_STREAM.into()),
            group: args
                .group
                .or_else(|| var("CONSUMER_GROUP"))
                .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.into()),
            consumer_name: args
                .consumer_name
                .or_else(|| var("CONSUMER_NAME"))
                .unwrap_or_else(|| format!("consumer-{}", Uuid::new_v4())),
            batch_size: batch_size.max(1),
            poll_interval: Duration::from_millis(poll_interval_ms),
            log_level: var("CONSUMER_LOG_LEVEL").unwrap_or_else(|| "info".into()),
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}

/// Split a comma-separated country list, dropping blank entries.
pub fn parse_country_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
