//! Application configuration loaded from environment variables.

use projections::ProjectionConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for plain text
/// - `INGEST_WORKERS`: ingestion partitions (default: `4`)
/// - `INGEST_QUEUE_CAPACITY`: events queued per partition (default: `1024`)
/// - `SUBSCRIPTION_CAPACITY`: updates buffered per live query (default: `64`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub projection: ProjectionConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(default)
        };

        let projection = ProjectionConfig::default()
            .with_workers(parsed("INGEST_WORKERS", defaults.projection.workers))
            .with_ingest_queue_capacity(parsed(
                "INGEST_QUEUE_CAPACITY",
                defaults.projection.ingest_queue_capacity,
            ))
            .with_subscription_capacity(parsed(
                "SUBSCRIPTION_CAPACITY",
                defaults.projection.subscription_capacity,
            ));

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            projection,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            projection: ProjectionConfig::default(),
        }
    }
}
