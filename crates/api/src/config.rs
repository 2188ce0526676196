use geocluster_core::engine::{DEFAULT_K, DEFAULT_MIN_CLUSTER_SIZE};

/// Default upper bound on events accepted in one request.
pub const DEFAULT_MAX_EVENTS: usize = 50_000;

/// Request-body allowance per permitted event when `MAX_BODY_BYTES` is unset.
///
/// A compact event serializes to roughly 70 bytes; the rest is headroom for
/// long float literals, timestamps and whitespace.
pub const BODY_BYTES_PER_EVENT: usize = 256;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest batch a single request may submit.
    pub max_events: usize,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
    /// `k` used when a request omits it.
    pub default_k: usize,
    /// `min_cluster_size` used when a request omits it.
    pub default_min_cluster_size: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `MAX_EVENTS`               | `50000`                 |
    /// | `MAX_BODY_BYTES`           | `MAX_EVENTS * 256`      |
    /// | `DEFAULT_K`                | `5`                     |
    /// | `DEFAULT_MIN_CLUSTER_SIZE` | `10`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_events = positive_usize("MAX_EVENTS", DEFAULT_MAX_EVENTS);
        let max_body_bytes = positive_usize(
            "MAX_BODY_BYTES",
            max_events.saturating_mul(BODY_BYTES_PER_EVENT),
        );
        let default_k = positive_usize("DEFAULT_K", DEFAULT_K);
        let default_min_cluster_size =
            positive_usize("DEFAULT_MIN_CLUSTER_SIZE", DEFAULT_MIN_CLUSTER_SIZE);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_events,
            max_body_bytes,
            default_k,
            default_min_cluster_size,
        }
    }
}

/// Read a `usize >= 1` from `key`, falling back to `default` when unset.
fn positive_usize(key: &str, default: usize) -> usize {
    let value: usize = match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a positive integer")),
        Err(_) => default,
    };
    assert!(value >= 1, "{key} must be at least 1");
    value
}
