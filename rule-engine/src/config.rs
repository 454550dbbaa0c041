//! Configuration module for environment variable parsing.
//!
//! Invalid values are logged and replaced by their defaults.

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::emit::DEFAULT_PROPAGATION_WAIT_SECS;
use crate::synth::MarkerScheme;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Click-tracking redirect endpoint; banner click URLs are used directly when unset
    pub tracking_endpoint: Option<String>,

    /// Default for requests that do not say whether they want per-recipient analytics
    pub per_recipient_tracking: bool,

    /// How group ids, markers and rule names are derived
    pub marker_scheme: MarkerScheme,

    /// Valid priority values of the mail platform (min, max)
    pub priority_range: (u8, u8),

    /// Seconds the cleanup script waits for removals to propagate
    pub propagation_wait_secs: u64,

    /// Extra rule name prefixes the cleanup predicate should match
    pub extra_managed_prefixes: Option<Vec<String>>,

    // =========================================================================
    // Web Server Configuration
    // =========================================================================

    /// Port for the web server to listen on
    pub port: u16,

    /// HMAC key for request signature verification
    pub signing_key: Option<String>,

    /// Maximum age in seconds for signed request timestamps
    pub signature_max_age: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            tracking_endpoint: env::var("SIGFLOW_TRACKING_ENDPOINT")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            per_recipient_tracking: parse_bool("SIGFLOW_PER_RECIPIENT_TRACKING", false),

            marker_scheme: parse_marker_scheme("SIGFLOW_MARKER_SCHEME"),

            priority_range: parse_range("SIGFLOW_PRIORITY_RANGE", (0, 5)),

            propagation_wait_secs: env::var("SIGFLOW_PROPAGATION_WAIT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PROPAGATION_WAIT_SECS),

            extra_managed_prefixes: parse_csv("SIGFLOW_EXTRA_MANAGED_PREFIXES"),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            signing_key: env::var("SIGFLOW_SIGNING_KEY").ok(),

            signature_max_age: env::var("SIGFLOW_SIGNATURE_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300), // 5 minutes default
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tracking_endpoint: None,
            per_recipient_tracking: false,
            marker_scheme: MarkerScheme::default(),
            priority_range: (0, 5),
            propagation_wait_secs: DEFAULT_PROPAGATION_WAIT_SECS,
            extra_managed_prefixes: None,
            port: 8080,
            signing_key: None,
            signature_max_age: 300,
        }
    }
}

/// Parse a comma-separated range like "0,5" into an ordered tuple.
fn parse_range<T>(name: &str, default: (T, T)) -> (T, T)
where
    T: FromStr + PartialOrd + Copy,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        warn!(env_var = name, value = %raw, "Invalid range format, using default");
        return default;
    }

    let min = parts[0].trim().parse::<T>();
    let max = parts[1].trim().parse::<T>();

    match (min, max) {
        (Ok(min), Ok(max)) if min < max => (min, max),
        _ => {
            warn!(env_var = name, value = %raw, "Invalid range values, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Parse a boolean flag (`1`/`true`/`yes`/`on` and their negatives).
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

fn parse_marker_scheme(name: &str) -> MarkerScheme {
    match env::var(name) {
        Ok(raw) => MarkerScheme::parse(&raw).unwrap_or_else(|| {
            warn!(env_var = name, value = %raw, "Invalid marker scheme, using default");
            MarkerScheme::default()
        }),
        Err(_) => MarkerScheme::default(),
    }
}
