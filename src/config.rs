//! Environment-driven configuration, read once at startup.

use chrono::Duration;
use tracing::warn;

/// Base64 of a 48-byte development-only signing secret. Anything real must
/// set `KEYGATE_SECRET`.
pub const DEV_SECRET_B64: &str = "a2V5Z2F0ZS1kZXZlbG9wbWVudC1zaWduaW5nLXNlY3JldC1kby1ub3QtZGVwbG95";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// Base64-encoded symmetric signing secret; decoded to raw key bytes
    /// before use. Decoded material shorter than 32 bytes is rejected.
    pub secret_b64: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Provision the default admin identity at startup when absent.
    pub bootstrap_admin: bool,
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let secret_b64 = match std::env::var("KEYGATE_SECRET") {
            Ok(s) if !s.trim().is_empty() => s,
            _ => {
                warn!("KEYGATE_SECRET not set, falling back to the built-in development secret");
                DEV_SECRET_B64.to_string()
            }
        };
        Config {
            http_port: env_u64("KEYGATE_HTTP_PORT", 7878) as u16,
            secret_b64,
            access_ttl: Duration::seconds(env_u64("KEYGATE_ACCESS_TTL_SECS", 900) as i64),
            refresh_ttl: Duration::seconds(env_u64("KEYGATE_REFRESH_TTL_SECS", 7 * 24 * 3600) as i64),
            bootstrap_admin: std::env::var("KEYGATE_BOOTSTRAP_ADMIN")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            http_port: 7878,
            secret_b64: DEV_SECRET_B64.to_string(),
            access_ttl: Duration::seconds(900),
            refresh_ttl: Duration::seconds(7 * 24 * 3600),
            bootstrap_admin: true,
        }
    }
}
