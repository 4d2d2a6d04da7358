//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{Duration, FixedOffset};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DATABASE_PATH`
    /// Default: platform data directory (`guardian.db`).
    pub database_path: Option<PathBuf>,

    /// Minutes between required check-ins while on duty.  Any positive
    /// value; the reference UI offers 30, 60 and 120.
    /// Env: `CHECKIN_INTERVAL_MINUTES`
    /// Default: `60`
    pub checkin_interval_minutes: u32,

    /// Seconds between presence sweeps.
    /// Env: `SWEEP_INTERVAL_SECS`
    /// Default: `5`
    pub sweep_interval_secs: u64,

    /// Offset (minutes east of UTC) of the local clock shift schedules are
    /// written in.
    /// Env: `SHIFT_UTC_OFFSET_MINUTES`
    /// Default: `0`
    pub shift_utc_offset_minutes: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: None,
            checkin_interval_minutes: 60,
            sweep_interval_secs: 5,
            shift_utc_offset_minutes: 0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Ok(val) = std::env::var("CHECKIN_INTERVAL_MINUTES") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.checkin_interval_minutes = n,
                _ => {
                    tracing::warn!(
                        value = %val,
                        "Invalid CHECKIN_INTERVAL_MINUTES (must be a positive integer), using default"
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("SWEEP_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.sweep_interval_secs = n,
                _ => {
                    tracing::warn!(
                        value = %val,
                        "Invalid SWEEP_INTERVAL_SECS (must be a positive integer), using default"
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("SHIFT_UTC_OFFSET_MINUTES") {
            match val.parse::<i32>() {
                // UTC offsets in the wild stay within +-14h.
                Ok(n) if n.abs() <= 14 * 60 => config.shift_utc_offset_minutes = n,
                _ => {
                    tracing::warn!(
                        value = %val,
                        "Invalid SHIFT_UTC_OFFSET_MINUTES (must be within +-840), using default"
                    );
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn checkin_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.checkin_interval_minutes))
    }

    pub fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.sweep_interval_secs)
    }

    pub fn sweep_cadence(&self) -> Duration {
        Duration::seconds(self.sweep_interval_secs as i64)
    }

    pub fn shift_offset(&self) -> FixedOffset {
        use chrono::Offset;
        // Validated range above; east_opt only fails outside +-24h.
        FixedOffset::east_opt(self.shift_utc_offset_minutes * 60)
            .unwrap_or_else(|| chrono::Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.checkin_interval_minutes, 60);
        assert_eq!(config.sweep_interval_secs, 5);
        assert_eq!(config.shift_utc_offset_minutes, 0);
    }

    #[test]
    fn test_duration_helpers() {
        let config = ServerConfig::default();
        assert_eq!(config.checkin_interval(), Duration::minutes(60));
        assert_eq!(config.sweep_interval(), StdDuration::from_secs(5));
        assert_eq!(config.shift_offset(), FixedOffset::east_opt(0).unwrap());
    }

    #[test]
    fn test_offset_helper_honors_minutes() {
        let config = ServerConfig {
            shift_utc_offset_minutes: 120,
            ..Default::default()
        };
        assert_eq!(
            config.shift_offset(),
            FixedOffset::east_opt(2 * 3600).unwrap()
        );
    }
}
