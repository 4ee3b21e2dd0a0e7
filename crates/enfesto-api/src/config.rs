use std::env;
use std::net::{IpAddr, SocketAddr};

use enfesto_core::MAX_ROWS;
use tracing::warn;

/// Server settings, read from the environment (and an optional `.env` file).
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    port: u16,
    max_rows: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::from([0, 0, 0, 0]),
            port: Self::DEFAULT_PORT,
            max_rows: MAX_ROWS,
        }
    }
}

impl ApiConfig {
    const DEFAULT_PORT: u16 = 3000;

    pub fn from_env() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                warn!("Could not load .env file: {}", err);
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind_ip = parse_or(
            lookup("ENFESTO_API_HOST"),
            "ENFESTO_API_HOST",
            defaults.bind_ip,
        );
        let port = match parse_or(lookup("ENFESTO_API_PORT"), "ENFESTO_API_PORT", defaults.port) {
            0 => {
                warn!("ENFESTO_API_PORT must not be 0. Using {}.", Self::DEFAULT_PORT);
                Self::DEFAULT_PORT
            }
            port => port,
        };
        let max_rows = match parse_or(lookup("ENFESTO_MAX_ROWS"), "ENFESTO_MAX_ROWS", defaults.max_rows) {
            0 => {
                warn!("ENFESTO_MAX_ROWS must not be 0. Using {}.", MAX_ROWS);
                MAX_ROWS
            }
            rows => rows,
        };

        Self {
            bind_ip,
            port,
            max_rows,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Largest batch accepted by `/api/optimize`.
    pub fn max_rows(&self) -> usize {
        self.max_rows
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(err) => {
            warn!("Could not parse {} ('{}'): {}. Using {}.", key, raw, err, default);
            default
        }
    }
}
