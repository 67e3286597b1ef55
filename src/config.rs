//! Address configuration for both binaries
//!
//! The address comes from the first command line argument, then the
//! `RELAY_ADDR` environment variable, then a built-in default. A bare host
//! gets the default port appended.

use std::env;

use crate::error::AppError;

/// Port used when none is given
pub const DEFAULT_PORT: u16 = 10000;

/// Address the server binds by default
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:10000";

/// Address the client connects to by default
pub const DEFAULT_CONNECT_ADDR: &str = "127.0.0.1:10000";

/// Environment variable consulted when no argument is given
pub const ADDR_ENV_VAR: &str = "RELAY_ADDR";

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl ServerConfig {
    /// Build from process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        let bind_addr = resolve_addr(
            env::args().nth(1),
            env::var(ADDR_ENV_VAR).ok(),
            DEFAULT_BIND_ADDR,
        )?;
        Ok(Self { bind_addr })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

/// Client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_addr: String,
}

impl ClientConfig {
    /// Build from process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        let server_addr = resolve_addr(
            env::args().nth(1),
            env::var(ADDR_ENV_VAR).ok(),
            DEFAULT_CONNECT_ADDR,
        )?;
        Ok(Self { server_addr })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_CONNECT_ADDR.to_string(),
        }
    }
}

/// Pick the first configured address source and normalize it
fn resolve_addr(
    arg: Option<String>,
    env_value: Option<String>,
    default: &str,
) -> Result<String, AppError> {
    match arg.or(env_value) {
        Some(raw) => normalize_addr(&raw),
        None => Ok(default.to_string()),
    }
}

/// Check a `host:port` address, appending the default port to a bare host
///
/// IPv6 literals need brackets (`[::1]:10000`).
pub fn normalize_addr(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::InvalidAddress(raw.to_string()));
    }

    if raw.starts_with('[') && raw.ends_with(']') {
        return Ok(format!("{}:{}", raw, DEFAULT_PORT));
    }

    match raw.rsplit_once(':') {
        Some((host, port)) => {
            let unbracketed_v6 = host.contains(':') && !host.starts_with('[');
            if host.is_empty() || unbracketed_v6 || port.parse::<u16>().is_err() {
                return Err(AppError::InvalidAddress(raw.to_string()));
            }
            Ok(raw.to_string())
        }
        None => Ok(format!("{}:{}", raw, DEFAULT_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_wins_over_env() {
        let addr = resolve_addr(
            Some("10.0.0.1:9000".to_string()),
            Some("10.0.0.2:9000".to_string()),
            DEFAULT_CONNECT_ADDR,
        )
        .unwrap();
        assert_eq!(addr, "10.0.0.1:9000");
    }

    #[test]
    fn test_env_then_default() {
        let from_env = resolve_addr(None, Some("relay.local".to_string()), DEFAULT_BIND_ADDR);
        assert_eq!(from_env.unwrap(), "relay.local:10000");

        let fallback = resolve_addr(None, None, DEFAULT_BIND_ADDR).unwrap();
        assert_eq!(fallback, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(
            normalize_addr("  "),
            Err(AppError::InvalidAddress(_))
        ));
        assert!(matches!(
            normalize_addr("host:notaport"),
            Err(AppError::InvalidAddress(_))
        ));
        assert!(matches!(
            normalize_addr(":10000"),
            Err(AppError::InvalidAddress(_))
        ));
        assert_eq!(normalize_addr("[::1]:10000").unwrap(), "[::1]:10000");
    }

    #[test]
    fn test_bracketed_ipv6_host_gets_default_port() {
        assert_eq!(normalize_addr("[::1]").unwrap(), "[::1]:10000");
        assert!(matches!(
            normalize_addr("::1"),
            Err(AppError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ServerConfig::default().bind_addr, "0.0.0.0:10000");
        assert_eq!(ClientConfig::default().server_addr, "127.0.0.1:10000");
    }
}
