use std::{env, net::SocketAddr, str::FromStr};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    WebSocket,
    Stdio,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "stdio" => Ok(Self::Stdio),
            _ => Err(ConfigError::InvalidTransport),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub module: String,
    pub bind_addr: String,
    pub bind_port: u16,
    pub transport: TransportKind,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("usage: plugin-rpc-bridge <module>")]
    MissingModule,
    #[error("BRIDGE_BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("BRIDGE_TRANSPORT must be one of: websocket, stdio")]
    InvalidTransport,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env::args().skip(1), |key| env::var(key).ok())
    }

    /// Builds the config from positional arguments (program name already
    /// stripped) and an environment lookup.
    pub fn from_lookup<I, F>(args: I, lookup: F) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let module = args
            .into_iter()
            .next()
            .map(|arg| arg.trim().to_string())
            .filter(|arg| !arg.is_empty())
            .ok_or(ConfigError::MissingModule)?;

        let bind_addr = lookup("BRIDGE_BIND_ADDR")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = lookup("BRIDGE_BIND_PORT")
            .map(|value| {
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort)
            })
            .transpose()?
            .unwrap_or(0);
        let transport = lookup("BRIDGE_TRANSPORT")
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.parse::<TransportKind>())
            .transpose()?
            .unwrap_or(TransportKind::WebSocket);

        let config = Self {
            module,
            bind_addr,
            bind_port,
            transport,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse(args: &[&str], vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(args.iter().map(|arg| arg.to_string()), |key| {
            vars.get(key).cloned()
        })
    }

    #[test]
    fn parse_defaults() {
        let config = parse(&["math"], &[]).expect("config should parse");
        assert_eq!(config.module, "math");
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, 0);
        assert_eq!(config.transport, TransportKind::WebSocket);
    }

    #[test]
    fn missing_module_fails() {
        let err = parse(&[], &[]).expect_err("expected missing module error");
        assert!(matches!(err, ConfigError::MissingModule));

        let err = parse(&["  "], &[]).expect_err("blank module must fail");
        assert!(matches!(err, ConfigError::MissingModule));
    }

    #[test]
    fn invalid_port_fails() {
        let err = parse(&["math"], &[("BRIDGE_BIND_PORT", "70000")])
            .expect_err("expected invalid port error");
        assert!(matches!(err, ConfigError::InvalidPort));
    }

    #[test]
    fn transport_parses_stdio() {
        let config =
            parse(&["text"], &[("BRIDGE_TRANSPORT", "STDIO")]).expect("config should parse");
        assert_eq!(config.transport, TransportKind::Stdio);
    }

    #[test]
    fn unknown_transport_fails() {
        let err = parse(&["text"], &[("BRIDGE_TRANSPORT", "carrier-pigeon")])
            .expect_err("expected invalid transport error");
        assert!(matches!(err, ConfigError::InvalidTransport));
    }

    #[test]
    fn invalid_bind_addr_fails() {
        let err = parse(&["math"], &[("BRIDGE_BIND_ADDR", "not an address")])
            .expect_err("expected invalid socket error");
        assert!(matches!(err, ConfigError::InvalidSocket));
    }

    #[test]
    fn custom_socket_parses() {
        let config = parse(
            &["math", "ignored-extra"],
            &[("BRIDGE_BIND_ADDR", "0.0.0.0"), ("BRIDGE_BIND_PORT", "9000")],
        )
        .expect("config should parse");
        assert_eq!(
            config.bind_socket().expect("valid socket"),
            "0.0.0.0:9000".parse().expect("valid addr")
        );
    }
}
