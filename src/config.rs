use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveTime;
use thiserror::Error;

use crate::engine::{EnginePolicy, LookupMode};
use crate::rows::parse_time;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("both SLOTWISE_TLS_CERT and SLOTWISE_TLS_KEY must be set, or neither")]
    PartialTls,
    #[error("SLOTWISE_DEFAULT_CLOSE must be after SLOTWISE_DEFAULT_OPEN")]
    InvertedDefaultHours,
    #[error("SLOTWISE_MAX_CONNECTIONS must be at least 1")]
    NoConnections,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Process configuration, read once at startup from `SLOTWISE_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub password: String,
    pub max_connections: usize,
    pub tls: Option<TlsPaths>,
    /// Prometheus exporter port. `None` disables the exporter.
    pub metrics_port: Option<u16>,
    /// JSON seed loaded into the reference store before accepting connections.
    pub seed_file: Option<PathBuf>,
    /// Register blocked time as a second conflict source.
    pub blocked_time: bool,
    pub policy: EnginePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            password: "slotwise".into(),
            max_connections: 256,
            tls: None,
            metrics_port: None,
            seed_file: None,
            blocked_time: false,
            policy: EnginePolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup. Unset or empty variables keep their
    /// default; set but malformed ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(v) = get("SLOTWISE_PORT") {
            config.port = parse("SLOTWISE_PORT", &v)?;
        }
        if let Some(v) = get("SLOTWISE_BIND") {
            config.bind = v;
        }
        if let Some(v) = get("SLOTWISE_PASSWORD") {
            config.password = v;
        }
        if let Some(v) = get("SLOTWISE_MAX_CONNECTIONS") {
            config.max_connections = parse("SLOTWISE_MAX_CONNECTIONS", &v)?;
            if config.max_connections == 0 {
                return Err(ConfigError::NoConnections);
            }
        }
        config.tls = match (get("SLOTWISE_TLS_CERT"), get("SLOTWISE_TLS_KEY")) {
            (None, None) => None,
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => return Err(ConfigError::PartialTls),
        };
        if let Some(v) = get("SLOTWISE_METRICS_PORT") {
            config.metrics_port = Some(parse("SLOTWISE_METRICS_PORT", &v)?);
        }
        config.seed_file = get("SLOTWISE_SEED_FILE").map(PathBuf::from);
        if let Some(v) = get("SLOTWISE_BLOCKED_TIME") {
            config.blocked_time = parse_bool("SLOTWISE_BLOCKED_TIME", &v)?;
        }
        if let Some(v) = get("SLOTWISE_LOOKUP_MODE") {
            config.policy.lookup = LookupMode::from_str(&v).map_err(|_| ConfigError::Invalid {
                var: "SLOTWISE_LOOKUP_MODE",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("SLOTWISE_DEFAULT_OPEN") {
            config.policy.default_open = time("SLOTWISE_DEFAULT_OPEN", &v)?;
        }
        if let Some(v) = get("SLOTWISE_DEFAULT_CLOSE") {
            config.policy.default_close = time("SLOTWISE_DEFAULT_CLOSE", &v)?;
        }
        if config.policy.default_close <= config.policy.default_open {
            return Err(ConfigError::InvertedDefaultHours);
        }

        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}

fn time(var: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    parse_time(var, value.trim()).map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}
