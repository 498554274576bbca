use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Service settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// `BROKER_ADDR`
    pub addr: SocketAddr,
    /// `BRAND_CATALOG`, a YAML file of per-brand copy.
    pub brand_catalog: Option<PathBuf>,
    /// `BACKEND_URL`; submissions stay in-process when unset.
    pub backend_url: Option<String>,
    /// `LOG_FORMAT`, `pretty` or anything else for JSON.
    pub log_format: String,
    /// `SUBMIT_TIMEOUT_SECS`, how long a submit request waits for its result.
    pub submit_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            brand_catalog: None,
            backend_url: None,
            log_format: "json".to_string(),
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let raw_addr = var("BROKER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "BROKER_ADDR",
            value: raw_addr.clone(),
        })?;

        let submit_timeout = match var("SUBMIT_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::Invalid {
                    name: "SUBMIT_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
        };

        Ok(Self {
            addr,
            brand_catalog: var("BRAND_CATALOG").map(PathBuf::from),
            backend_url: var("BACKEND_URL"),
            log_format: var("LOG_FORMAT").unwrap_or_else(|| "json".to_string()),
            submit_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr.to_string(), DEFAULT_ADDR);
        assert!(config.brand_catalog.is_none());
        assert!(config.backend_url.is_none());
        assert_eq!(config.log_format, "json");
        assert_eq!(config.submit_timeout, Duration::from_secs(30));
    }

    #[test]
    fn values_are_read_and_checked() {
        let config = load(&[
            ("BROKER_ADDR", "127.0.0.1:8088"),
            ("BRAND_CATALOG", "config/brands.yaml"),
            ("BACKEND_URL", "  "),
            ("LOG_FORMAT", "pretty"),
            ("SUBMIT_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 8088);
        assert_eq!(config.brand_catalog, Some(PathBuf::from("config/brands.yaml")));
        assert!(config.backend_url.is_none());
        assert_eq!(config.submit_timeout, Duration::from_secs(5));

        assert!(matches!(
            load(&[("BROKER_ADDR", "not-an-addr")]),
            Err(ConfigError::Invalid { name: "BROKER_ADDR", .. })
        ));
        assert!(load(&[("SUBMIT_TIMEOUT_SECS", "0")]).is_err());
    }
}
