use crate::di::{Annotate, Annotated};
use dashmap::DashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

/// Port the kernel listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 3000;

pub const PORT_KEY: &str = "OCTAVO_PORT";
pub const POWERED_BY_KEY: &str = "OCTAVO_POWERED_BY";

/// Configuration service
///
/// Starts from the process environment; entries can be overridden at
/// runtime. Registered in the kernel's default injector.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::from_vars(env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let service = Self::default();
        for (key, value) in vars {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    /// Parsed entry; `None` when missing or unparsable.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        match self.get(key)?.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, "ignoring unparsable configuration entry");
                None
            }
        }
    }

    /// Boolean entry accepting `true/false`, `1/0`, `yes/no` and `on/off`.
    pub fn get_flag(&self, key: &str) -> Option<bool> {
        let value = self.get(key)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => {
                tracing::warn!(key, value = %value, "ignoring unparsable configuration flag");
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn port(&self) -> u16 {
        self.get_parsed(PORT_KEY).unwrap_or(DEFAULT_PORT)
    }

    pub fn powered_by(&self) -> bool {
        self.get_flag(POWERED_BY_KEY).unwrap_or(true)
    }
}

impl Annotated for ConfigService {
    fn annotate() -> crate::Result<()> {
        Annotate::<ConfigService>::new().service(|_| Ok(ConfigService::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> ConfigService {
        ConfigService::from_vars(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    #[test]
    fn test_defaults() {
        let config = vars(&[]);
        assert_eq!(config.port(), 3000);
        assert!(config.powered_by());
    }

    #[test]
    fn test_overrides() {
        let config = vars(&[(PORT_KEY, "8080"), (POWERED_BY_KEY, "off")]);
        assert_eq!(config.port(), 8080);
        assert!(!config.powered_by());
    }

    #[test]
    fn test_unparsable_entries_fall_back() {
        let config = vars(&[(PORT_KEY, "eighty"), (POWERED_BY_KEY, "maybe")]);
        assert_eq!(config.port(), 3000);
        assert!(config.powered_by());
    }
}
