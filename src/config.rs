//! Process-environment configuration, materialized once at startup and
//! passed down explicitly. No module-level globals.

use crate::error::ConfigError;
use crate::fetch::ProxyConfig;

pub const SCRAPER_API_KEY_VAR: &str = "SCRAPER_API_KEY";
pub const STORE_URL_VAR: &str = "STORE_URL";
pub const STORE_API_KEY_VAR: &str = "STORE_API_KEY";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Render proxy credential. Absent means direct fetches only.
    pub proxy: Option<ProxyConfig>,
    /// Hosted datastore. Absent is fine for probes and dry runs.
    pub store: Option<StoreConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let proxy = read_var(SCRAPER_API_KEY_VAR).map(ProxyConfig::new);

        let store = match (read_var(STORE_URL_VAR), read_var(STORE_API_KEY_VAR)) {
            (Some(url), Some(api_key)) => Some(StoreConfig { url, api_key }),
            _ => None,
        };

        AppConfig { proxy, store }
    }

    /// Persisting runs need the store; its absence is the one fatal
    /// configuration error.
    pub fn require_store(&self) -> Result<&StoreConfig, ConfigError> {
        match &self.store {
            Some(store) => Ok(store),
            None => Err(ConfigError::MissingVar(STORE_URL_VAR)),
        }
    }
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_store_fails_when_absent() {
        let config = AppConfig {
            proxy: None,
            store: None,
        };
        assert!(matches!(
            config.require_store(),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    fn require_store_passes_when_present() {
        let config = AppConfig {
            proxy: None,
            store: Some(StoreConfig {
                url: "https://store.example".into(),
                api_key: "k".into(),
            }),
        };
        assert!(config.require_store().is_ok());
    }
}
