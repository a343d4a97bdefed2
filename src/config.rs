//! Runtime configuration.
//!
//! Every struct deserializes with defaults for missing fields, so a
//! partial config (or none at all) is valid. Intervals are stored as
//! integers and exposed as `Duration` through accessors. Files are JSON.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Everything one pipeline run needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub handler: HandlerConfig,
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Market data handler settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Address the receive endpoint binds to
    pub bind_ip: IpAddr,
    /// UDP port; 0 picks an ephemeral port
    pub port: u16,
    /// Logical core for the receive thread, if pinning is wanted
    pub core: Option<usize>,
    /// Sleep between receive attempts
    pub poll_interval_us: u64,
    /// Fall back to (or supplement with) synthetic orders
    pub synthetic_enabled: bool,
    pub synthetic: SyntheticConfig,
}

impl HandlerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            core: Some(3),
            poll_interval_us: 100,
            synthetic_enabled: true,
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// One symbol the synthetic feed quotes, and the price it reverts to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: String,
    pub base_price: f64,
}

impl SymbolSpec {
    pub fn new(symbol: &str, base_price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            base_price,
        }
    }
}

/// Synthetic order generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Minimum time between two synthetic orders
    pub interval_ms: u64,
    pub symbols: Vec<SymbolSpec>,
    /// Fraction of the gap to the base price closed per step
    pub reversion: f64,
    /// Noise is uniform in `[-noise, noise]`
    pub noise: f64,
    pub qty_min: u32,
    pub qty_max: u32,
    /// Fixed seed for reproducible runs; entropy otherwise
    pub seed: Option<u64>,
}

impl SyntheticConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            symbols: vec![
                SymbolSpec::new("AAPL", 100.0),
                SymbolSpec::new("MSFT", 110.0),
                SymbolSpec::new("NVDA", 90.0),
            ],
            reversion: 0.01,
            noise: 0.5,
            qty_min: 1,
            qty_max: 100,
            seed: None,
        }
    }
}

/// Processing thread settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Logical core for the processing thread, if pinning is wanted
    pub core: Option<usize>,
    /// Empty polls spent spinning before the thread starts sleeping
    pub spin_iterations: u32,
    /// Sleep once spinning gave nothing
    pub idle_sleep_us: u64,
    /// Stop after this many orders
    pub max_orders: Option<u64>,
    /// Keep per-order series for export
    pub record_series: bool,
}

impl ProcessingConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_micros(self.idle_sleep_us)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            core: Some(2),
            spin_iterations: 64,
            idle_sleep_us: 1_000,
            max_orders: None,
            record_series: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_defaults() {
        let config = HandlerConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.synthetic_enabled);
        assert_eq!(config.synthetic.interval(), Duration::from_millis(100));
        assert_eq!(config.poll_interval(), Duration::from_micros(100));
        assert_eq!(config.bind_addr().port(), 8080);
    }

    #[test]
    fn test_default_symbols_inside_clamp_band() {
        let config = SyntheticConfig::default();
        assert!(!config.symbols.is_empty());
        assert!(config
            .symbols
            .iter()
            .all(|s| (50.0..=150.0).contains(&s.base_price)));
        assert!(config.qty_min <= config.qty_max);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "handler": { "port": 9000, "synthetic": { "interval_ms": 5 } },
                "processing": { "max_orders": 50 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.handler.port, 9000);
        assert_eq!(config.handler.synthetic.interval_ms, 5);
        assert_eq!(config.handler.synthetic.symbols, SyntheticConfig::default().symbols);
        assert_eq!(config.handler.core, Some(3));
        assert!(config.handler.synthetic_enabled);
        assert_eq!(config.processing.max_orders, Some(50));
        assert_eq!(config.processing.spin_iterations, 64);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_saved_config_loads_back() {
        let mut config = AppConfig::default();
        config.handler.bind_ip = "127.0.0.1".parse().unwrap();
        config.processing.core = None;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, config.to_json().unwrap()).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_config_errors() {
        assert!(matches!(
            AppConfig::from_json(r#"{ "handler": { "port": "eighty" } }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AppConfig::load("/nonexistent/flash-feed.json"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_processing_defaults() {
        let config = ProcessingConfig::default();
        assert_eq!(config.idle_sleep(), Duration::from_millis(1));
        assert_eq!(config.max_orders, None);
    }
}
