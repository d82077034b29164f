use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

/// Listen address for the HTTP surface
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BasicSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for BasicSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogSettings {
    /// Default directive when RUST_LOG is unset (default: info)
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Event bus sizing and dead-letter retention
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BusSettings {
    /// Ring buffer capacity for recent events (default: 5000)
    #[serde(default = "default_max_event_history")]
    pub max_event_history: usize,
    /// Dead-letter queue capacity (default: 1000)
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
    /// Dead letters older than this are swept (default: 24)
    #[serde(default = "default_retention_hours")]
    pub dead_letter_retention_hours: i64,
    /// Background sweep period (default: 3600)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Maximum nesting of emits triggered from handlers (default: 32)
    #[serde(default = "default_max_dispatch_depth")]
    pub max_dispatch_depth: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            max_event_history: default_max_event_history(),
            dead_letter_capacity: default_dead_letter_capacity(),
            dead_letter_retention_hours: default_retention_hours(),
            sweep_interval_secs: default_sweep_interval(),
            max_dispatch_depth: default_max_dispatch_depth(),
        }
    }
}

fn default_max_event_history() -> usize {
    5000
}

fn default_dead_letter_capacity() -> usize {
    1000
}

fn default_retention_hours() -> i64 {
    24
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_max_dispatch_depth() -> usize {
    32
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub basic: BasicSettings,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub bus: BusSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with defaults
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (not tracked by git)
            .add_source(File::with_name("config/local").required(false))
            // e.g. MAVERICKS__BUS__MAX_EVENT_HISTORY=10000
            .add_source(Environment::with_prefix("MAVERICKS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings: Settings = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.basic.port, 5000);
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.bus.max_event_history, 5000);
        assert_eq!(settings.bus.dead_letter_retention_hours, 24);
    }

    #[test]
    fn test_partial_override() {
        let settings: Settings = Config::builder()
            .set_override("bus.max_event_history", 10)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.bus.max_event_history, 10);
        assert_eq!(settings.bus.dead_letter_capacity, 1000);
    }
}
