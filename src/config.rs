//! TOML configuration for the kiln controller.
//!
//! Loaded once at startup and handed by value into each component's
//! constructor; nothing re-reads configuration mid-run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for the kiln host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Use software stand-ins for the thermocouple and relay.
    #[serde(default)]
    pub simulate: bool,

    /// Peak noise added to simulated temperature readings (°C).
    #[serde(default)]
    pub sim_noise_c: f64,

    #[serde(default)]
    pub pid: PidConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub heater: HeaterConfig,

    #[serde(default)]
    pub mcu: McuConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,
}

/// PID gains for the heating loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PidConfig {
    #[serde(default = "default_p_gain")]
    pub p_gain: f64,
    #[serde(default = "default_i_gain")]
    pub i_gain: f64,
    #[serde(default = "default_d_gain")]
    pub d_gain: f64,
}

/// Safety interlock thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafetyConfig {
    /// Absolute temperature cap (°C).
    #[serde(default = "default_max_temp_c")]
    pub max_temp_c: f64,
    /// Maximum allowed climb rate (°C per minute).
    #[serde(default = "default_max_rate_c_per_min")]
    pub max_rate_c_per_min: f64,
    /// Force the heater off while the sensor reports faults.
    #[serde(default = "default_true")]
    pub abort_on_sensor_fault: bool,
    /// Detect a relay welded ON despite a near-zero command.
    #[serde(default = "default_true")]
    pub stuck_heater_detect: bool,
    /// How long the command must sit near zero before the stuck check fires.
    #[serde(default = "default_stuck_window_s")]
    pub stuck_heater_window_s: u64,
}

/// Relay output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaterConfig {
    /// Time-proportioning window length in seconds.
    #[serde(default = "default_cycle_time_s")]
    pub cycle_time_s: f64,
}

/// Serial link to the MCU carrying the thermocouple and relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McuConfig {
    #[serde(default = "default_serial")]
    pub serial: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Per-exchange response deadline in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Control loop timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    /// Delay before retrying after a sensor fault tick.
    #[serde(default = "default_sensor_fault_backoff_ms")]
    pub sensor_fault_backoff_ms: u64,
    #[serde(default = "default_initial_setpoint_c")]
    pub initial_setpoint_c: f64,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

/// Outbound alert dispatch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub enabled: bool,
}

fn default_p_gain() -> f64 { 10.0 }
fn default_i_gain() -> f64 { 0.5 }
fn default_d_gain() -> f64 { 0.0 }
fn default_max_temp_c() -> f64 { 1250.0 }
fn default_max_rate_c_per_min() -> f64 { 200.0 }
fn default_true() -> bool { true }
fn default_stuck_window_s() -> u64 { 60 }
fn default_cycle_time_s() -> f64 { 2.0 }
fn default_serial() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud() -> u32 { 115200 }
fn default_read_timeout_ms() -> u64 { 250 }
fn default_tick_period_ms() -> u64 { 250 }
fn default_sensor_fault_backoff_ms() -> u64 { 500 }
fn default_initial_setpoint_c() -> f64 { 100.0 }
fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_web_port() -> u16 { 8080 }

impl Default for Config {
    fn default() -> Self {
        Self {
            simulate: false,
            sim_noise_c: 0.0,
            pid: PidConfig::default(),
            safety: SafetyConfig::default(),
            heater: HeaterConfig::default(),
            mcu: McuConfig::default(),
            control: ControlConfig::default(),
            web: WebConfig::default(),
            alerts: AlertsConfig::default(),
        }
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            p_gain: default_p_gain(),
            i_gain: default_i_gain(),
            d_gain: default_d_gain(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_temp_c: default_max_temp_c(),
            max_rate_c_per_min: default_max_rate_c_per_min(),
            abort_on_sensor_fault: true,
            stuck_heater_detect: true,
            stuck_heater_window_s: default_stuck_window_s(),
        }
    }
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self { cycle_time_s: default_cycle_time_s() }
    }
}

impl Default for McuConfig {
    fn default() -> Self {
        Self {
            serial: default_serial(),
            baud: default_baud(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            sensor_fault_backoff_ms: default_sensor_fault_backoff_ms(),
            initial_setpoint_c: default_initial_setpoint_c(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_web_port(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Check value ranges before any hardware is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.safety.max_temp_c < 100.0 {
            return Err(ConfigError::Invalid(format!(
                "safety.max_temp_c must be at least 100, got {}",
                self.safety.max_temp_c
            )));
        }
        if self.safety.max_rate_c_per_min < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "safety.max_rate_c_per_min must be at least 1, got {}",
                self.safety.max_rate_c_per_min
            )));
        }
        if self.heater.cycle_time_s <= 0.0 {
            return Err(ConfigError::Invalid(
                "heater.cycle_time_s must be positive".to_string(),
            ));
        }
        if self.control.tick_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "control.tick_period_ms must be positive".to_string(),
            ));
        }
        if self.sim_noise_c < 0.0 {
            return Err(ConfigError::Invalid(
                "sim_noise_c must not be negative".to_string(),
            ));
        }
        if !self.simulate && self.mcu.serial.is_empty() {
            return Err(ConfigError::Invalid(
                "mcu.serial must be specified unless simulate = true".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.simulate);
        assert_eq!(config.pid.p_gain, 10.0);
        assert_eq!(config.safety.max_temp_c, 1250.0);
        assert_eq!(config.safety.stuck_heater_window_s, 60);
        assert_eq!(config.heater.cycle_time_s, 2.0);
        assert_eq!(config.control.tick_period_ms, 250);
        assert!(config.safety.abort_on_sensor_fault);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_config = r#"
simulate = true

[pid]
p_gain = 25.0
i_gain = 1.0

[safety]
max_temp_c = 1000.0
max_rate_c_per_min = 150.0
stuck_heater_detect = false

[heater]
cycle_time_s = 4.0

[web]
port = 9090
        "#;

        let config: Config = toml::from_str(toml_config).unwrap();
        assert!(config.simulate);
        assert_eq!(config.pid.p_gain, 25.0);
        assert_eq!(config.pid.d_gain, 0.0); // defaults fill the gaps
        assert_eq!(config.safety.max_temp_c, 1000.0);
        assert!(!config.safety.stuck_heater_detect);
        assert_eq!(config.heater.cycle_time_s, 4.0);
        assert_eq!(config.web.port, 9090);
        assert_eq!(config.mcu.baud, 115200);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "simulate = true\n[control]\ntick_period_ms = 100").unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert!(config.simulate);
        assert_eq!(config.control.tick_period_ms, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.safety.max_temp_c = 50.0;
        assert!(config.validate().is_err());
        config.safety.max_temp_c = 1250.0;

        config.safety.max_rate_c_per_min = 0.5;
        assert!(config.validate().is_err());
        config.safety.max_rate_c_per_min = 200.0;

        config.control.tick_period_ms = 0;
        assert!(config.validate().is_err());
        config.control.tick_period_ms = 250;

        config.mcu.serial = String::new();
        assert!(config.validate().is_err());
        config.simulate = true;
        assert!(config.validate().is_ok());
    }
}
