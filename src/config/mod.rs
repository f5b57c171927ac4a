//! Configuration for the nanoKONTROL OBS bridge
//!
//! Loaded once at startup from a YAML file. Structural problems are fatal;
//! individual binding entries are validated later by the binding table and
//! skipped with a warning when malformed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// File name looked up in the working and config directories
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub obs: ObsConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub bindings: BindingsConfig,
}

/// OBS WebSocket configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObsConfig {
    #[serde(default = "default_obs_host")]
    pub host: String,
    #[serde(default = "default_obs_port")]
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_obs_host(),
            port: default_obs_port(),
            password: None,
        }
    }
}

/// nanoKONTROL2 port selection and LED range
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Case-insensitive substring of the MIDI port names
    #[serde(default = "default_port_pattern")]
    pub port_pattern: String,
    /// First LED address touched by the self-test and shutdown
    #[serde(default = "default_led_first")]
    pub led_first: u8,
    #[serde(default = "default_led_last")]
    pub led_last: u8,
    /// Delay between self-test steps (ms)
    #[serde(default = "default_sweep_step_ms")]
    pub sweep_step_ms: u64,
}

impl ControllerConfig {
    pub fn leds(&self) -> std::ops::RangeInclusive<u8> {
        self.led_first..=self.led_last
    }

    pub fn sweep_step(&self) -> Duration {
        Duration::from_millis(self.sweep_step_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port_pattern: default_port_pattern(),
            led_first: default_led_first(),
            led_last: default_led_last(),
            sweep_step_ms: default_sweep_step_ms(),
        }
    }
}

/// Event clock settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClockConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
    /// Upper bound for a single outbound call (ms)
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Extra attempts for a failed volume write
    #[serde(default = "default_volume_retries")]
    pub volume_retries: u32,
}

impl ClockConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            call_timeout_ms: default_call_timeout_ms(),
            volume_retries: default_volume_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// Raw binding entries, validated by [`crate::bindings::BindingTable`]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BindingsConfig {
    #[serde(default)]
    pub inputs: Vec<InputBindingConfig>,
    #[serde(default)]
    pub outputs: Vec<OutputBindingConfig>,
}

/// `{ control, kind, action }`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputBindingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// `{ control, event, source?, sceneindex? }`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputBindingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sceneindex: Option<Value>,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Replace the OBS password when `OBS_PASSWORD` is set
    pub fn apply_env(&mut self) {
        if let Ok(password) = std::env::var("OBS_PASSWORD") {
            if !password.is_empty() {
                self.obs.password = Some(password);
            }
        }
    }

    /// Validate structural settings
    pub fn validate(&self) -> Result<()> {
        if self.obs.host.trim().is_empty() {
            anyhow::bail!("obs.host cannot be empty");
        }
        if self.obs.port == 0 {
            anyhow::bail!("obs.port cannot be 0");
        }

        if self.controller.port_pattern.trim().is_empty() {
            anyhow::bail!("controller.port_pattern cannot be empty");
        }
        if self.controller.led_first > self.controller.led_last {
            anyhow::bail!(
                "controller.led_first ({}) must not exceed led_last ({})",
                self.controller.led_first,
                self.controller.led_last
            );
        }
        if self.controller.led_last > 127 {
            anyhow::bail!(
                "controller.led_last {} is not a MIDI control number (0-127)",
                self.controller.led_last
            );
        }

        if !(1..=1000).contains(&self.clock.tick_rate_hz) {
            anyhow::bail!(
                "clock.tick_rate_hz {} is out of range (1-1000)",
                self.clock.tick_rate_hz
            );
        }
        if self.clock.call_timeout_ms == 0 {
            anyhow::bail!("clock.call_timeout_ms cannot be 0");
        }

        Ok(())
    }
}

/// Locate the configuration file
///
/// An explicit path wins; otherwise `config.yaml` in the working directory,
/// then in the platform config directory.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join(env!("CARGO_PKG_NAME")).join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    anyhow::bail!(
        "No {} found in the working directory or {}",
        CONFIG_FILE_NAME,
        dirs::config_dir()
            .map(|d| d.join(env!("CARGO_PKG_NAME")).display().to_string())
            .unwrap_or_else(|| "the user config directory".to_string())
    )
}

fn default_obs_host() -> String { "localhost".to_string() }
fn default_obs_port() -> u16 { 4455 }
fn default_port_pattern() -> String { "nano".to_string() }
fn default_led_first() -> u8 { 16 }
fn default_led_last() -> u8 { 69 }
fn default_sweep_step_ms() -> u64 { 25 }
fn default_tick_rate_hz() -> u32 { 20 }
fn default_call_timeout_ms() -> u64 { 1000 }
fn default_volume_retries() -> u32 { 1 }
