//! Local audio mixer backends
//!
//! One backend controls one physical or virtual endpoint. Volumes are percent
//! (0-100). Backends are synchronous; the event clock calls them from blocking
//! tasks so a slow mixer never stalls the runtime.

mod command;
#[cfg(windows)]
mod wasapi;

pub use command::{CommandMixer, MixerTool, PulseDirection};

use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Callback invoked with the new mute state
pub type MuteCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Errors raised by mixer backends
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("unsupported audio device: {0}")]
    Unsupported(String),
    #[error("invalid device id '{0}'")]
    InvalidDeviceId(String),
    #[error("mixer command failed: {0}")]
    CommandFailed(String),
    #[error("mixer command timed out: {0}")]
    TimedOut(String),
    #[error("could not parse mixer output: {0}")]
    Parse(String),
    #[error("platform audio error: {0}")]
    Platform(String),
    #[error("audio backend already disposed")]
    Disposed,
}

/// Control surface of a single mixer endpoint
pub trait AudioBackend: Send + Sync {
    /// Short description for logs
    fn name(&self) -> &str;

    /// Current volume in percent
    fn volume(&self) -> Result<f32, AudioError>;

    fn set_volume(&self, percent: f32) -> Result<(), AudioError>;

    fn is_muted(&self) -> Result<bool, AudioError>;

    fn set_muted(&self, muted: bool) -> Result<(), AudioError>;

    /// Flip the mute state, returning the new state
    fn toggle_mute(&self) -> Result<bool, AudioError> {
        let muted = !self.is_muted()?;
        self.set_muted(muted)?;
        Ok(muted)
    }

    /// Register for mute changes made outside this process
    ///
    /// Default: no push support. Such backends are covered by the clock's
    /// periodic mute polling.
    fn subscribe_mute(&self, _callback: MuteCallback) {}

    fn dispose(&self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Backend for roles without a usable device
///
/// Accepts every call and changes nothing, so callers never branch on the
/// backend type.
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn name(&self) -> &str {
        "none"
    }

    fn volume(&self) -> Result<f32, AudioError> {
        Ok(0.0)
    }

    fn set_volume(&self, _percent: f32) -> Result<(), AudioError> {
        Ok(())
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        Ok(false)
    }

    fn set_muted(&self, _muted: bool) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Pick the backend for an OBS input
///
/// `kind` is the OBS input kind (e.g. `wasapi_output_capture`,
/// `alsa_input_capture`, `pulse_input_capture`), `device_id` the input's
/// `device_id` setting.
pub fn select_backend(
    kind: &str,
    device_id: Option<&str>,
) -> Result<Arc<dyn AudioBackend>, AudioError> {
    let device_id = device_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AudioError::Unsupported(format!("{} input without device_id", kind)))?;

    select_platform_backend(kind, device_id)
}

#[cfg(windows)]
fn select_platform_backend(
    kind: &str,
    device_id: &str,
) -> Result<Arc<dyn AudioBackend>, AudioError> {
    if !kind.starts_with("wasapi") {
        return Err(AudioError::Unsupported(format!("'{}' on Windows", kind)));
    }
    if device_id != "default" && !is_valid_endpoint_id(device_id) {
        return Err(AudioError::InvalidDeviceId(device_id.to_string()));
    }

    let flow = if kind.contains("output") {
        wasapi::Flow::Render
    } else {
        wasapi::Flow::Capture
    };
    Ok(Arc::new(wasapi::WasapiEndpoint::open(device_id, flow)?))
}

#[cfg(target_os = "linux")]
fn select_platform_backend(
    kind: &str,
    device_id: &str,
) -> Result<Arc<dyn AudioBackend>, AudioError> {
    let tool = if kind.starts_with("alsa") {
        MixerTool::Amixer {
            card: device_id.to_string(),
            control: "PCM".to_string(),
        }
    } else if kind.starts_with("pulse") {
        let direction = if kind.contains("output") {
            PulseDirection::Sink
        } else {
            PulseDirection::Source
        };
        MixerTool::Pactl {
            device: device_id.to_string(),
            direction,
        }
    } else {
        return Err(AudioError::Unsupported(format!("'{}' on Linux", kind)));
    };

    Ok(Arc::new(CommandMixer::new(tool)))
}

#[cfg(not(any(windows, target_os = "linux")))]
fn select_platform_backend(
    kind: &str,
    _device_id: &str,
) -> Result<Arc<dyn AudioBackend>, AudioError> {
    Err(AudioError::Unsupported(format!(
        "'{}' on {}",
        kind,
        std::env::consts::OS
    )))
}

/// Check an OBS WASAPI `device_id` (`{0.0.1.00000000}.{guid}`)
pub fn is_valid_endpoint_id(device_id: &str) -> bool {
    device_id_pattern().is_match(device_id)
}

fn device_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\{[0-9a-z.\-]+\}\.\{[0-9a-z\-]+\}$")
            .expect("invariant: static device id pattern compiles")
    })
}
