//! Remote control plane (OBS)
//!
//! The coordinator and the event clock only talk to OBS through
//! [`RemoteControl`], so tests can substitute a recording double.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::sources::Role;

pub mod obs;

pub use obs::ObsRemote;

/// Push notification from the remote backend
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    InputMuteChanged { source: String, muted: bool },
    CurrentSceneChanged { name: String },
    /// Scene list in display order, fetched after the change
    SceneListChanged { scenes: Vec<String> },
    StreamStateChanged { active: bool },
    ReplayStateChanged { active: bool },
    /// Connection lost or OBS shutting down
    Disconnected { reason: String },
}

/// Input kind and device of an OBS audio input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSettings {
    /// OBS input kind, e.g. `wasapi_input_capture`
    pub kind: String,
    /// `device_id` setting, absent for inputs without a device
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStatus {
    pub streaming: bool,
    pub recording: bool,
    pub replay_buffer: bool,
}

/// RPC surface of the streaming backend
///
/// All methods take `&self`; implementations use interior mutability so the
/// client can be shared as `Arc<dyn RemoteControl>`.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    /// Scene names in display order (top of the OBS scene list first)
    async fn scene_list(&self) -> Result<Vec<String>>;

    async fn current_scene(&self) -> Result<String>;

    async fn set_current_scene(&self, name: &str) -> Result<()>;

    /// OBS special inputs mapped to their roles
    async fn special_sources(&self) -> Result<Vec<(Role, String)>>;

    async fn input_settings(&self, input: &str) -> Result<InputSettings>;

    async fn input_muted(&self, input: &str) -> Result<bool>;

    async fn toggle_input_mute(&self, input: &str) -> Result<()>;

    /// Set input volume as a 0.0-1.0 multiplier
    async fn set_input_volume(&self, input: &str, volume: f32) -> Result<()>;

    async fn toggle_stream(&self) -> Result<()>;

    async fn save_replay_buffer(&self) -> Result<()>;

    async fn output_status(&self) -> Result<OutputStatus>;

    /// Start forwarding push events
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<RemoteEvent>>;

    /// Close the connection. Calling it again does nothing.
    async fn disconnect(&self) -> Result<()>;
}
