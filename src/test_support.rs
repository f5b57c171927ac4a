//! Recording doubles for the coordinator's collaborators

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::audio::{AudioBackend, AudioError, MuteCallback};
use crate::bindings::ControlId;
use crate::controller::LedSurface;
use crate::drivers::{InputSettings, OutputStatus, RemoteControl, RemoteEvent};
use crate::media_keys::{MediaKey, MediaKeys};
use crate::sources::Role;

/// Mutating call made against [`MockRemote`]
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    SetCurrentScene(String),
    ToggleInputMute(String),
    SetInputVolume(String, f32),
    ToggleStream,
    SaveReplayBuffer,
}

#[derive(Default)]
struct RemoteState {
    scenes: Vec<String>,
    current_scene: String,
    specials: Vec<(Role, String)>,
    settings: HashMap<String, InputSettings>,
    muted: HashMap<String, bool>,
    status: OutputStatus,
    calls: Vec<RemoteCall>,
    failed: Vec<RemoteCall>,
    fail_specials: bool,
    fail_volume_writes: usize,
    fail_stream_toggles: usize,
    events: Option<mpsc::UnboundedSender<RemoteEvent>>,
    disconnects: usize,
}

/// Side effect run from inside a mock call
pub type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct MockRemote {
    state: Mutex<RemoteState>,
    scene_list_hook: Mutex<Option<Hook>>,
    call_hook: Mutex<Option<Hook>>,
}

impl MockRemote {
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    pub fn failed_calls(&self) -> Vec<RemoteCall> {
        self.state.lock().failed.clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.lock().disconnects
    }

    pub fn set_scenes(&self, scenes: &[&str]) {
        self.state.lock().scenes = scenes.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_current_scene_name(&self, name: &str) {
        self.state.lock().current_scene = name.to_string();
    }

    pub fn set_specials(&self, specials: Vec<(Role, String)>) {
        self.state.lock().specials = specials;
    }

    pub fn set_input_settings(&self, input: &str, settings: InputSettings) {
        self.state.lock().settings.insert(input.to_string(), settings);
    }

    pub fn set_input_muted(&self, input: &str, muted: bool) {
        self.state.lock().muted.insert(input.to_string(), muted);
    }

    pub fn set_output_status(&self, status: OutputStatus) {
        self.state.lock().status = status;
    }

    pub fn fail_specials(&self) {
        self.state.lock().fail_specials = true;
    }

    pub fn fail_next_volume_writes(&self, count: usize) {
        self.state.lock().fail_volume_writes = count;
    }

    pub fn fail_next_stream_toggles(&self, count: usize) {
        self.state.lock().fail_stream_toggles = count;
    }

    /// Push an event to the subscriber, if any
    pub fn emit(&self, event: RemoteEvent) -> bool {
        match &self.state.lock().events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Run `hook` whenever the scene list is read
    pub fn on_scene_list(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.scene_list_hook.lock() = Some(Arc::new(hook));
    }

    /// Run `hook` whenever a mutating call is recorded
    pub fn on_call(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.call_hook.lock() = Some(Arc::new(hook));
    }

    fn record(&self, call: RemoteCall) {
        self.state.lock().calls.push(call);
        let hook = self.call_hook.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[async_trait]
impl RemoteControl for MockRemote {
    async fn scene_list(&self) -> Result<Vec<String>> {
        let hook = self.scene_list_hook.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(self.state.lock().scenes.clone())
    }

    async fn current_scene(&self) -> Result<String> {
        Ok(self.state.lock().current_scene.clone())
    }

    async fn set_current_scene(&self, name: &str) -> Result<()> {
        self.record(RemoteCall::SetCurrentScene(name.to_string()));
        self.state.lock().current_scene = name.to_string();
        Ok(())
    }

    async fn special_sources(&self) -> Result<Vec<(Role, String)>> {
        let state = self.state.lock();
        if state.fail_specials {
            anyhow::bail!("specials unavailable");
        }
        Ok(state.specials.clone())
    }

    async fn input_settings(&self, input: &str) -> Result<InputSettings> {
        self.state
            .lock()
            .settings
            .get(input)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no input named '{}'", input))
    }

    async fn input_muted(&self, input: &str) -> Result<bool> {
        Ok(self.state.lock().muted.get(input).copied().unwrap_or(false))
    }

    async fn toggle_input_mute(&self, input: &str) -> Result<()> {
        self.record(RemoteCall::ToggleInputMute(input.to_string()));
        let mut state = self.state.lock();
        let muted = state.muted.entry(input.to_string()).or_insert(false);
        *muted = !*muted;
        Ok(())
    }

    async fn set_input_volume(&self, input: &str, volume: f32) -> Result<()> {
        let call = RemoteCall::SetInputVolume(input.to_string(), volume);
        self.record(call.clone());
        let mut state = self.state.lock();
        if state.fail_volume_writes > 0 {
            state.fail_volume_writes -= 1;
            state.failed.push(call);
            anyhow::bail!("volume write rejected");
        }
        Ok(())
    }

    async fn toggle_stream(&self) -> Result<()> {
        self.record(RemoteCall::ToggleStream);
        let mut state = self.state.lock();
        if state.fail_stream_toggles > 0 {
            state.fail_stream_toggles -= 1;
            state.failed.push(RemoteCall::ToggleStream);
            anyhow::bail!("stream toggle rejected");
        }
        Ok(())
    }

    async fn save_replay_buffer(&self) -> Result<()> {
        self.record(RemoteCall::SaveReplayBuffer);
        Ok(())
    }

    async fn output_status(&self) -> Result<OutputStatus> {
        Ok(self.state.lock().status)
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<RemoteEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().events = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.events = None;
        state.disconnects += 1;
        Ok(())
    }
}

#[derive(Default)]
struct AudioState {
    volume: f32,
    muted: bool,
    volume_writes: Vec<f32>,
    mute_writes: Vec<bool>,
    disposals: usize,
}

/// Mixer endpoint that records every write
#[derive(Default)]
pub struct RecordingAudio {
    state: Mutex<AudioState>,
    callback: Mutex<Option<MuteCallback>>,
}

impl RecordingAudio {
    pub fn volume_writes(&self) -> Vec<f32> {
        self.state.lock().volume_writes.clone()
    }

    pub fn mute_writes(&self) -> Vec<bool> {
        self.state.lock().mute_writes.clone()
    }

    pub fn dispose_count(&self) -> usize {
        self.state.lock().disposals
    }

    /// Change the mute state as another application would
    pub fn set_muted_externally(&self, muted: bool) {
        self.state.lock().muted = muted;
        if let Some(callback) = self.callback.lock().as_ref() {
            callback(muted);
        }
    }
}

impl AudioBackend for RecordingAudio {
    fn name(&self) -> &str {
        "recording"
    }

    fn volume(&self) -> Result<f32, AudioError> {
        Ok(self.state.lock().volume)
    }

    fn set_volume(&self, percent: f32) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.volume = percent;
        state.volume_writes.push(percent);
        Ok(())
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        Ok(self.state.lock().muted)
    }

    fn set_muted(&self, muted: bool) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.muted = muted;
        state.mute_writes.push(muted);
        Ok(())
    }

    fn subscribe_mute(&self, callback: MuteCallback) {
        *self.callback.lock() = Some(callback);
    }

    fn dispose(&self) -> Result<(), AudioError> {
        self.state.lock().disposals += 1;
        Ok(())
    }
}

/// LED surface that remembers the last state per LED and every write
#[derive(Default)]
pub struct RecordingSurface {
    leds: Mutex<HashMap<ControlId, bool>>,
    writes: Mutex<Vec<(ControlId, bool)>>,
    releases: Mutex<usize>,
}

impl RecordingSurface {
    pub fn led(&self, control: ControlId) -> Option<bool> {
        self.leds.lock().get(&control).copied()
    }

    pub fn writes(&self) -> Vec<(ControlId, bool)> {
        self.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    pub fn release_count(&self) -> usize {
        *self.releases.lock()
    }
}

impl LedSurface for RecordingSurface {
    fn set_led(&self, control: ControlId, on: bool) -> Result<()> {
        if *self.releases.lock() > 0 {
            anyhow::bail!("surface released");
        }
        self.leds.lock().insert(control, on);
        self.writes.lock().push((control, on));
        Ok(())
    }

    fn release(&self) -> Result<()> {
        *self.releases.lock() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMedia {
    presses: Mutex<Vec<MediaKey>>,
}

impl RecordingMedia {
    pub fn presses(&self) -> Vec<MediaKey> {
        self.presses.lock().clone()
    }
}

impl MediaKeys for RecordingMedia {
    fn press(&self, key: MediaKey) -> Result<()> {
        self.presses.lock().push(key);
        Ok(())
    }
}
