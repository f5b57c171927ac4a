//! Event coordinator
//!
//! Single owner of the binding table, the source registry and the event
//! clock. One dispatch loop consumes three inbound channels:
//! - controller events, turned into clock submissions (or media keys)
//! - OBS push events, turned into LED updates
//! - local mixer mute changes, turned into LED updates
//!
//! Handlers never perform network or mixer I/O themselves.

mod leds;

#[cfg(test)]
mod tests;

use anyhow::Result;
use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::bindings::{map_controller_value, Action, BindingTable, ControlId, Trigger};
use crate::clock::{Call, EventClock, VolumeTarget};
use crate::config::ControllerConfig;
use crate::controller::{ControlEvent, LedSurface};
use crate::drivers::{RemoteControl, RemoteEvent};
use crate::media_keys::{MediaKey, MediaKeys};
use crate::sources::{LocalMuteEvent, SourceRegistry};

/// Remote volume range (OBS multiplier)
const REMOTE_VOLUME: (f64, f64) = (0.0, 1.0);
/// Local volume range (mixer percent)
const LOCAL_VOLUME: (f64, f64) = (0.0, 100.0);

/// What the dispatch loop does after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown(String),
}

/// External systems the coordinator drives
pub struct Collaborators {
    pub remote: Arc<dyn RemoteControl>,
    pub registry: Arc<SourceRegistry>,
    pub surface: Arc<dyn LedSurface>,
    pub media: Arc<dyn MediaKeys>,
}

pub struct Coordinator {
    bindings: BindingTable,
    remote: Arc<dyn RemoteControl>,
    registry: Arc<SourceRegistry>,
    surface: Arc<dyn LedSurface>,
    media: Arc<dyn MediaKeys>,
    clock: EventClock,
    leds: RangeInclusive<ControlId>,
    sweep_step: Duration,
    /// Scene names in display order
    scenes: Vec<String>,
    current_scene: Option<String>,
    shut_down: AtomicBool,
}

impl Coordinator {
    pub fn new(
        bindings: BindingTable,
        collaborators: Collaborators,
        clock: EventClock,
        controller: &ControllerConfig,
    ) -> Self {
        Self {
            bindings,
            remote: collaborators.remote,
            registry: collaborators.registry,
            surface: collaborators.surface,
            media: collaborators.media,
            clock,
            leds: controller.leds(),
            sweep_step: controller.sweep_step(),
            scenes: Vec::new(),
            current_scene: None,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn clock(&self) -> &EventClock {
        &self.clock
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn start_clock(&self) {
        self.clock.start();
    }

    /// Translate a controller event into a buffered call
    pub fn on_control_event(&self, event: ControlEvent) {
        let Some(action) = self.bindings.action(event.control) else {
            trace!("Control {} is unbound", event.control);
            return;
        };

        // Buttons send 127 on press and 0 on release
        if !action.is_continuous() && event.value == 0 {
            return;
        }

        if let Some(role) = action.role() {
            if !self.registry.is_connected(role) {
                debug!("{} ignored: {} is not connected", action, role);
                return;
            }
        }

        match action {
            Action::SetRemoteVolume(role) => {
                if let Some(name) = self.registry.command_target(role) {
                    let volume = map_controller_value(event.value, REMOTE_VOLUME.0, REMOTE_VOLUME.1);
                    self.clock
                        .set_volume(VolumeTarget::Remote(name.to_string()), volume as f32);
                }
            },
            Action::SetLocalVolume(role) => {
                let volume = map_controller_value(event.value, LOCAL_VOLUME.0, LOCAL_VOLUME.1);
                self.clock.set_volume(VolumeTarget::Local(role), volume as f32);
            },
            Action::ToggleRemoteMute(role) => {
                if let Some(name) = self.registry.command_target(role) {
                    self.clock.submit(Call::ToggleRemoteMute {
                        source: name.to_string(),
                    });
                }
            },
            Action::ToggleLocalMute(role) => self.clock.submit(Call::ToggleLocalMute(role)),
            Action::SwitchScene(index) => self.clock.submit(Call::SwitchScene(index)),
            Action::ToggleStream => self.clock.submit(Call::ToggleStream),
            Action::SaveReplayBuffer => self.clock.submit(Call::SaveReplayBuffer),
            Action::PreviousTrack => self.press(MediaKey::PreviousTrack),
            Action::NextTrack => self.press(MediaKey::NextTrack),
            Action::PlayPause => self.press(MediaKey::PlayPause),
        }
    }

    fn press(&self, key: MediaKey) {
        if let Err(e) = self.media.press(key) {
            warn!("Failed to send media key {}: {:#}", key, e);
        }
    }

    /// Reflect an OBS push event on the LEDs
    pub fn on_remote_event(&mut self, event: RemoteEvent) -> Flow {
        match event {
            RemoteEvent::InputMuteChanged { source, muted } => {
                if let Some(role) = self.registry.role_for_remote(&source) {
                    // Lit means live
                    self.drive(Trigger::RemoteMuteChanged(role), !muted);
                }
            },
            RemoteEvent::CurrentSceneChanged { name } => {
                self.current_scene = Some(name);
                self.update_scene_leds();
            },
            RemoteEvent::SceneListChanged { scenes } => {
                debug!("Scene list changed ({} scenes)", scenes.len());
                self.scenes = scenes;
                self.update_scene_leds();
            },
            RemoteEvent::StreamStateChanged { active } => {
                self.drive(Trigger::StreamStateChanged, active);
            },
            RemoteEvent::ReplayStateChanged { active } => {
                self.drive(Trigger::ReplayStateChanged, active);
            },
            RemoteEvent::Disconnected { reason } => {
                warn!("OBS disconnected: {}", reason);
                return Flow::Shutdown(reason);
            },
        }
        Flow::Continue
    }

    /// Reflect a local mixer mute change on the LEDs
    pub fn on_local_mute(&self, event: LocalMuteEvent) {
        // Lit means muted, the opposite of the OBS mute LED
        self.drive(Trigger::LocalMuteChanged(event.role), event.muted);
    }

    /// Dispatch loop. Returns after shutdown has completed.
    pub async fn run(
        mut self,
        mut controls: mpsc::Receiver<ControlEvent>,
        mut remote_events: mpsc::UnboundedReceiver<RemoteEvent>,
        mut local_events: mpsc::UnboundedReceiver<LocalMuteEvent>,
        stop: impl Future<Output = ()>,
    ) -> Result<()> {
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => {
                    crate::status!("Shutdown requested");
                    break;
                },
                control = controls.recv() => match control {
                    Some(event) => self.on_control_event(event),
                    None => {
                        error!("Controller input closed");
                        break;
                    },
                },
                remote = remote_events.recv() => {
                    let event = remote.unwrap_or(RemoteEvent::Disconnected {
                        reason: "event channel closed".to_string(),
                    });
                    if let Flow::Shutdown(_) = self.on_remote_event(event) {
                        break;
                    }
                },
                Some(local) = local_events.recv() => self.on_local_mute(local),
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Tear everything down. Best effort, runs once.
    ///
    /// Order: clock, LEDs off, controller, OBS connection, local mixers.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        crate::status!("Shutting down");

        self.clock.dispose();

        self.all_leds(false);
        if let Err(e) = self.surface.release() {
            warn!("Failed to close controller: {:#}", e);
        }

        if let Err(e) = self.remote.disconnect().await {
            warn!("Failed to disconnect from OBS: {:#}", e);
        }

        self.registry.dispose();
        crate::status!("Shutdown complete");
    }
}
