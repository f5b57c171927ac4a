//! LED feedback: reactions, scene indicators, self-test and initial state

use anyhow::{Context, Result};
use tracing::{debug, trace, warn};

use super::Coordinator;
use crate::bindings::Trigger;
use crate::sources::Role;

/// Scenes that can have an indicator LED
pub const SCENE_INDICATORS: usize = 8;

impl Coordinator {
    /// Light or darken the LED bound to `trigger`, if any
    pub(super) fn drive(&self, trigger: Trigger, on: bool) {
        let Some(led) = self.bindings.led_for(trigger) else {
            trace!("No LED bound to {}", trigger);
            return;
        };
        if let Err(e) = self.surface.set_led(led, on) {
            warn!("Failed to set LED {} for {}: {:#}", led, trigger, e);
        }
    }

    /// Light the indicator of the current scene and darken the others
    pub(super) fn update_scene_leds(&self) {
        let current = self.current_scene.as_deref();
        for index in 0..SCENE_INDICATORS {
            let active = current.is_some() && self.scenes.get(index).map(String::as_str) == current;
            self.drive(Trigger::SceneSwitched(index), active);
        }
    }

    /// Set every LED in the configured range, logging failures
    pub(super) fn all_leds(&self, on: bool) {
        let mut failures = 0;
        for led in self.leds.clone() {
            if self.surface.set_led(led, on).is_err() {
                failures += 1;
            }
        }
        if failures > 0 {
            warn!("{} LED writes failed", failures);
        }
    }

    /// All off, sweep on one by one, all off
    ///
    /// Any failed write aborts the test: the controller is not usable.
    pub async fn led_self_test(&self) -> Result<()> {
        debug!("LED self-test over {:?}", self.leds);

        for led in self.leds.clone() {
            self.surface
                .set_led(led, false)
                .with_context(|| format!("LED {} self-test failed", led))?;
        }
        for led in self.leds.clone() {
            self.surface
                .set_led(led, true)
                .with_context(|| format!("LED {} self-test failed", led))?;
            tokio::time::sleep(self.sweep_step).await;
        }
        for led in self.leds.clone() {
            self.surface
                .set_led(led, false)
                .with_context(|| format!("LED {} self-test failed", led))?;
        }
        Ok(())
    }

    /// Query OBS once and bring every LED in line with it
    ///
    /// Local mute LEDs follow on the first clock tick, which reports the
    /// polled state of every connected role. A disconnected role starts dark.
    pub async fn initialise_leds(&mut self) {
        for role in Role::ALL {
            if !self.registry.is_connected(role) {
                self.drive(Trigger::RemoteMuteChanged(role), false);
                continue;
            }
            let Some(name) = self.registry.get(role).remote_name() else {
                continue;
            };
            match self.remote.input_muted(name).await {
                Ok(muted) => self.drive(Trigger::RemoteMuteChanged(role), !muted),
                Err(e) => warn!("Failed to read mute state of '{}': {:#}", name, e),
            }
        }

        match self.remote.scene_list().await {
            Ok(scenes) => self.scenes = scenes,
            Err(e) => warn!("Failed to read scene list: {:#}", e),
        }
        match self.remote.current_scene().await {
            Ok(name) => self.current_scene = Some(name),
            Err(e) => warn!("Failed to read current scene: {:#}", e),
        }
        self.update_scene_leds();

        match self.remote.output_status().await {
            Ok(status) => {
                self.drive(Trigger::StreamStateChanged, status.streaming);
                self.drive(Trigger::ReplayStateChanged, status.replay_buffer);
            },
            Err(e) => warn!("Failed to read output status: {:#}", e),
        }
    }
}
