//! Execution of buffered calls against OBS and the local mixer

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{Call, VolumeTarget};
use crate::audio::{AudioBackend, AudioError};
use crate::drivers::RemoteControl;
use crate::sources::{LocalMuteEvent, Role, SourceRegistry};

/// Reasons a call was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("event clock disposed")]
    Stopped,
    #[error("{0} mixer is still busy with an earlier call")]
    MixerBusy(Role),
}

/// Performs the outbound I/O of one tick
pub struct Dispatcher {
    remote: Arc<dyn RemoteControl>,
    registry: Arc<SourceRegistry>,
    local_events: Option<mpsc::UnboundedSender<LocalMuteEvent>>,
    call_timeout: Duration,
    volume_retries: u32,
    /// Set once by the clock's dispose; no call starts afterwards
    stopped: Arc<AtomicBool>,
    last_local_mute: Mutex<[Option<bool>; Role::COUNT]>,
    /// Mixer calls still running, possibly past their timeout
    mixer_busy: Arc<[AtomicBool; Role::COUNT]>,
}

/// Clears a role's busy flag when the blocking mixer call ends
struct BusyGuard {
    flags: Arc<[AtomicBool; Role::COUNT]>,
    slot: usize,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flags[self.slot].store(false, Ordering::SeqCst);
    }
}

impl Dispatcher {
    pub fn new(
        remote: Arc<dyn RemoteControl>,
        registry: Arc<SourceRegistry>,
        call_timeout: Duration,
        volume_retries: u32,
    ) -> Self {
        Self {
            remote,
            registry,
            local_events: None,
            call_timeout,
            volume_retries,
            stopped: Arc::new(AtomicBool::new(false)),
            last_local_mute: Mutex::new([None; Role::COUNT]),
            mixer_busy: Arc::new(std::array::from_fn(|_| AtomicBool::new(false))),
        }
    }

    pub(super) fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(DispatchError::Stopped.into());
        }
        Ok(())
    }

    /// Report local mute changes (from toggles and polling) to `tx`
    pub fn with_local_events(mut self, tx: mpsc::UnboundedSender<LocalMuteEvent>) -> Self {
        self.local_events = Some(tx);
        self
    }

    /// Execute a discrete call once. Never retried.
    pub async fn execute(&self, call: &Call) -> Result<()> {
        match call {
            Call::ToggleRemoteMute { source } => {
                self.timed("toggle input mute", self.remote.toggle_input_mute(source))
                    .await
            },
            Call::ToggleLocalMute(role) => {
                if !self.registry.is_connected(*role) {
                    trace!("{} is not connected, local mute toggle skipped", role);
                    return Ok(());
                }
                let muted = self.mixer(*role, |backend| backend.toggle_mute()).await?;
                self.report_local(*role, muted);
                Ok(())
            },
            Call::SwitchScene(index) => {
                let scenes = self.timed("get scene list", self.remote.scene_list()).await?;
                match scenes.get(*index) {
                    Some(name) => {
                        self.timed("set current scene", self.remote.set_current_scene(name))
                            .await
                    },
                    None => {
                        debug!(
                            "Scene #{} does not exist ({} scenes), switch dropped",
                            index,
                            scenes.len()
                        );
                        Ok(())
                    },
                }
            },
            Call::ToggleStream => self.timed("toggle stream", self.remote.toggle_stream()).await,
            Call::SaveReplayBuffer => {
                self.timed("save replay buffer", self.remote.save_replay_buffer())
                    .await
            },
        }
    }

    /// Write a volume, retrying up to the configured number of extra attempts
    pub async fn set_volume(&self, target: &VolumeTarget, value: f32) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.write_volume(target, value).await {
                Ok(()) => return Ok(()),
                // Calls that were never started are not retried
                Err(e) if attempt < self.volume_retries && e.downcast_ref::<DispatchError>().is_none() => {
                    attempt += 1;
                    debug!("Volume write to {} failed ({:#}), retry {}", target, e, attempt);
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn write_volume(&self, target: &VolumeTarget, value: f32) -> Result<()> {
        match target {
            VolumeTarget::Remote(name) => {
                self.timed("set input volume", self.remote.set_input_volume(name, value))
                    .await
            },
            VolumeTarget::Local(role) => {
                if !self.registry.is_connected(*role) {
                    return Ok(());
                }
                self.mixer(*role, move |backend| backend.set_volume(value)).await
            },
        }
    }

    /// Poll the mute state of every connected local backend
    pub async fn refresh_local(&self) -> Result<()> {
        let mut failures = Vec::new();
        for role in self.registry.connected_roles() {
            match self.mixer(role, |backend| backend.is_muted()).await {
                Ok(muted) => self.report_local(role, muted),
                Err(e) => match e.downcast_ref::<DispatchError>() {
                    Some(DispatchError::Stopped) => break,
                    Some(DispatchError::MixerBusy(_)) => debug!("{:#}, mute poll skipped", e),
                    None => failures.push(format!("{}: {:#}", role, e)),
                },
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("local mute refresh failed ({})", failures.join(", ")))
        }
    }

    /// Last mute state seen for `role`
    pub fn local_muted(&self, role: Role) -> Option<bool> {
        self.last_local_mute.lock()[role.index()]
    }

    fn report_local(&self, role: Role, muted: bool) {
        let changed = {
            let mut last = self.last_local_mute.lock();
            let previous = last[role.index()].replace(muted);
            previous != Some(muted)
        };

        if changed {
            if let Some(tx) = &self.local_events {
                let _ = tx.send(LocalMuteEvent { role, muted });
            }
        }
    }

    async fn timed<T>(&self, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        self.ensure_running()?;
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| anyhow!("{} timed out after {:?}", what, self.call_timeout))?
    }

    /// Run a mixer operation off the runtime threads, bounded by the call timeout
    async fn mixer<T, F>(&self, role: Role, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn AudioBackend) -> Result<T, AudioError> + Send + 'static,
    {
        self.ensure_running()?;

        // At most one call per backend; a timed-out call keeps its slot until it returns
        let slot = role.index();
        if self.mixer_busy[slot].swap(true, Ordering::SeqCst) {
            return Err(DispatchError::MixerBusy(role).into());
        }
        let guard = BusyGuard {
            flags: Arc::clone(&self.mixer_busy),
            slot,
        };

        let backend = Arc::clone(self.registry.get(role).backend());
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            op(backend.as_ref())
        });

        let joined = tokio::time::timeout(self.call_timeout, task)
            .await
            .map_err(|_| anyhow!("{} mixer call timed out after {:?}", role, self.call_timeout))?;
        let result = joined.context("mixer task panicked")?;
        Ok(result.with_context(|| format!("{} mixer call failed", role))?)
    }
}
