//! Pending-write buffer shared by the submit side and the tick

use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::sources::Role;

/// One-shot call, executed exactly once in submission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Toggle mute of an OBS input
    ToggleRemoteMute { source: String },
    ToggleLocalMute(Role),
    /// Switch to the scene at this display index, resolved when executed
    SwitchScene(usize),
    ToggleStream,
    SaveReplayBuffer,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::ToggleRemoteMute { source } => write!(f, "toggle mute '{}'", source),
            Call::ToggleLocalMute(role) => write!(f, "toggle local mute {}", role),
            Call::SwitchScene(index) => write!(f, "switch to scene #{}", index),
            Call::ToggleStream => f.write_str("toggle stream"),
            Call::SaveReplayBuffer => f.write_str("save replay buffer"),
        }
    }
}

/// Coalescing key of a volume write
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum VolumeTarget {
    /// OBS input name; value is a 0.0-1.0 multiplier
    Remote(String),
    /// Local mixer endpoint; value is percent
    Local(Role),
}

impl fmt::Display for VolumeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeTarget::Remote(name) => write!(f, "'{}'", name),
            VolumeTarget::Local(role) => write!(f, "local {}", role),
        }
    }
}

#[derive(Default)]
struct Pending {
    calls: VecDeque<Call>,
    volumes: BTreeMap<VolumeTarget, f32>,
}

/// Discrete call queue plus latest-value volume map
///
/// Every access holds the lock for the duration of a push or a take, so a
/// submit racing a drain lands either in the drained batch or in the next one.
#[derive(Default)]
pub struct PendingWrites {
    inner: Mutex<Pending>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_call(&self, call: Call) {
        self.inner.lock().calls.push_back(call);
    }

    /// Record a volume; replaces any value not yet flushed for `target`
    pub fn set_volume(&self, target: VolumeTarget, value: f32) {
        self.inner.lock().volumes.insert(target, value);
    }

    /// Take every queued call in submission order
    pub fn take_calls(&self) -> Vec<Call> {
        self.inner.lock().calls.drain(..).collect()
    }

    /// Take the latest value per target
    pub fn take_volumes(&self) -> Vec<(VolumeTarget, f32)> {
        std::mem::take(&mut self.inner.lock().volumes)
            .into_iter()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        let pending = self.inner.lock();
        pending.calls.is_empty() && pending.volumes.is_empty()
    }

    pub fn clear(&self) {
        let mut pending = self.inner.lock();
        pending.calls.clear();
        pending.volumes.clear();
    }
}
