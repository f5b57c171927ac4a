//! Audio source roles and their resolved bindings
//!
//! OBS exposes a fixed set of "special" audio inputs (two desktop captures and
//! four microphones). Each role resolves to an OBS input name and a local mixer
//! backend. The registry is an array indexed by role, filled once at startup and
//! read-only afterwards.

mod resolve;

pub use resolve::resolve_sources;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audio::{AudioBackend, NullAudio};

/// Logical identity of an OBS special audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Desktop1,
    Desktop2,
    Mic1,
    Mic2,
    Mic3,
    Mic4,
}

impl Role {
    pub const COUNT: usize = 6;

    pub const ALL: [Role; Role::COUNT] = [
        Role::Desktop1,
        Role::Desktop2,
        Role::Mic1,
        Role::Mic2,
        Role::Mic3,
        Role::Mic4,
    ];

    /// Position in role-indexed arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in configuration and by obs-websocket's special inputs
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Desktop1 => "desktop1",
            Role::Desktop2 => "desktop2",
            Role::Mic1 => "mic1",
            Role::Mic2 => "mic2",
            Role::Mic3 => "mic3",
            Role::Mic4 => "mic4",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not one of the six special sources
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownRole(trimmed.to_string()))
    }
}

/// Mute state reported by a local mixer backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMuteEvent {
    pub role: Role,
    pub muted: bool,
}

/// Resolved binding for one role
pub struct SourceBinding {
    remote_name: Option<String>,
    backend: Arc<dyn AudioBackend>,
    connected: bool,
}

impl SourceBinding {
    /// Role backed by an OBS input and a working local mixer endpoint
    pub fn connected(remote_name: impl Into<String>, backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            remote_name: Some(remote_name.into()),
            backend,
            connected: true,
        }
    }

    /// Role without a usable device. Every command against it is a no-op.
    pub fn disconnected(remote_name: Option<String>) -> Self {
        Self {
            remote_name,
            backend: Arc::new(NullAudio),
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// OBS input name, known even when the local device is not
    pub fn remote_name(&self) -> Option<&str> {
        self.remote_name.as_deref()
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }
}

/// Role → binding table, one slot per role
pub struct SourceRegistry {
    slots: [SourceBinding; Role::COUNT],
    disposed: AtomicBool,
}

impl SourceRegistry {
    /// Registry where no role is connected
    pub fn unresolved() -> Self {
        Self {
            slots: std::array::from_fn(|_| SourceBinding::disconnected(None)),
            disposed: AtomicBool::new(false),
        }
    }

    /// Replace the binding of `role`
    pub fn with_binding(mut self, role: Role, binding: SourceBinding) -> Self {
        self.slots[role.index()] = binding;
        self
    }

    pub fn get(&self, role: Role) -> &SourceBinding {
        &self.slots[role.index()]
    }

    pub fn is_connected(&self, role: Role) -> bool {
        self.get(role).is_connected()
    }

    /// OBS input name of a role that accepts commands
    ///
    /// Returns `None` for disconnected roles, so callers never address OBS
    /// through a role whose local half is missing.
    pub fn command_target(&self, role: Role) -> Option<&str> {
        let binding = self.get(role);
        if binding.connected {
            binding.remote_name()
        } else {
            None
        }
    }

    /// Reverse lookup from an OBS input name
    pub fn role_for_remote(&self, remote_name: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| self.get(*role).remote_name() == Some(remote_name))
    }

    pub fn connected_roles(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(|role| self.is_connected(*role))
    }

    /// Forward push notifications of every connected backend into `tx`
    pub fn subscribe_local_mute(&self, tx: mpsc::UnboundedSender<LocalMuteEvent>) {
        for role in self.connected_roles() {
            let tx = tx.clone();
            self.get(role).backend().subscribe_mute(Arc::new(move |muted| {
                let _ = tx.send(LocalMuteEvent { role, muted });
            }));
        }
    }

    /// Dispose every connected backend. Runs once; later calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        for role in self.connected_roles() {
            let backend = self.get(role).backend();
            match backend.dispose() {
                Ok(()) => debug!("Disposed audio backend for {} ({})", role, backend.name()),
                Err(e) => warn!("Failed to dispose audio backend for {}: {}", role, e),
            }
        }
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::unresolved()
    }
}
