//! Control bindings
//!
//! Inputs map a controller CC number to an [`Action`]; outputs map an observable
//! state change ([`Trigger`]) to the LED it drives. The table is built once from
//! configuration and is read-only afterwards.

mod parse;

pub use parse::{parse_input, parse_output, ControlKind};

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::config::BindingsConfig;
use crate::sources::{Role, UnknownRole};

/// CC number of a slider, dial or button (also the LED address)
pub type ControlId = u8;

/// Highest value a 7-bit controller sends
pub const CONTROLLER_MAX: u8 = 127;

/// Operation bound to an input control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SetRemoteVolume(Role),
    SetLocalVolume(Role),
    ToggleRemoteMute(Role),
    ToggleLocalMute(Role),
    /// Index into the scene list in display order
    SwitchScene(usize),
    PreviousTrack,
    NextTrack,
    PlayPause,
    ToggleStream,
    SaveReplayBuffer,
}

impl Action {
    /// Role the action addresses, if any
    pub fn role(&self) -> Option<Role> {
        match self {
            Action::SetRemoteVolume(role)
            | Action::SetLocalVolume(role)
            | Action::ToggleRemoteMute(role)
            | Action::ToggleLocalMute(role) => Some(*role),
            _ => None,
        }
    }

    /// Continuous actions take the raw controller value, all others fire on press
    pub fn is_continuous(&self) -> bool {
        matches!(self, Action::SetRemoteVolume(_) | Action::SetLocalVolume(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SetRemoteVolume(role) => write!(f, "setobsvolume({})", role),
            Action::SetLocalVolume(role) => write!(f, "setlocalvolume({})", role),
            Action::ToggleRemoteMute(role) => write!(f, "obsmute({})", role),
            Action::ToggleLocalMute(role) => write!(f, "localmute({})", role),
            Action::SwitchScene(index) => write!(f, "switchscene({})", index),
            Action::PreviousTrack => f.write_str("previoustrack()"),
            Action::NextTrack => f.write_str("nexttrack()"),
            Action::PlayPause => f.write_str("playpause()"),
            Action::ToggleStream => f.write_str("startstopstream()"),
            Action::SaveReplayBuffer => f.write_str("savereplay()"),
        }
    }
}

/// Observable state change that drives an LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    RemoteMuteChanged(Role),
    LocalMuteChanged(Role),
    StreamStateChanged,
    ReplayStateChanged,
    /// Scene at this display index became (in)active
    SceneSwitched(usize),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::RemoteMuteChanged(role) => write!(f, "obsmutechanged({})", role),
            Trigger::LocalMuteChanged(role) => write!(f, "localmutechanged({})", role),
            Trigger::StreamStateChanged => f.write_str("streamstatuschanged"),
            Trigger::ReplayStateChanged => f.write_str("replaystatuschanged"),
            Trigger::SceneSwitched(index) => write!(f, "sceneswitched({})", index),
        }
    }
}

/// Output binding: the LED lit or darkened when `trigger` fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaction {
    pub trigger: Trigger,
    pub led: ControlId,
}

/// Problems found while building the binding table
///
/// None of these is fatal: the offending entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("missing required attribute '{0}'")]
    MissingAttribute(&'static str),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
    #[error("unknown control kind '{0}' (expected slider, dial or button)")]
    UnknownControlKind(String),
    #[error("action '{action}' can not be bound to a {kind}")]
    KindMismatch { action: String, kind: ControlKind },
    #[error("invalid argument '{argument}' for '{name}'")]
    InvalidArgument { name: String, argument: String },
    #[error("invalid control id '{0}' (expected 0-127)")]
    InvalidControl(String),
    #[error("control {0} is already bound")]
    DuplicateControl(ControlId),
    #[error("event {0} already drives an LED")]
    DuplicateReaction(Trigger),
}

/// A skipped configuration entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryError {
    /// Location such as `inputs[3]`
    pub entry: String,
    pub error: BindingError,
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bindings.{}: {}", self.entry, self.error)
    }
}

#[derive(Debug, Default, Clone)]
pub struct BindingTable {
    actions: HashMap<ControlId, Action>,
    reactions: Vec<Reaction>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `action` to `control`. A control keeps its first binding.
    pub fn bind_action(&mut self, control: ControlId, action: Action) -> Result<(), BindingError> {
        if self.actions.contains_key(&control) {
            return Err(BindingError::DuplicateControl(control));
        }
        self.actions.insert(control, action);
        Ok(())
    }

    /// Add an output binding. A trigger keeps its first LED.
    pub fn add_reaction(&mut self, reaction: Reaction) -> Result<(), BindingError> {
        if self.led_for(reaction.trigger).is_some() {
            return Err(BindingError::DuplicateReaction(reaction.trigger));
        }
        self.reactions.push(reaction);
        Ok(())
    }

    pub fn action(&self, control: ControlId) -> Option<Action> {
        self.actions.get(&control).copied()
    }

    /// LED bound to `trigger`; first match in insertion order, `None` when unbound
    pub fn led_for(&self, trigger: Trigger) -> Option<ControlId> {
        self.reactions
            .iter()
            .find(|reaction| reaction.trigger == trigger)
            .map(|reaction| reaction.led)
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Build the table, collecting every skipped entry
    pub fn from_config(config: &BindingsConfig) -> (Self, Vec<EntryError>) {
        let mut table = Self::new();
        let mut errors = Vec::new();

        for (i, entry) in config.inputs.iter().enumerate() {
            let result =
                parse_input(entry).and_then(|(control, action)| table.bind_action(control, action));
            if let Err(error) = result {
                errors.push(EntryError {
                    entry: format!("inputs[{}]", i),
                    error,
                });
            }
        }

        for (i, entry) in config.outputs.iter().enumerate() {
            let result = parse_output(entry).and_then(|reaction| table.add_reaction(reaction));
            if let Err(error) = result {
                errors.push(EntryError {
                    entry: format!("outputs[{}]", i),
                    error,
                });
            }
        }

        (table, errors)
    }

    /// Build the table and log skipped entries as warnings
    pub fn load(config: &BindingsConfig) -> Self {
        let (table, errors) = Self::from_config(config);
        for error in &errors {
            warn!("Skipping binding {}", error);
        }
        debug!(
            "Binding table: {} inputs, {} outputs ({} skipped)",
            table.action_count(),
            table.reactions.len(),
            errors.len()
        );
        table
    }
}

/// Linear map of `value` from `[from_low, from_high]` onto `[to_low, to_high]`
pub fn map_range(value: f64, from_low: f64, from_high: f64, to_low: f64, to_high: f64) -> f64 {
    (value - from_low) / (from_high - from_low) * (to_high - to_low) + to_low
}

/// Map a raw 0-127 controller value onto `[low, high]`
pub fn map_controller_value(value: u8, low: f64, high: f64) -> f64 {
    map_range(
        f64::from(value.min(CONTROLLER_MAX)),
        0.0,
        f64::from(CONTROLLER_MAX),
        low,
        high,
    )
}
