//! Parsing of configured binding entries
//!
//! Actions are written as `name(argument)`, e.g. `setobsvolume(desktop1)`,
//! `switchscene(2)` or `savereplay()`. Names are case-insensitive.

use std::fmt;
use std::str::FromStr;

use serde_yaml::Value;

use super::{Action, BindingError, ControlId, Reaction, Trigger, CONTROLLER_MAX};
use crate::config::{InputBindingConfig, OutputBindingConfig};
use crate::sources::Role;

/// Physical type of an input control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Slider,
    Dial,
    Button,
}

impl ControlKind {
    fn accepts(self, action: &Action) -> bool {
        match self {
            ControlKind::Slider | ControlKind::Dial => action.is_continuous(),
            ControlKind::Button => !action.is_continuous(),
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlKind::Slider => "slider",
            ControlKind::Dial => "dial",
            ControlKind::Button => "button",
        })
    }
}

impl FromStr for ControlKind {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slider" => Ok(ControlKind::Slider),
            "dial" | "knob" => Ok(ControlKind::Dial),
            "button" => Ok(ControlKind::Button),
            other => Err(BindingError::UnknownControlKind(other.to_string())),
        }
    }
}

/// Parse an input entry into its control and action
pub fn parse_input(entry: &InputBindingConfig) -> Result<(ControlId, Action), BindingError> {
    let control = parse_control(entry.control.as_ref())?;
    let kind: ControlKind = entry
        .kind
        .as_deref()
        .ok_or(BindingError::MissingAttribute("kind"))?
        .parse()?;
    let text = entry
        .action
        .as_deref()
        .ok_or(BindingError::MissingAttribute("action"))?;

    let action = parse_action(text)?;
    if !kind.accepts(&action) {
        return Err(BindingError::KindMismatch {
            action: text.trim().to_string(),
            kind,
        });
    }
    Ok((control, action))
}

/// Parse an output entry into a reaction
pub fn parse_output(entry: &OutputBindingConfig) -> Result<Reaction, BindingError> {
    let led = parse_control(entry.control.as_ref())?;
    let event = entry
        .event
        .as_deref()
        .ok_or(BindingError::MissingAttribute("event"))?
        .trim()
        .to_ascii_lowercase();

    let source = || -> Result<Role, BindingError> {
        Ok(entry
            .source
            .as_deref()
            .ok_or(BindingError::MissingAttribute("source"))?
            .parse::<Role>()?)
    };

    let trigger = match event.as_str() {
        "obsmutechanged" => Trigger::RemoteMuteChanged(source()?),
        "windowsmutechanged" | "localmutechanged" => Trigger::LocalMuteChanged(source()?),
        "streamstatuschanged" => Trigger::StreamStateChanged,
        "replaystatuschanged" => Trigger::ReplayStateChanged,
        "sceneswitched" => {
            let index = entry
                .sceneindex
                .as_ref()
                .ok_or(BindingError::MissingAttribute("sceneindex"))?;
            Trigger::SceneSwitched(parse_index("sceneindex", index)?)
        },
        _ => return Err(BindingError::UnknownEvent(event.clone())),
    };

    Ok(Reaction { trigger, led })
}

/// Parse `name(argument)`; a bare `name` has an empty argument
fn split_call(text: &str) -> Result<(String, &str), BindingError> {
    let text = text.trim();
    match text.split_once('(') {
        Some((name, rest)) => {
            let argument = rest.strip_suffix(')').ok_or_else(|| BindingError::InvalidArgument {
                name: name.trim().to_string(),
                argument: rest.to_string(),
            })?;
            Ok((name.trim().to_ascii_lowercase(), argument.trim()))
        },
        None => Ok((text.to_ascii_lowercase(), "")),
    }
}

fn parse_action(text: &str) -> Result<Action, BindingError> {
    let (name, argument) = split_call(text)?;
    let role = || argument.parse::<Role>().map_err(BindingError::from);

    let action = match name.as_str() {
        "setobsvolume" => Action::SetRemoteVolume(role()?),
        "setwindowsvolume" | "setlocalvolume" => Action::SetLocalVolume(role()?),
        "obsmute" => Action::ToggleRemoteMute(role()?),
        "windowsmute" | "localmute" => Action::ToggleLocalMute(role()?),
        "switchscene" => {
            let index = argument
                .parse::<usize>()
                .map_err(|_| BindingError::InvalidArgument {
                    name: name.clone(),
                    argument: argument.to_string(),
                })?;
            Action::SwitchScene(index)
        },
        "previoustrack" => Action::PreviousTrack,
        "nexttrack" => Action::NextTrack,
        "playpause" => Action::PlayPause,
        "startstopstream" => Action::ToggleStream,
        "savereplay" => Action::SaveReplayBuffer,
        _ => return Err(BindingError::UnknownAction(name.clone())),
    };
    Ok(action)
}

fn parse_control(value: Option<&Value>) -> Result<ControlId, BindingError> {
    let value = value.ok_or(BindingError::MissingAttribute("control"))?;
    let raw = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    raw.filter(|n| *n <= u64::from(CONTROLLER_MAX))
        .map(|n| n as ControlId)
        .ok_or_else(|| BindingError::InvalidControl(display_value(value)))
}

fn parse_index(name: &str, value: &Value) -> Result<usize, BindingError> {
    let raw = match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    raw.ok_or_else(|| BindingError::InvalidArgument {
        name: name.to_string(),
        argument: display_value(value),
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("{:?}", other)),
    }
}
