//! Mixer backends driven through command-line tools
//!
//! ALSA cards are controlled with `amixer`, PulseAudio/PipeWire devices with
//! `pactl`. Each call spawns the tool and parses its output.

use regex::Regex;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

use super::{AudioBackend, AudioError};

/// Longest a single tool invocation may run before it is killed
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// PulseAudio device class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseDirection {
    Sink,
    Source,
}

impl PulseDirection {
    fn noun(self) -> &'static str {
        match self {
            PulseDirection::Sink => "sink",
            PulseDirection::Source => "source",
        }
    }

    fn default_device(self) -> &'static str {
        match self {
            PulseDirection::Sink => "@DEFAULT_SINK@",
            PulseDirection::Source => "@DEFAULT_SOURCE@",
        }
    }
}

/// Tool and device addressed by a [`CommandMixer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerTool {
    /// `amixer -D <card> ... <control>`
    Amixer { card: String, control: String },
    /// `pactl ...-<sink|source>-... <device>`
    Pactl {
        device: String,
        direction: PulseDirection,
    },
}

impl MixerTool {
    fn program(&self) -> &'static str {
        match self {
            MixerTool::Amixer { .. } => "amixer",
            MixerTool::Pactl { .. } => "pactl",
        }
    }

    fn pactl_device(device: &str, direction: PulseDirection) -> &str {
        if device == "default" {
            direction.default_device()
        } else {
            device
        }
    }

    fn get_volume_args(&self) -> Vec<String> {
        match self {
            MixerTool::Amixer { card, control } => {
                vec!["-D".into(), card.clone(), "sget".into(), control.clone()]
            },
            MixerTool::Pactl { device, direction } => vec![
                format!("get-{}-volume", direction.noun()),
                Self::pactl_device(device, *direction).to_string(),
            ],
        }
    }

    fn set_volume_args(&self, percent: u32) -> Vec<String> {
        match self {
            MixerTool::Amixer { card, control } => vec![
                "-D".into(),
                card.clone(),
                "sset".into(),
                control.clone(),
                format!("{}%", percent),
            ],
            MixerTool::Pactl { device, direction } => vec![
                format!("set-{}-volume", direction.noun()),
                Self::pactl_device(device, *direction).to_string(),
                format!("{}%", percent),
            ],
        }
    }

    fn get_mute_args(&self) -> Vec<String> {
        match self {
            MixerTool::Amixer { .. } => self.get_volume_args(),
            MixerTool::Pactl { device, direction } => vec![
                format!("get-{}-mute", direction.noun()),
                Self::pactl_device(device, *direction).to_string(),
            ],
        }
    }

    fn set_mute_args(&self, muted: bool) -> Vec<String> {
        match self {
            MixerTool::Amixer { card, control } => vec![
                "-D".into(),
                card.clone(),
                "sset".into(),
                control.clone(),
                if muted { "mute" } else { "unmute" }.into(),
            ],
            MixerTool::Pactl { device, direction } => vec![
                format!("set-{}-mute", direction.noun()),
                Self::pactl_device(device, *direction).to_string(),
                if muted { "1" } else { "0" }.into(),
            ],
        }
    }
}

/// Mixer endpoint controlled through `amixer` or `pactl`
pub struct CommandMixer {
    tool: MixerTool,
    label: String,
    timeout: Duration,
    disposed: AtomicBool,
}

impl CommandMixer {
    pub fn new(tool: MixerTool) -> Self {
        let label = match &tool {
            MixerTool::Amixer { card, control } => format!("alsa {} {}", card, control),
            MixerTool::Pactl { device, direction } => {
                format!("pulse {} {}", direction.noun(), device)
            },
        };
        Self {
            tool,
            label,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            disposed: AtomicBool::new(false),
        }
    }

    fn run(&self, args: Vec<String>) -> Result<String, AudioError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AudioError::Disposed);
        }

        let program = self.tool.program();
        trace!("{} {}", program, args.join(" "));

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AudioError::CommandFailed(format!("{}: {}", program, e)))?;

        run_to_completion(program, child, self.timeout)
    }
}

/// Wait for `child` up to `timeout`, killing and reaping it when it overruns
fn run_to_completion(program: &str, mut child: Child, timeout: Duration) -> Result<String, AudioError> {
    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                if let Err(e) = child.kill() {
                    warn!("Failed to kill {}: {}", program, e);
                }
                let _ = child.wait();
                return Err(AudioError::TimedOut(format!(
                    "{} killed after {:?}",
                    program, timeout
                )));
            },
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(AudioError::CommandFailed(format!("{}: {}", program, e))),
        }
    };

    let mut stdout = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_string(&mut stdout)
            .map_err(|e| AudioError::CommandFailed(format!("{} output: {}", program, e)))?;
    }

    if !status.success() {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        return Err(AudioError::CommandFailed(format!(
            "{} exited with {}: {}",
            program,
            status,
            stderr.trim()
        )));
    }

    Ok(stdout)
}

impl AudioBackend for CommandMixer {
    fn name(&self) -> &str {
        &self.label
    }

    fn volume(&self) -> Result<f32, AudioError> {
        let output = self.run(self.tool.get_volume_args())?;
        parse_percent(&output)
    }

    fn set_volume(&self, percent: f32) -> Result<(), AudioError> {
        let percent = percent.clamp(0.0, 100.0).round() as u32;
        self.run(self.tool.set_volume_args(percent)).map(|_| ())
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        let output = self.run(self.tool.get_mute_args())?;
        match self.tool {
            MixerTool::Amixer { .. } => parse_amixer_muted(&output),
            MixerTool::Pactl { .. } => parse_pactl_muted(&output),
        }
    }

    fn set_muted(&self, muted: bool) -> Result<(), AudioError> {
        self.run(self.tool.set_mute_args(muted)).map(|_| ())
    }

    fn dispose(&self) -> Result<(), AudioError> {
        self.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn percent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{1,3})%").expect("invariant: static percent pattern compiles")
    })
}

fn switch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[(on|off)\]").expect("invariant: static switch pattern compiles")
    })
}

/// First `NN%` in the tool's output (front-left channel)
fn parse_percent(output: &str) -> Result<f32, AudioError> {
    percent_pattern()
        .captures(output)
        .and_then(|caps| caps[1].parse::<f32>().ok())
        .ok_or_else(|| AudioError::Parse(format!("no volume in '{}'", output.trim())))
}

/// `amixer sget` prints `[on]` for an open (unmuted) switch
fn parse_amixer_muted(output: &str) -> Result<bool, AudioError> {
    switch_pattern()
        .captures(output)
        .map(|caps| &caps[1] == "off")
        .ok_or_else(|| AudioError::Parse(format!("no switch state in '{}'", output.trim())))
}

/// `pactl get-*-mute` prints `Mute: yes` / `Mute: no`
fn parse_pactl_muted(output: &str) -> Result<bool, AudioError> {
    let value = output
        .trim()
        .strip_prefix("Mute:")
        .map(str::trim)
        .ok_or_else(|| AudioError::Parse(format!("unexpected mute output '{}'", output.trim())))?;
    match value {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(AudioError::Parse(format!("unexpected mute value '{}'", other))),
    }
}
