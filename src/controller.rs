//! KORG nanoKONTROL2 adapter
//!
//! Opens the MIDI input and output ports whose names contain the configured
//! pattern, turns incoming control changes into [`ControlEvent`]s and drives
//! button LEDs with control changes on the same numbers.

use anyhow::{Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::bindings::ControlId;
use crate::midi::{format_hex, MidiMessage};

const CLIENT_NAME: &str = "nanoKONTROL-OBS";
const EVENT_QUEUE: usize = 1000;

/// A slider, dial or button moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub control: ControlId,
    pub value: u8,
}

impl ControlEvent {
    /// Control changes on any channel; everything else is ignored
    pub fn from_midi(message: &MidiMessage) -> Option<Self> {
        match *message {
            MidiMessage::ControlChange { cc, value, .. } => Some(Self { control: cc, value }),
            _ => None,
        }
    }
}

/// LED side of the controller
pub trait LedSurface: Send + Sync {
    fn set_led(&self, control: ControlId, on: bool) -> Result<()>;

    /// Close the device. Later LED writes fail.
    fn release(&self) -> Result<()>;
}

/// Connected nanoKONTROL2
pub struct NanoKontrol {
    port_name: String,
    input_conn: Mutex<Option<MidiInputConnection<()>>>,
    output_conn: Mutex<Option<MidiOutputConnection>>,
}

impl NanoKontrol {
    /// MIDI input and output port names
    pub fn list_ports() -> Result<(Vec<String>, Vec<String>)> {
        let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
        let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;

        let inputs = midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect();
        let outputs = midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect();

        Ok((inputs, outputs))
    }

    /// Open the controller whose port names contain `pattern`
    ///
    /// Fails when either port is missing.
    pub fn open(pattern: &str) -> Result<(Self, mpsc::Receiver<ControlEvent>)> {
        let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
        let (in_port, in_name) = find_port(&midi_in.ports(), |p| midi_in.port_name(p), pattern)
            .with_context(|| format!("No MIDI input port matching '{}'", pattern))?;

        let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
        let (out_port, out_name) =
            find_port(&midi_out.ports(), |p| midi_out.port_name(p), pattern)
                .with_context(|| format!("No MIDI output port matching '{}'", pattern))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);

        info!("🎛️  Connecting to controller input: {}", in_name);
        let input_conn = midi_in
            .connect(
                &in_port,
                CLIENT_NAME,
                move |_timestamp, data, _| match MidiMessage::parse(data) {
                    Some(message) => {
                        trace!("RX {} | {}", format_hex(data), message);
                        if let Some(event) = ControlEvent::from_midi(&message) {
                            if event_tx.try_send(event).is_err() {
                                warn!("Controller event queue full, dropping {:?}", event);
                            }
                        }
                    },
                    None => debug!("Failed to parse MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!("Failed to connect to input port: {}", e))?;

        info!("🎛️  Connecting to controller output: {}", out_name);
        let output_conn = midi_out
            .connect(&out_port, CLIENT_NAME)
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port: {}", e))?;

        Ok((
            Self {
                port_name: in_name,
                input_conn: Mutex::new(Some(input_conn)),
                output_conn: Mutex::new(Some(output_conn)),
            },
            event_rx,
        ))
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&self, message: &MidiMessage) -> Result<()> {
        let mut output = self.output_conn.lock();
        let conn = output
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Controller output is closed"))?;

        let data = message.encode();
        conn.send(&data)
            .map_err(|e| anyhow::anyhow!("Failed to send MIDI message: {}", e))?;
        trace!("TX {} | {}", format_hex(&data), message);
        Ok(())
    }
}

impl LedSurface for NanoKontrol {
    fn set_led(&self, control: ControlId, on: bool) -> Result<()> {
        self.send(&MidiMessage::led(control, on))
    }

    fn release(&self) -> Result<()> {
        if let Some(conn) = self.input_conn.lock().take() {
            let _ = conn.close();
        }
        if let Some(conn) = self.output_conn.lock().take() {
            let _ = conn.close();
            info!("Controller '{}' closed", self.port_name);
        }
        Ok(())
    }
}

/// First port whose name contains `pattern` (case-insensitive)
fn find_port<P: Clone, E>(
    ports: &[P],
    name_of: impl Fn(&P) -> Result<String, E>,
    pattern: &str,
) -> Option<(P, String)> {
    let pattern = pattern.to_lowercase();
    ports.iter().find_map(|port| {
        let name = name_of(port).ok()?;
        if name.to_lowercase().contains(&pattern) {
            debug!("Found port '{}' matching pattern '{}'", name, pattern);
            Some((port.clone(), name))
        } else {
            None
        }
    })
}
