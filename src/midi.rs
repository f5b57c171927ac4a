//! MIDI message parsing and encoding
//!
//! The nanoKONTROL2 in CC mode sends control changes for every slider, dial
//! and button, and lights a button LED when it receives a control change with
//! a non-zero value on the same number.

use std::fmt;

/// Value that lights an LED
pub const LED_ON: u8 = 127;
/// Value that darkens an LED
pub const LED_OFF: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// System Exclusive payload without the F0/F7 framing
    SysEx { data: Vec<u8> },

    /// Any other status byte (real-time, program change, ...)
    Other { status: u8 },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is not used by the controller
        if status < 0x80 {
            return None;
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 => {
                let [note, velocity] = two_data_bytes(rest)?;
                Some(MidiMessage::NoteOff { channel, note, velocity })
            },
            0x90 => {
                let [note, velocity] = two_data_bytes(rest)?;
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            },
            0xB0 => {
                let [cc, value] = two_data_bytes(rest)?;
                Some(MidiMessage::ControlChange { channel, cc, value })
            },
            0xF0 if status == 0xF0 => {
                let end = rest.iter().position(|b| *b == 0xF7).unwrap_or(rest.len());
                Some(MidiMessage::SysEx {
                    data: rest[..end].to_vec(),
                })
            },
            _ => Some(MidiMessage::Other { status }),
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            },
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            },
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            },
            MidiMessage::SysEx { ref data } => {
                let mut bytes = Vec::with_capacity(data.len() + 2);
                bytes.push(0xF0);
                bytes.extend_from_slice(data);
                bytes.push(0xF7);
                bytes
            },
            MidiMessage::Other { status } => vec![status],
        }
    }

    /// Control change that switches an LED
    pub fn led(cc: u8, on: bool) -> Self {
        MidiMessage::ControlChange {
            channel: 0,
            cc,
            value: if on { LED_ON } else { LED_OFF },
        }
    }
}

fn two_data_bytes(rest: &[u8]) -> Option<[u8; 2]> {
    match rest {
        [a, b, ..] => Some([a & 0x7F, b & 0x7F]),
        _ => None,
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            },
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            },
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            },
            MidiMessage::SysEx { ref data } => write!(f, "SysEx {} bytes", data.len()),
            MidiMessage::Other { status } => write!(f, "Status {:02X}", status),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
