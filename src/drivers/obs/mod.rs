//! OBS Studio WebSocket remote
//!
//! Implements [`RemoteControl`](super::RemoteControl) over obws:
//! - Scene list, current scene and scene switching
//! - Special audio inputs, input mute and volume
//! - Stream toggle, replay buffer save and output status
//! - Push events forwarded as [`RemoteEvent`](super::RemoteEvent)

mod actions;
mod connection;
mod driver;

pub use driver::ObsRemote;

pub use super::{InputSettings, OutputStatus, RemoteControl, RemoteEvent};
