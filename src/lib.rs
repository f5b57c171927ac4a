//! nanoKONTROL OBS bridge
//!
//! Connects a KORG nanoKONTROL2 control surface to OBS Studio (obs-websocket v5)
//! and to the host audio mixer. Slider, dial and button input becomes buffered
//! calls against OBS and the mixer; state changes coming back from either side
//! drive the controller LEDs.

/// Emit a status line (startup and shutdown progress).
///
/// Status is the fourth log severity next to info/warn/error; it is routed
/// through tracing under the `status` target so the console can style it apart.
#[macro_export]
macro_rules! status {
    ($($arg:tt)*) => {
        ::tracing::info!(target: "status", $($arg)*)
    };
}

pub mod app;
pub mod audio;
pub mod bindings;
pub mod clock;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod drivers;
pub mod media_keys;
pub mod midi;
pub mod sources;

#[cfg(test)]
pub(crate) mod test_support;
