//! OS media-key emulation
//!
//! Windows injects the virtual media keys; Linux asks the active MPRIS player
//! through `playerctl`.

use anyhow::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    PreviousTrack,
    NextTrack,
    PlayPause,
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKey::PreviousTrack => "previous track",
            MediaKey::NextTrack => "next track",
            MediaKey::PlayPause => "play/pause",
        })
    }
}

/// Fire-and-forget key press
pub trait MediaKeys: Send + Sync {
    fn press(&self, key: MediaKey) -> Result<()>;
}

/// Media keys of the host OS
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMediaKeys;

#[cfg(windows)]
impl MediaKeys for SystemMediaKeys {
    fn press(&self, key: MediaKey) -> Result<()> {
        use windows::Win32::UI::Input::KeyboardAndMouse::{
            keybd_event, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, VK_MEDIA_NEXT_TRACK,
            VK_MEDIA_PLAY_PAUSE, VK_MEDIA_PREV_TRACK,
        };

        let vk = match key {
            MediaKey::PreviousTrack => VK_MEDIA_PREV_TRACK,
            MediaKey::NextTrack => VK_MEDIA_NEXT_TRACK,
            MediaKey::PlayPause => VK_MEDIA_PLAY_PAUSE,
        };

        unsafe {
            keybd_event(vk.0 as u8, 0, KEYEVENTF_EXTENDEDKEY, 0);
            keybd_event(vk.0 as u8, 0, KEYEVENTF_EXTENDEDKEY | KEYEVENTF_KEYUP, 0);
        }
        tracing::debug!("Media key: {}", key);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl MediaKeys for SystemMediaKeys {
    fn press(&self, key: MediaKey) -> Result<()> {
        use std::process::{Command, Stdio};

        let verb = playerctl_verb(key);
        let mut child = Command::new("playerctl")
            .arg(verb)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to run playerctl {}: {}", verb, e))?;

        // Reap off the caller's thread
        std::thread::spawn(move || {
            if let Ok(status) = child.wait() {
                if !status.success() {
                    tracing::debug!("playerctl {} exited with {} (no player?)", verb, status);
                }
            }
        });
        tracing::debug!("Media key: {}", key);
        Ok(())
    }
}

#[cfg(not(any(windows, target_os = "linux")))]
impl MediaKeys for SystemMediaKeys {
    fn press(&self, key: MediaKey) -> Result<()> {
        tracing::warn!(
            "Media key {} is not supported on {}",
            key,
            std::env::consts::OS
        );
        Ok(())
    }
}

#[cfg(any(target_os = "linux", test))]
fn playerctl_verb(key: MediaKey) -> &'static str {
    match key {
        MediaKey::PreviousTrack => "previous",
        MediaKey::NextTrack => "next",
        MediaKey::PlayPause => "play-pause",
    }
}
