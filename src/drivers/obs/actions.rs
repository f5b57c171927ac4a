//! RemoteControl implementation over obws

use anyhow::{Context, Result};
use async_trait::async_trait;
use obws::requests::inputs::Volume;
use tokio::sync::mpsc;
use tracing::debug;

use super::driver::ObsRemote;
use crate::drivers::{InputSettings, OutputStatus, RemoteControl, RemoteEvent};
use crate::sources::Role;

#[async_trait]
impl RemoteControl for ObsRemote {
    async fn scene_list(&self) -> Result<Vec<String>> {
        let client = self.get_connected_client().await?;
        Self::fetch_scene_list(&client).await
    }

    async fn current_scene(&self) -> Result<String> {
        let client = self.get_connected_client().await?;
        Ok(client.scenes().current_program_scene().await?)
    }

    async fn set_current_scene(&self, name: &str) -> Result<()> {
        let client = self.get_connected_client().await?;
        client
            .scenes()
            .set_current_program_scene(name)
            .await
            .with_context(|| format!("Failed to switch to scene '{}'", name))?;
        debug!("OBS scene → {}", name);
        Ok(())
    }

    async fn special_sources(&self) -> Result<Vec<(Role, String)>> {
        let client = self.get_connected_client().await?;
        let specials = client.inputs().specials().await?;

        let pairs = [
            (Role::Desktop1, specials.desktop1),
            (Role::Desktop2, specials.desktop2),
            (Role::Mic1, specials.mic1),
            (Role::Mic2, specials.mic2),
            (Role::Mic3, specials.mic3),
            (Role::Mic4, specials.mic4),
        ];
        Ok(pairs
            .into_iter()
            .filter_map(|(role, name)| name.filter(|n| !n.is_empty()).map(|n| (role, n)))
            .collect())
    }

    async fn input_settings(&self, input: &str) -> Result<InputSettings> {
        let client = self.get_connected_client().await?;
        let settings = client
            .inputs()
            .settings::<serde_json::Value>(input)
            .await
            .with_context(|| format!("Failed to read settings of input '{}'", input))?;

        let device_id = settings
            .settings
            .get("device_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        Ok(InputSettings {
            kind: settings.kind,
            device_id,
        })
    }

    async fn input_muted(&self, input: &str) -> Result<bool> {
        let client = self.get_connected_client().await?;
        Ok(client.inputs().muted(input).await?)
    }

    async fn toggle_input_mute(&self, input: &str) -> Result<()> {
        let client = self.get_connected_client().await?;
        let muted = client.inputs().toggle_mute(input).await?;
        debug!("OBS input '{}' toggled, muted={}", input, muted);
        Ok(())
    }

    async fn set_input_volume(&self, input: &str, volume: f32) -> Result<()> {
        let client = self.get_connected_client().await?;
        client
            .inputs()
            .set_volume(input, Volume::Mul(volume.clamp(0.0, 1.0)))
            .await?;
        Ok(())
    }

    async fn toggle_stream(&self) -> Result<()> {
        let client = self.get_connected_client().await?;
        let active = client.streaming().toggle().await?;
        debug!("OBS stream toggled, active={}", active);
        Ok(())
    }

    async fn save_replay_buffer(&self) -> Result<()> {
        let client = self.get_connected_client().await?;
        client
            .replay_buffer()
            .save()
            .await
            .context("Failed to save replay buffer (is it running?)")?;
        Ok(())
    }

    async fn output_status(&self) -> Result<OutputStatus> {
        let client = self.get_connected_client().await?;
        let streaming = client.streaming().status().await?.active;
        let recording = client.recording().status().await?.active;
        // Replay buffer may be disabled in the OBS output settings
        let replay_buffer = client.replay_buffer().status().await.unwrap_or(false);

        Ok(OutputStatus {
            streaming,
            recording,
            replay_buffer,
        })
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<RemoteEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut listening = self.listening.lock();
            if *listening {
                anyhow::bail!("OBS events are already subscribed");
            }
            *listening = true;
        }
        if let Err(e) = self.spawn_event_listener(tx).await {
            *self.listening.lock() = false;
            return Err(e);
        }
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        self.close().await;
        Ok(())
    }
}
