//! OBS connection management and event handling

use anyhow::{Context, Result};
use obws::events::Event;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::driver::ObsRemote;
use crate::drivers::RemoteEvent;

impl ObsRemote {
    /// Get the connected OBS client, or an error if not connected
    pub(super) async fn get_connected_client(
        &self,
    ) -> Result<tokio::sync::RwLockReadGuard<'_, obws::Client>> {
        let guard = self.client.read().await;
        tokio::sync::RwLockReadGuard::try_map(guard, |client| client.as_ref())
            .map_err(|_| anyhow::anyhow!("OBS not connected"))
    }

    /// Connect to OBS WebSocket
    pub async fn connect(&self) -> Result<()> {
        info!("🎬 Connecting to OBS at {}", self.endpoint());

        let client = obws::Client::connect(self.host.clone(), self.port, self.password.clone())
            .await
            .context("Failed to connect to OBS WebSocket")?;

        if let Ok(version) = client.general().version().await {
            debug!(
                "OBS {} / obs-websocket {}",
                version.obs_version, version.obs_web_socket_version
            );
        }

        *self.client.write().await = Some(client);
        *self.shutdown_flag.lock() = false;

        info!("✅ OBS WebSocket connected");
        Ok(())
    }

    /// Spawn the background task forwarding OBS events into `tx`
    pub(super) async fn spawn_event_listener(
        &self,
        tx: mpsc::UnboundedSender<RemoteEvent>,
    ) -> Result<()> {
        let events = {
            let client = self.get_connected_client().await?;
            client.events().context("Failed to get OBS event stream")?
        };

        let client = Arc::clone(&self.client);
        let shutdown_flag = Arc::clone(&self.shutdown_flag);

        tokio::spawn(async move {
            use tokio_stream::StreamExt;

            tokio::pin!(events);
            while let Some(event) = events.next().await {
                if *shutdown_flag.lock() {
                    break;
                }

                let forwarded = match event {
                    Event::InputMuteStateChanged { name, muted } => {
                        debug!("OBS input '{}' muted={}", name, muted);
                        Some(RemoteEvent::InputMuteChanged {
                            source: name,
                            muted,
                        })
                    },
                    Event::CurrentProgramSceneChanged { name } => {
                        debug!("OBS program scene changed: {}", name);
                        Some(RemoteEvent::CurrentSceneChanged { name })
                    },
                    Event::SceneListChanged { .. } => {
                        let guard = client.read().await;
                        match guard.as_ref() {
                            Some(c) => match Self::fetch_scene_list(c).await {
                                Ok(scenes) => Some(RemoteEvent::SceneListChanged { scenes }),
                                Err(e) => {
                                    warn!("Failed to refresh OBS scene list: {:#}", e);
                                    None
                                },
                            },
                            None => None,
                        }
                    },
                    Event::StreamStateChanged { active, .. } => {
                        debug!("OBS stream active={}", active);
                        Some(RemoteEvent::StreamStateChanged { active })
                    },
                    Event::ReplayBufferStateChanged { active, .. } => {
                        debug!("OBS replay buffer active={}", active);
                        Some(RemoteEvent::ReplayStateChanged { active })
                    },
                    Event::ExitStarted => Some(RemoteEvent::Disconnected {
                        reason: "OBS is shutting down".to_string(),
                    }),
                    _ => None,
                };

                if let Some(event) = forwarded {
                    if tx.send(event).is_err() {
                        debug!("OBS event receiver dropped, stopping listener");
                        return;
                    }
                }
            }

            if !*shutdown_flag.lock() {
                let _ = tx.send(RemoteEvent::Disconnected {
                    reason: "OBS event stream closed".to_string(),
                });
            }
            debug!("OBS event listener stopped");
        });

        Ok(())
    }

    /// Scene names in display order
    ///
    /// obs-websocket lists scenes bottom-up; the OBS UI shows them top-down.
    pub(super) async fn fetch_scene_list(client: &obws::Client) -> Result<Vec<String>> {
        let mut scenes = client.scenes().list().await?.scenes;
        scenes.sort_by_key(|scene| scene.index);
        Ok(scenes.into_iter().rev().map(|scene| scene.name).collect())
    }

    /// Drop the client, closing the socket
    pub(super) async fn close(&self) {
        *self.shutdown_flag.lock() = true;

        if let Some(client) = self.client.write().await.take() {
            drop(client);
            info!("✅ OBS WebSocket disconnected");
        }
    }
}
