//! Startup sequence and main loop

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::bindings::BindingTable;
use crate::clock::{Dispatcher, EventClock};
use crate::config::AppConfig;
use crate::controller::NanoKontrol;
use crate::coordinator::{Collaborators, Coordinator};
use crate::drivers::{ObsRemote, RemoteControl};
use crate::media_keys::SystemMediaKeys;
use crate::sources::resolve_sources;

/// Bring every component up, run until `shutdown` resolves or OBS goes away,
/// then tear everything down.
///
/// A missing controller or an unreachable OBS is fatal.
pub async fn run(config: AppConfig, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
    crate::status!("Loading bindings");
    let bindings = BindingTable::load(&config.bindings);

    let remote = Arc::new(ObsRemote::from_config(&config.obs));
    crate::status!("Connecting to OBS");
    remote
        .connect()
        .await
        .with_context(|| format!("Failed to connect to OBS at {}", remote.endpoint()))?;

    crate::status!("Resolving audio sources");
    let registry = Arc::new(resolve_sources(remote.as_ref()).await);

    crate::status!("🎛️  Opening controller '{}'", config.controller.port_pattern);
    let (controller, controls) = match NanoKontrol::open(&config.controller.port_pattern) {
        Ok(opened) => opened,
        Err(e) => {
            // Nothing else holds the OBS connection yet
            if let Err(e) = remote.disconnect().await {
                warn!("Failed to disconnect from OBS: {:#}", e);
            }
            registry.dispose();
            return Err(e.context("Controller not found"));
        },
    };
    let controller = Arc::new(controller);

    let (local_tx, local_events) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(
        remote.clone(),
        Arc::clone(&registry),
        config.clock.call_timeout(),
        config.clock.volume_retries,
    )
    .with_local_events(local_tx.clone());
    let clock = EventClock::new(dispatcher, config.clock.tick_period());

    let mut coordinator = Coordinator::new(
        bindings,
        Collaborators {
            remote: remote.clone(),
            registry: Arc::clone(&registry),
            surface: controller.clone(),
            media: Arc::new(SystemMediaKeys),
        },
        clock,
        &config.controller,
    );

    crate::status!("Testing controller LEDs");
    if let Err(e) = coordinator.led_self_test().await {
        coordinator.shutdown().await;
        return Err(e);
    }

    crate::status!("Initialising LEDs");
    coordinator.initialise_leds().await;

    crate::status!("Subscribing to state changes");
    let remote_events = match remote.subscribe().await {
        Ok(rx) => rx,
        Err(e) => {
            coordinator.shutdown().await;
            return Err(e);
        },
    };
    registry.subscribe_local_mute(local_tx);

    crate::status!("Starting event clock");
    coordinator.start_clock();

    crate::status!("✅ Ready on '{}'", controller.port_name());
    coordinator
        .run(controls, remote_events, local_events, shutdown)
        .await
}
