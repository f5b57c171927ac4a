//! Startup resolution of special sources against OBS and the local mixer

use tracing::{info, warn};

use super::{Role, SourceBinding, SourceRegistry};
use crate::audio;
use crate::drivers::obs::RemoteControl;

/// Build the registry from OBS's special inputs
///
/// Roles OBS does not report stay unresolved. Roles whose device cannot be
/// bound locally are kept with their OBS name but marked disconnected.
pub async fn resolve_sources(remote: &dyn RemoteControl) -> SourceRegistry {
    let specials = match remote.special_sources().await {
        Ok(specials) => specials,
        Err(e) => {
            warn!("Failed to query OBS special inputs, no source is usable: {:#}", e);
            return SourceRegistry::unresolved();
        },
    };

    let mut registry = SourceRegistry::unresolved();
    for (role, name) in specials {
        let binding = resolve_one(remote, role, name).await;
        registry = registry.with_binding(role, binding);
    }

    let connected = registry.connected_roles().count();
    info!("Resolved {} of {} audio sources", connected, Role::COUNT);
    registry
}

async fn resolve_one(remote: &dyn RemoteControl, role: Role, name: String) -> SourceBinding {
    let settings = match remote.input_settings(&name).await {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{} ('{}'): failed to read input settings: {:#}", role, name, e);
            return SourceBinding::disconnected(Some(name));
        },
    };

    match audio::select_backend(&settings.kind, settings.device_id.as_deref()) {
        Ok(backend) => {
            info!(
                "🎚️  {} → '{}' ({}, {})",
                role,
                name,
                settings.kind,
                backend.name()
            );
            SourceBinding::connected(name, backend)
        },
        Err(e) => {
            warn!(
                "{} ('{}', {}): {}. Commands for this source are disabled",
                role, name, settings.kind, e
            );
            SourceBinding::disconnected(Some(name))
        },
    }
}
