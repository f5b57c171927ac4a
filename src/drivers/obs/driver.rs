//! OBS remote core struct and initialization

use obws::Client as ObsClient;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::RwLock;

/// obs-websocket v5 client
pub struct ObsRemote {
    pub(super) host: String,
    pub(super) port: u16,
    pub(super) password: Option<String>,

    // OBS client (wrapped for interior mutability)
    pub(super) client: Arc<RwLock<Option<ObsClient>>>,

    // Set before the client is dropped so the listener does not report a
    // deliberate close as a disconnect
    pub(super) shutdown_flag: Arc<Mutex<bool>>,
    pub(super) listening: Mutex<bool>,
}

impl ObsRemote {
    pub fn new(host: String, port: u16, password: Option<String>) -> Self {
        Self {
            host,
            port,
            password,
            client: Arc::new(RwLock::new(None)),
            shutdown_flag: Arc::new(Mutex::new(false)),
            listening: Mutex::new(false),
        }
    }

    /// Create from config
    pub fn from_config(config: &crate::config::ObsConfig) -> Self {
        Self::new(config.host.clone(), config.port, config.password.clone())
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
