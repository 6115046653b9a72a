// ── Device client seam ──
//
// `DeviceClient` is everything the applier needs from one camera in one
// protocol variant. Real cameras get ONVIF-backed clients (see `onvif`);
// tests plug in fakes. `DeviceClientRegistry` owns the device list and the
// lazily created clients for a batch, replacing any process-wide state.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Device, EncoderCapabilities, EncoderConfig, Encoding, Protocol};

/// Profile and encoder configuration identifiers found on a device.
///
/// Both lists are non-empty on success; index 0 is what the applier uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub profiles: Vec<String>,
    pub configs: Vec<String>,
}

impl Discovery {
    /// The (profile, configuration) pair to operate on.
    pub fn primary_pair(&self) -> Result<(&str, &str), CoreError> {
        match (self.profiles.first(), self.configs.first()) {
            (Some(p), Some(c)) => Ok((p.as_str(), c.as_str())),
            _ => Err(CoreError::NoUsableProfiles),
        }
    }
}

/// Capability discovery and encoder read/write for one device.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Which protocol variant this client speaks.
    fn protocol(&self) -> Protocol;

    /// Fails with [`CoreError::NoUsableProfiles`] if nothing usable exists.
    async fn discover_profiles_and_configs(&self) -> Result<Discovery, CoreError>;

    /// Advertised options for `encoding`. Devices list options per codec;
    /// `None` picks H.264, or whatever is advertised first.
    async fn get_capabilities(
        &self,
        profile: &str,
        config: &str,
        encoding: Option<Encoding>,
    ) -> Result<EncoderCapabilities, CoreError>;

    async fn get_current_config(&self, config: &str) -> Result<EncoderConfig, CoreError>;

    async fn set_config(&self, config: &str, desired: &EncoderConfig) -> Result<(), CoreError>;

    /// Stream URL for a profile. Credentials may or may not be embedded.
    async fn get_stream_url(&self, profile: &str) -> Result<String, CoreError>;
}

/// Builds clients for a device in a given protocol variant.
pub trait DeviceClientFactory: Send + Sync {
    fn create(
        &self,
        device: &Device,
        protocol: Protocol,
    ) -> Result<Arc<dyn DeviceClient>, CoreError>;
}

/// Devices known to a batch and their live clients.
///
/// Construct one per CLI invocation (or per long-lived service), pass it to
/// the orchestrator, and [`clear`](Self::clear) it to drop every client.
pub struct DeviceClientRegistry {
    factory: Arc<dyn DeviceClientFactory>,
    devices: DashMap<String, Device>,
    clients: DashMap<(String, Protocol), Arc<dyn DeviceClient>>,
}

impl DeviceClientRegistry {
    pub fn new(factory: Arc<dyn DeviceClientFactory>) -> Self {
        Self {
            factory,
            devices: DashMap::new(),
            clients: DashMap::new(),
        }
    }

    pub fn with_devices(
        factory: Arc<dyn DeviceClientFactory>,
        devices: impl IntoIterator<Item = Device>,
    ) -> Self {
        let registry = Self::new(factory);
        for device in devices {
            registry.register(device);
        }
        registry
    }

    /// Add or replace a device. Replacing drops its cached clients.
    pub fn register(&self, device: Device) -> Option<Device> {
        let id = device.id.clone();
        let previous = self.devices.insert(id.clone(), device);
        if previous.is_some() {
            self.clients.retain(|(dev, _), _| dev != &id);
        }
        previous
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices.get(id).map(|d| d.value().clone())
    }

    /// All device ids, sorted numerically where possible.
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        ids.sort_by(|a, b| crate::export::compare_ids(a, b));
        ids
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Client for `id` in `protocol`, created on first use.
    pub fn client(&self, id: &str, protocol: Protocol) -> Result<Arc<dyn DeviceClient>, CoreError> {
        let key = (id.to_owned(), protocol);
        if let Some(client) = self.clients.get(&key) {
            return Ok(Arc::clone(client.value()));
        }
        let device = self.device(id).ok_or_else(|| CoreError::DeviceNotFound {
            identifier: id.to_owned(),
        })?;
        debug!(device = %id, %protocol, "creating device client");
        let client = self.factory.create(&device, protocol)?;
        self.clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    /// Drop every cached client and forget every device.
    pub fn clear(&self) {
        self.clients.clear();
        self.devices.clear();
    }
}

impl std::fmt::Debug for DeviceClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClientRegistry")
            .field("devices", &self.devices.len())
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}
