// ── Single-device health check ──

use serde::Serialize;

use super::device::Device;
use super::encoder::{EncoderCapabilities, EncoderConfig};
use super::result::{Protocol, serialize_redacted_url};
use crate::error::{CoreError, ErrorClass};

/// How far a read-only check got with a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Reachability {
    /// Discovery, current configuration and options all answered.
    Online,
    /// Discovery answered, but a later read failed.
    Partial,
    /// Nothing answers at the address.
    Offline,
    /// Something answers, but not as a usable camera.
    Error,
}

impl Reachability {
    /// Status for a device whose discovery failed with `class`.
    pub fn for_failure(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Timeout | ErrorClass::NoRouteToHost => Self::Offline,
            _ => Self::Error,
        }
    }
}

/// Everything a check learned about one device. Never writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCheck {
    pub device_id: String,
    pub address: String,
    pub simulated: bool,
    pub status: Reachability,
    pub protocol: Option<Protocol>,
    pub profile_token: Option<String>,
    pub config_token: Option<String>,
    pub current: Option<EncoderConfig>,
    /// Advertised options for the current encoding.
    pub capabilities: Option<EncoderCapabilities>,
    #[serde(serialize_with = "serialize_redacted_url")]
    pub stream_url: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub error_message: Option<String>,
    pub hint: Option<String>,
}

impl DeviceCheck {
    pub fn new(device: &Device) -> Self {
        Self {
            device_id: device.id.clone(),
            address: device.address(),
            simulated: device.simulated,
            status: Reachability::Online,
            protocol: None,
            profile_token: None,
            config_token: None,
            current: None,
            capabilities: None,
            stream_url: None,
            error_class: None,
            error_message: None,
            hint: None,
        }
    }

    /// Discovery never succeeded: classify the device as offline or broken.
    pub fn unreachable(&mut self, err: &CoreError, device: &Device) {
        let class = err.class();
        self.status = Reachability::for_failure(class);
        self.profile_token = None;
        self.config_token = None;
        self.error_class = Some(class);
        self.error_message = Some(err.to_string());
        self.hint = class.operator_hint(&device.host, device.port);
    }

    /// Discovery worked but a later read did not.
    pub fn partial(&mut self, err: &CoreError) {
        self.status = Reachability::Partial;
        self.error_class = Some(err.class());
        self.error_message = Some(err.to_string());
    }

    pub fn is_online(&self) -> bool {
        self.status == Reachability::Online
    }
}
