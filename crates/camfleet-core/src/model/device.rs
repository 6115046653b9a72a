// ── Device domain types ──

use camfleet_api::Credentials;
use url::Url;

use crate::error::CoreError;

/// One camera in the fleet.
///
/// Built from inventory by the caller and immutable afterwards; the engine
/// never edits devices, it only reads their address and credentials.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub host: String,
    pub port: u16,
    /// Path prefix the ONVIF services live under, if not the root.
    pub base_path: Option<String>,
    pub credentials: Credentials,
    /// Simulated devices never touch the network.
    pub simulated: bool,
}

impl Device {
    /// `host:port`, as shown to operators.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `http://host:port/` for building service endpoints.
    pub fn root_url(&self) -> Result<Url, CoreError> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        Url::parse(&format!("http://{host}:{}/", self.port)).map_err(|e| CoreError::Config {
            message: format!("invalid address for device {}: {e}", self.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn device(host: &str) -> Device {
        Device {
            id: "1".into(),
            host: host.into(),
            port: 8080,
            base_path: None,
            credentials: Credentials::new("admin", SecretString::from(String::new())),
            simulated: false,
        }
    }

    #[test]
    fn root_url_v4_and_v6() {
        assert_eq!(
            device("10.0.0.5").root_url().map(|u| u.to_string()).ok().as_deref(),
            Some("http://10.0.0.5:8080/")
        );
        assert_eq!(
            device("fe80::1").root_url().map(|u| u.to_string()).ok().as_deref(),
            Some("http://[fe80::1]:8080/")
        );
        assert!(device("bad host").root_url().is_err());
    }

    #[test]
    fn address_is_host_port() {
        assert_eq!(device("cam.local").address(), "cam.local:8080");
    }
}
