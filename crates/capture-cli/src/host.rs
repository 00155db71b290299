//! Device facts for the machine running the CLI.

use async_trait::async_trait;
use capture_collector::{DeviceInfo, DeviceInfoSource, GeolocationSource, Position, ProviderError};

/// Reports the host platform and name from the process environment.
#[derive(Debug, Default)]
pub struct HostDeviceInfo;

#[async_trait]
impl DeviceInfoSource for HostDeviceInfo {
    async fn device_info(&self) -> Result<DeviceInfo, ProviderError> {
        let host = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .ok();
        Ok(DeviceInfo {
            name: host,
            platform: Some(std::env::consts::OS.to_string()),
            operating_system: Some(std::env::consts::FAMILY.to_string()),
            app_id: Some(env!("CARGO_PKG_NAME").to_string()),
            app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            ..DeviceInfo::default()
        })
    }
}

/// A host without positioning hardware.
#[derive(Debug, Default)]
pub struct NoGeolocation;

#[async_trait]
impl GeolocationSource for NoGeolocation {
    async fn current_position(&self) -> Result<Position, ProviderError> {
        Err(ProviderError::new("no positioning available on this host"))
    }
}
