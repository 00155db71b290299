//! # Device Facts Provider
//!
//! Reports what the capturing device knows about itself and where it is.
//! Both halves can be switched off through [`Preferences`]:
//! [`COLLECT_DEVICE_INFO`] and [`COLLECT_LOCATION_INFO`], on by default.
//!
//! Device details and position are looked up concurrently. Positioning
//! is raced against a timeout. A fix that fails or arrives
//! late leaves the geolocation facts absent rather than failing the
//! provider; device information errors do fail it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use capture_core::ProviderId;
use capture_proof::{DefaultFactId, FactValue, Facts, Payloads};

use crate::error::ProviderError;
use crate::facts::FactsProvider;
use crate::preferences::Preferences;

pub const DEVICE_FACTS_PROVIDER_ID: &str = "DeviceFactsProvider";

pub const COLLECT_DEVICE_INFO: &str = "COLLECT_DEVICE_INFO";
pub const COLLECT_LOCATION_INFO: &str = "COLLECT_LOCATION_INFO";

pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Device and battery information. Unknown fields are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub name: Option<String>,
    pub platform: Option<String>,
    pub uuid: Option<String>,
    pub app_version: Option<String>,
    pub app_build: Option<String>,
    pub app_id: Option<String>,
    pub app_name: Option<String>,
    pub operating_system: Option<String>,
    pub os_version: Option<String>,
    pub manufacturer: Option<String>,
    pub is_virtual: Option<bool>,
    pub mem_used: Option<u64>,
    pub disk_free: Option<u64>,
    pub disk_total: Option<u64>,
    pub battery_level: Option<f64>,
    pub is_charging: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait DeviceInfoSource: Send + Sync {
    async fn device_info(&self) -> Result<DeviceInfo, ProviderError>;
}

#[async_trait]
pub trait GeolocationSource: Send + Sync {
    async fn current_position(&self) -> Result<Position, ProviderError>;
}

pub struct DeviceFactsProvider {
    id: ProviderId,
    device: Arc<dyn DeviceInfoSource>,
    geolocation: Arc<dyn GeolocationSource>,
    preferences: Arc<dyn Preferences>,
    geolocation_timeout: Duration,
}

impl DeviceFactsProvider {
    pub fn new(
        device: Arc<dyn DeviceInfoSource>,
        geolocation: Arc<dyn GeolocationSource>,
        preferences: Arc<dyn Preferences>,
    ) -> Self {
        Self {
            id: ProviderId::new(DEVICE_FACTS_PROVIDER_ID),
            device,
            geolocation,
            preferences,
            geolocation_timeout: DEFAULT_GEOLOCATION_TIMEOUT,
        }
    }

    pub fn with_geolocation_timeout(mut self, timeout: Duration) -> Self {
        self.geolocation_timeout = timeout;
        self
    }

    pub async fn is_device_info_collection_enabled(&self) -> Result<bool, ProviderError> {
        Ok(self.preferences.get_bool(COLLECT_DEVICE_INFO, true).await?)
    }

    pub async fn set_device_info_collection(&self, enable: bool) -> Result<(), ProviderError> {
        Ok(self.preferences.set_bool(COLLECT_DEVICE_INFO, enable).await?)
    }

    pub async fn is_geolocation_info_collection_enabled(&self) -> Result<bool, ProviderError> {
        Ok(self.preferences.get_bool(COLLECT_LOCATION_INFO, true).await?)
    }

    pub async fn set_geolocation_info_collection(&self, enable: bool) -> Result<(), ProviderError> {
        Ok(self.preferences.set_bool(COLLECT_LOCATION_INFO, enable).await?)
    }

    async fn collect_device_info(&self) -> Result<Option<DeviceInfo>, ProviderError> {
        if !self.is_device_info_collection_enabled().await? {
            return Ok(None);
        }
        self.device.device_info().await.map(Some)
    }

    async fn collect_position(&self) -> Result<Option<Position>, ProviderError> {
        if !self.is_geolocation_info_collection_enabled().await? {
            return Ok(None);
        }
        match tokio::time::timeout(self.geolocation_timeout, self.geolocation.current_position()).await {
            Ok(Ok(position)) => Ok(Some(position)),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "geolocation unavailable");
                Ok(None)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.geolocation_timeout, "timed out collecting geolocation");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for DeviceFactsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFactsProvider")
            .field("id", &self.id)
            .field("geolocation_timeout", &self.geolocation_timeout)
            .finish_non_exhaustive()
    }
}

fn put(facts: &mut Facts, name: &str, value: Option<FactValue>) {
    if let Some(value) = value {
        facts.insert(name.to_string(), value);
    }
}

#[async_trait]
impl FactsProvider for DeviceFactsProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn provide(&self, _payloads: &Payloads) -> Result<Facts, ProviderError> {
        let (device, position) = tokio::try_join!(self.collect_device_info(), self.collect_position())?;
        let device = device.unwrap_or_default();

        let text = |v: &Option<String>| v.clone().map(FactValue::String);
        let number = |v: Option<u64>| v.map(FactValue::from);

        let mut facts = Facts::new();
        put(&mut facts, DefaultFactId::DeviceName.as_str(), text(&device.model));
        put(
            &mut facts,
            DefaultFactId::GeolocationLatitude.as_str(),
            position.and_then(|p| FactValue::number(p.latitude)),
        );
        put(
            &mut facts,
            DefaultFactId::GeolocationLongitude.as_str(),
            position.and_then(|p| FactValue::number(p.longitude)),
        );
        put(&mut facts, "USER_DEVICE_NAME", text(&device.name));
        put(&mut facts, "PLATFORM", text(&device.platform));
        put(&mut facts, "UUID", text(&device.uuid));
        put(&mut facts, "APP_VERSION", text(&device.app_version));
        put(&mut facts, "APP_BUILD", text(&device.app_build));
        put(&mut facts, "APP_ID", text(&device.app_id));
        put(&mut facts, "APP_NAME", text(&device.app_name));
        put(&mut facts, "OPERATING_SYSTEM", text(&device.operating_system));
        put(&mut facts, "OS_VERSION", text(&device.os_version));
        put(&mut facts, "MANUFACTURER", text(&device.manufacturer));
        put(&mut facts, "IS_VIRTUAL", device.is_virtual.map(FactValue::Bool));
        put(&mut facts, "MEM_USED", number(device.mem_used));
        put(&mut facts, "DISK_FREE", number(device.disk_free));
        put(&mut facts, "DISK_TOTAL", number(device.disk_total));
        put(&mut facts, "BATTERY_LEVEL", device.battery_level.and_then(FactValue::number));
        put(&mut facts, "IS_CHARGING", device.is_charging.map(FactValue::Bool));
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryPreferences;

    struct FixedDevice;

    #[async_trait]
    impl DeviceInfoSource for FixedDevice {
        async fn device_info(&self) -> Result<DeviceInfo, ProviderError> {
            Ok(DeviceInfo {
                model: Some("Pixel 5".into()),
                platform: Some("android".into()),
                mem_used: Some(1024),
                battery_level: Some(0.5),
                is_charging: Some(false),
                ..DeviceInfo::default()
            })
        }
    }

    struct FixedPosition;

    #[async_trait]
    impl GeolocationSource for FixedPosition {
        async fn current_position(&self) -> Result<Position, ProviderError> {
            Ok(Position {
                latitude: 25.033,
                longitude: 121.5654,
            })
        }
    }

    struct NeverResolves;

    #[async_trait]
    impl GeolocationSource for NeverResolves {
        async fn current_position(&self) -> Result<Position, ProviderError> {
            std::future::pending().await
        }
    }

    struct BrokenDevice;

    #[async_trait]
    impl DeviceInfoSource for BrokenDevice {
        async fn device_info(&self) -> Result<DeviceInfo, ProviderError> {
            Err(ProviderError::new("device plugin unavailable"))
        }
    }

    fn provider(geolocation: Arc<dyn GeolocationSource>) -> DeviceFactsProvider {
        DeviceFactsProvider::new(Arc::new(FixedDevice), geolocation, Arc::new(MemoryPreferences::new()))
    }

    #[tokio::test]
    async fn reports_known_facts_only() {
        let facts = provider(Arc::new(FixedPosition)).provide(&Payloads::new()).await.unwrap();
        assert_eq!(facts["DEVICE_NAME"], FactValue::from("Pixel 5"));
        assert_eq!(facts["GEOLOCATION_LATITUDE"].as_f64(), Some(25.033));
        assert_eq!(facts["MEM_USED"], FactValue::from(1024u64));
        assert_eq!(facts["BATTERY_LEVEL"].as_f64(), Some(0.5));
        assert_eq!(facts["IS_CHARGING"], FactValue::Bool(false));
        assert!(!facts.contains_key("UUID"));
        assert!(!facts.contains_key("MANUFACTURER"));
    }

    #[tokio::test(start_paused = true)]
    async fn geolocation_timeout_leaves_location_absent() {
        let facts = provider(Arc::new(NeverResolves))
            .with_geolocation_timeout(Duration::from_secs(1))
            .provide(&Payloads::new())
            .await
            .unwrap();
        assert!(!facts.contains_key("GEOLOCATION_LATITUDE"));
        assert!(!facts.contains_key("GEOLOCATION_LONGITUDE"));
        assert_eq!(facts["PLATFORM"], FactValue::from("android"));
    }

    struct SlowDevice;

    #[async_trait]
    impl DeviceInfoSource for SlowDevice {
        async fn device_info(&self) -> Result<DeviceInfo, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            FixedDevice.device_info().await
        }
    }

    struct SlowPosition;

    #[async_trait]
    impl GeolocationSource for SlowPosition {
        async fn current_position(&self) -> Result<Position, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            FixedPosition.current_position().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn device_and_position_are_looked_up_together() {
        let provider = DeviceFactsProvider::new(
            Arc::new(SlowDevice),
            Arc::new(SlowPosition),
            Arc::new(MemoryPreferences::new()),
        );
        let started = tokio::time::Instant::now();
        let facts = provider.provide(&Payloads::new()).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
        assert_eq!(facts["DEVICE_NAME"], FactValue::from("Pixel 5"));
        assert_eq!(facts["GEOLOCATION_LONGITUDE"].as_f64(), Some(121.5654));
    }

    #[tokio::test]
    async fn disabled_collection_reports_nothing() {
        let provider = provider(Arc::new(FixedPosition));
        provider.set_device_info_collection(false).await.unwrap();
        provider.set_geolocation_info_collection(false).await.unwrap();
        assert!(!provider.is_device_info_collection_enabled().await.unwrap());
        assert!(provider.provide(&Payloads::new()).await.unwrap().is_empty());

        provider.set_geolocation_info_collection(true).await.unwrap();
        let facts = provider.provide(&Payloads::new()).await.unwrap();
        assert_eq!(facts.len(), 2);
    }

    #[tokio::test]
    async fn device_errors_fail_the_provider() {
        let provider = DeviceFactsProvider::new(
            Arc::new(BrokenDevice),
            Arc::new(FixedPosition),
            Arc::new(MemoryPreferences::new()),
        );
        assert_eq!(
            provider.provide(&Payloads::new()).await.unwrap_err(),
            ProviderError::new("device plugin unavailable")
        );
    }
}
