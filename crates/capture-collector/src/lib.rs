//! # capture-collector: Record Assembly
//!
//! The [`Collector`] runs every registered [`FactsProvider`] and
//! [`SignatureProvider`](capture_crypto::SignatureProvider) concurrently,
//! builds a [`Proof`](capture_proof::Proof) from the results, and hands it
//! to a [`ProofRepository`](capture_proof::ProofRepository).
//!
//! [`DeviceFactsProvider`] is the stock facts provider: device details
//! and geolocation behind injectable sources, gated by [`Preferences`].

pub mod collector;
pub mod device;
pub mod error;
pub mod facts;
pub mod preferences;

pub use collector::{Collector, CollectorConfig};
pub use device::{
    DeviceFactsProvider, DeviceInfo, DeviceInfoSource, GeolocationSource, Position,
    COLLECT_DEVICE_INFO, COLLECT_LOCATION_INFO, DEVICE_FACTS_PROVIDER_ID,
};
pub use error::{CollectorError, PreferenceError, ProviderError};
pub use facts::FactsProvider;
pub use preferences::{MemoryPreferences, Preferences, TablePreferences};
