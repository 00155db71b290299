//! # Legacy Backend Schema
//!
//! The backend predates [`Proof`] and still speaks an older, flattened
//! shape: one [`OldProof`] header per record, a sorted list of
//! [`OldEssentialInformation`] rows with every fact value stringified, and
//! one [`OldSignature`] per signature provider.
//!
//! Conversions are lossy in one respect: fact values travel as strings and
//! are coerced back with [`to_number_or_boolean`], so a string fact that
//! looks like a number comes back as a number.

use std::collections::BTreeMap;
use std::sync::Arc;

use capture_core::{ContentHash, MimeType, ProviderId, Timestamp};
use capture_crypto::Signature;
use capture_store::ImageStore;
use serde::{Deserialize, Serialize};

use crate::error::ProofError;
use crate::proof::{PayloadMeta, Payloads, Proof, Signatures};
use crate::truth::{DefaultFactId, FactValue, Facts, Truth};

/// Record header in the old schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldProof {
    pub hash: ContentHash,
    pub mime_type: MimeType,
    pub timestamp: Timestamp,
}

/// One fact, flattened and stringified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldEssentialInformation {
    pub provider: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortedProofInformation {
    pub proof: OldProof,
    pub information: Vec<OldEssentialInformation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldSignature {
    pub proof_hash: ContentHash,
    pub provider: String,
    pub signature: String,
    pub public_key: String,
}

/// Display names the old schema used for the default fact ids.
pub fn legacy_name(fact: DefaultFactId) -> &'static str {
    match fact {
        DefaultFactId::DeviceName => "Device Name",
        DefaultFactId::GeolocationLatitude => "Current GPS Latitude",
        DefaultFactId::GeolocationLongitude => "Current GPS Longitude",
    }
}

/// Map a default fact id to its old display name; other names pass through.
pub fn to_legacy_name(name: &str) -> &str {
    DefaultFactId::ALL
        .iter()
        .find(|id| id.as_str() == name)
        .map(|id| legacy_name(*id))
        .unwrap_or(name)
}

/// Map an old display name back to its default fact id; other names pass
/// through.
pub fn from_legacy_name(name: &str) -> &str {
    DefaultFactId::ALL
        .iter()
        .find(|id| legacy_name(**id) == name)
        .map(|id| id.as_str())
        .unwrap_or(name)
}

/// Coerce a stringified fact back to a typed value.
///
/// `"true"`/`"false"` become booleans. Anything that reads as a finite
/// number (decimal, exponent, or `0x`/`0o`/`0b` integer; blank counts as
/// zero) becomes a number. Everything else stays a string.
pub fn to_number_or_boolean(value: &str) -> FactValue {
    match value {
        "true" => return FactValue::Bool(true),
        "false" => return FactValue::Bool(false),
        _ => {}
    }
    parse_number(value)
        .and_then(FactValue::number)
        .unwrap_or_else(|| FactValue::String(value.to_string()))
}

fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
        }
    }
    // Rust also accepts "inf"/"nan" spellings; only plain numerals count.
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn first_payload(proof: &Proof) -> Result<(&ContentHash, &PayloadMeta), ProofError> {
    proof
        .indexed_payloads()
        .iter()
        .next()
        .ok_or(ProofError::NoPayloads)
}

pub fn get_old_proof(proof: &Proof) -> Result<OldProof, ProofError> {
    let (hash, meta) = first_payload(proof)?;
    Ok(OldProof {
        hash: hash.clone(),
        mime_type: meta.mime_type.clone(),
        timestamp: proof.timestamp(),
    })
}

/// Every fact as a stringified row, sorted by provider, then name, then
/// value.
pub fn get_sorted_essential_information(proof: &Proof) -> Vec<OldEssentialInformation> {
    let mut rows: Vec<OldEssentialInformation> = proof
        .truth()
        .providers
        .iter()
        .flat_map(|(provider, facts)| {
            facts.iter().map(move |(name, value)| OldEssentialInformation {
                provider: provider.to_string(),
                name: name.clone(),
                value: value.to_string(),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.provider
            .cmp(&b.provider)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.value.cmp(&b.value))
    });
    rows
}

/// Header plus sorted facts, with default fact ids renamed to their old
/// display names.
pub fn get_sorted_proof_information(proof: &Proof) -> Result<SortedProofInformation, ProofError> {
    Ok(SortedProofInformation {
        proof: get_old_proof(proof)?,
        information: get_sorted_essential_information(proof)
            .into_iter()
            .map(|info| OldEssentialInformation {
                name: to_legacy_name(&info.name).to_string(),
                ..info
            })
            .collect(),
    })
}

pub fn get_old_signatures(proof: &Proof) -> Result<Vec<OldSignature>, ProofError> {
    let (hash, _) = first_payload(proof)?;
    Ok(proof
        .signatures()
        .iter()
        .map(|(provider, sig)| OldSignature {
            proof_hash: hash.clone(),
            provider: provider.to_string(),
            signature: sig.signature.clone(),
            public_key: sig.public_key.clone(),
        })
        .collect())
}

/// Rebuild a record from the old schema and its raw payload.
///
/// When the old rows repeat a `(provider, name)` pair or a signature
/// provider, the first occurrence wins.
pub async fn proof_from_legacy(
    store: Arc<ImageStore>,
    payload_base64: String,
    mime_type: MimeType,
    information: &SortedProofInformation,
    old_signatures: &[OldSignature],
) -> Result<Proof, ProofError> {
    let mut providers: BTreeMap<ProviderId, Facts> = BTreeMap::new();
    for info in &information.information {
        providers
            .entry(ProviderId::new(info.provider.as_str()))
            .or_default()
            .entry(from_legacy_name(&info.name).to_string())
            .or_insert_with(|| to_number_or_boolean(&info.value));
    }

    let mut signatures = Signatures::new();
    for old in old_signatures {
        signatures
            .entry(ProviderId::new(old.provider.as_str()))
            .or_insert_with(|| Signature::new(old.signature.clone(), old.public_key.clone()));
    }

    let mut payloads = Payloads::new();
    payloads.insert(payload_base64, PayloadMeta { mime_type });

    let truth = Truth {
        timestamp: information.proof.timestamp,
        providers,
    };
    Proof::from(store, payloads, truth, signatures).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_mapping_roundtrips() {
        assert_eq!(to_legacy_name("DEVICE_NAME"), "Device Name");
        assert_eq!(to_legacy_name("GEOLOCATION_LONGITUDE"), "Current GPS Longitude");
        assert_eq!(to_legacy_name("HUMIDITY"), "HUMIDITY");
        assert_eq!(from_legacy_name("Current GPS Latitude"), "GEOLOCATION_LATITUDE");
        assert_eq!(from_legacy_name("Other"), "Other");
    }

    #[test]
    fn coercion() {
        assert_eq!(to_number_or_boolean("true"), FactValue::Bool(true));
        assert_eq!(to_number_or_boolean("false"), FactValue::Bool(false));
        assert_eq!(to_number_or_boolean("25.033").as_f64(), Some(25.033));
        assert_eq!(to_number_or_boolean("42"), FactValue::from(42i64));
        assert_eq!(to_number_or_boolean("1e3"), FactValue::from(1000i64));
        assert_eq!(to_number_or_boolean("0x10"), FactValue::from(16i64));
        assert_eq!(to_number_or_boolean(""), FactValue::from(0i64));
        assert_eq!(to_number_or_boolean("Pixel 5"), FactValue::from("Pixel 5"));
        assert_eq!(to_number_or_boolean("inf"), FactValue::from("inf"));
        assert_eq!(to_number_or_boolean("Infinity"), FactValue::from("Infinity"));
        assert_eq!(to_number_or_boolean("TRUE"), FactValue::from("TRUE"));
    }
}
