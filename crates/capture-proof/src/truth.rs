//! # Truth and Facts
//!
//! [`Truth`] is the set of facts each provider observed at capture time,
//! stamped with the capture timestamp. A provider's [`Facts`] is a flat map
//! from fact id to a boolean, number, or string. A fact the provider could
//! not determine is simply absent from the map.

use std::collections::BTreeMap;

use capture_core::error::json_type_name;
use capture_core::{CanonicalBytes, ProviderId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest integer an IEEE double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A single observed fact value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl FactValue {
    /// A numeric fact. Integral values within the exact-integer range are
    /// stored as integers so `1.0` and `1` compare equal. `None` for NaN
    /// and infinities, which JSON cannot carry.
    pub fn number(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
            return Some(Self::Number((value as i64).into()));
        }
        serde_json::Number::from_f64(value).map(Self::Number)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Numbers in their canonical shortest form, strings without quotes.
impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => f.write_str(s),
            Self::Number(n) => match CanonicalBytes::from_value(Value::Number(n.clone())) {
                Ok(text) => f.write_str(text.as_str()),
                Err(_) => write!(f, "{n}"),
            },
        }
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FactValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for FactValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

/// Facts reported by one provider, keyed by fact id.
pub type Facts = BTreeMap<String, FactValue>;

/// Fact ids with dedicated accessors on [`Proof`](crate::Proof).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultFactId {
    DeviceName,
    GeolocationLatitude,
    GeolocationLongitude,
}

impl DefaultFactId {
    pub const ALL: [DefaultFactId; 3] = [
        Self::DeviceName,
        Self::GeolocationLatitude,
        Self::GeolocationLongitude,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceName => "DEVICE_NAME",
            Self::GeolocationLatitude => "GEOLOCATION_LATITUDE",
            Self::GeolocationLongitude => "GEOLOCATION_LONGITUDE",
        }
    }
}

impl std::fmt::Display for DefaultFactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What every provider observed, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Truth {
    pub timestamp: Timestamp,
    pub providers: BTreeMap<ProviderId, Facts>,
}

impl Truth {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            providers: BTreeMap::new(),
        }
    }

    /// Builder-style insertion of one provider's facts.
    pub fn with_provider(mut self, id: impl Into<ProviderId>, facts: Facts) -> Self {
        self.providers.insert(id.into(), facts);
        self
    }

    /// Validate untyped JSON as a truth.
    ///
    /// `timestamp` must be an integer; `providers` must be an object whose
    /// members are all valid facts maps.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject {
            what: "truth",
            found: json_type_name(value),
        })?;

        let timestamp = match obj.get("timestamp") {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| ValidationError::InvalidField {
                field: "timestamp",
                reason: format!("must be an integer number of milliseconds, got {n}"),
            })?,
            Some(other) => {
                return Err(ValidationError::InvalidField {
                    field: "timestamp",
                    reason: format!("must be a number, found {}", json_type_name(other)),
                })
            }
            None => {
                return Err(ValidationError::InvalidField {
                    field: "timestamp",
                    reason: "missing".into(),
                })
            }
        };

        let providers_value = obj.get("providers").ok_or(ValidationError::InvalidField {
            field: "providers",
            reason: "missing".into(),
        })?;
        let providers_obj = providers_value
            .as_object()
            .ok_or(ValidationError::NotAnObject {
                what: "providers",
                found: json_type_name(providers_value),
            })?;

        let mut providers = BTreeMap::new();
        for (id, facts) in providers_obj {
            providers.insert(ProviderId::new(id.as_str()), facts_from_value(id, facts)?);
        }
        Ok(Self {
            timestamp: Timestamp::from_millis(timestamp),
            providers,
        })
    }
}

/// Validate untyped JSON as a facts map.
///
/// Accepts exactly an object whose members are booleans, numbers, or
/// strings. Nested objects, arrays, and `null` are rejected.
pub fn validate_facts(value: &Value) -> Result<Facts, ValidationError> {
    facts_from_value("", value)
}

fn facts_from_value(provider: &str, value: &Value) -> Result<Facts, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject {
        what: "facts",
        found: json_type_name(value),
    })?;
    obj.iter()
        .map(|(fact, v)| {
            let fact_value = match v {
                Value::Bool(b) => FactValue::Bool(*b),
                Value::Number(n) => FactValue::Number(n.clone()),
                Value::String(s) => FactValue::String(s.clone()),
                other => {
                    return Err(ValidationError::InvalidFactValue {
                        provider: provider.to_string(),
                        fact: fact.clone(),
                        found: json_type_name(other),
                    })
                }
            };
            Ok((fact.clone(), fact_value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_facts_accepts_flat_scalars() {
        let facts = validate_facts(&json!({"A": true, "B": 1.5, "C": "x"})).unwrap();
        assert_eq!(facts.len(), 3);
        assert_eq!(facts["A"], FactValue::Bool(true));
        assert_eq!(facts["C"].as_str(), Some("x"));
        assert_eq!(facts["B"].as_f64(), Some(1.5));
    }

    #[test]
    fn validate_facts_rejects_nesting_and_null() {
        for bad in [json!({"A": {"B": 1}}), json!({"A": [1]}), json!({"A": null})] {
            let err = validate_facts(&bad).unwrap_err();
            assert!(matches!(err, ValidationError::InvalidFactValue { .. }), "{bad}");
        }
        assert!(matches!(
            validate_facts(&json!([1, 2])),
            Err(ValidationError::NotAnObject { .. })
        ));
    }

    #[test]
    fn truth_from_value_validates_every_provider() {
        let ok = json!({"timestamp": 1605013246680i64, "providers": {"p": {"A": 1}}});
        let truth = Truth::from_value(&ok).unwrap();
        assert_eq!(truth.timestamp.as_millis(), 1605013246680);
        assert_eq!(truth.providers["p"]["A"], FactValue::from(1i64));

        let nested = json!({"timestamp": 0, "providers": {"p": {"A": {"deep": 1}}}});
        match Truth::from_value(&nested).unwrap_err() {
            ValidationError::InvalidFactValue { provider, fact, found } => {
                assert_eq!(provider, "p");
                assert_eq!(fact, "A");
                assert_eq!(found, "object");
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(Truth::from_value(&json!({"timestamp": 1.5, "providers": {}})).is_err());
        assert!(Truth::from_value(&json!({"timestamp": "now", "providers": {}})).is_err());
        assert!(Truth::from_value(&json!({"providers": {}})).is_err());
        assert!(Truth::from_value(&json!({"timestamp": 0})).is_err());
    }

    #[test]
    fn number_normalizes_integers() {
        assert_eq!(FactValue::number(1.0), Some(FactValue::from(1i64)));
        assert_eq!(FactValue::number(f64::NAN), None);
        assert_eq!(FactValue::number(f64::INFINITY), None);
        assert_eq!(FactValue::number(25.033).unwrap().as_f64(), Some(25.033));
    }

    #[test]
    fn display_matches_template_literal() {
        assert_eq!(FactValue::Bool(false).to_string(), "false");
        assert_eq!(FactValue::from("Pixel").to_string(), "Pixel");
        assert_eq!(FactValue::number(121.5654).unwrap().to_string(), "121.5654");
        assert_eq!(FactValue::number(3.0).unwrap().to_string(), "3");
        assert_eq!(FactValue::number(1e21).unwrap().to_string(), "1e+21");
    }

    #[test]
    fn truth_serializes_with_expected_field_names() {
        let truth = Truth::new(Timestamp::from_millis(5)).with_provider("p", Facts::new());
        assert_eq!(
            serde_json::to_string(&truth).unwrap(),
            r#"{"timestamp":5,"providers":{"p":{}}}"#
        );
    }
}
