//! The `Reading` record exchanged with the readings service.
//!
//! # Design
//! The client never interprets a reading; it only moves it between Rust and
//! JSON. Every field is optional on the wire and omitted when empty, and any
//! field this crate does not know about is kept in `extra` so a decoded
//! reading re-encodes to the same JSON object.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A timestamped value produced by a device for a named value descriptor.
///
/// Timestamps are milliseconds since the Unix epoch. `Reading::default()` is
/// the zero-valued record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub pushed: i64,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub origin: i64,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub modified: i64,
    /// Name of the device that produced the reading.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub device: String,
    /// Value descriptor name.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub value_type: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub float_encoding: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Unit-of-measure label.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub uom_label: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub reading_type: String,
    /// Fields not modelled above, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// Decode an explicit `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Reading {
        Reading {
            id: "7d5d6a3c-1f0e-4c41-9b1e-0d0c3f6f2a11".to_string(),
            created: 1_700_000_000_123,
            origin: 1_700_000_000_000,
            device: "thermostat-1".to_string(),
            name: "Temperature".to_string(),
            value: "21.5".to_string(),
            value_type: "Float64".to_string(),
            uom_label: "degC".to_string(),
            labels: vec!["hvac".to_string(), "indoor".to_string()],
            reading_type: "Float".to_string(),
            ..Reading::default()
        }
    }

    #[test]
    fn reading_uses_wire_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["device"], "thermostat-1");
        assert_eq!(json["valueType"], "Float64");
        assert_eq!(json["uomLabel"], "degC");
        assert_eq!(json["type"], "Float");
        assert_eq!(json["labels"][1], "indoor");
    }

    #[test]
    fn empty_fields_are_omitted() {
        let json = serde_json::to_value(Reading::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn reading_roundtrips_through_json() {
        let reading = sample();
        let json = serde_json::to_string(&reading).unwrap();
        let back: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn unknown_fields_pass_through() {
        let raw = r#"{"id":"r1","device":"d","binaryValue":"AAEC","tags":{"site":"a"}}"#;
        let reading: Reading = serde_json::from_str(raw).unwrap();
        assert_eq!(reading.id, "r1");
        assert_eq!(reading.extra["binaryValue"], "AAEC");

        let back = serde_json::to_value(&reading).unwrap();
        let original: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn missing_fields_decode_to_zero_values() {
        let reading: Reading = serde_json::from_str(r#"{"name":"Humidity"}"#).unwrap();
        assert_eq!(reading.name, "Humidity");
        assert_eq!(reading.created, 0);
        assert!(reading.labels.is_empty());
    }

    #[test]
    fn null_fields_decode_to_zero_values() {
        let raw = r#"{"id":"r1","created":null,"uomLabel":null,"labels":null,"type":null}"#;
        let reading: Reading = serde_json::from_str(raw).unwrap();
        assert_eq!(
            reading,
            Reading {
                id: "r1".to_string(),
                ..Reading::default()
            }
        );
    }
}
