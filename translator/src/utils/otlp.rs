//! OTLP attribute helpers

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};

use crate::data::Dimension;

/// Convert attributes to dimensions, keeping attribute order.
/// Attributes without a value are skipped.
pub fn attributes_to_dimensions(attrs: &[KeyValue]) -> Vec<Dimension> {
    attrs
        .iter()
        .filter_map(|kv| {
            kv.value
                .as_ref()
                .map(|v| Dimension::new(kv.key.clone(), any_value_to_string(v)))
        })
        .collect()
}

/// String form of an attribute value. Arrays and maps become JSON,
/// bytes become hex.
pub fn any_value_to_string(value: &AnyValue) -> String {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => s.clone(),
        Some(any_value::Value::BoolValue(b)) => b.to_string(),
        Some(any_value::Value::IntValue(i)) => i.to_string(),
        Some(any_value::Value::DoubleValue(d)) => d.to_string(),
        Some(any_value::Value::ArrayValue(_)) | Some(any_value::Value::KvlistValue(_)) => {
            any_value_to_json(value).to_string()
        }
        Some(any_value::Value::BytesValue(b)) => hex::encode(b),
        None => String::new(),
    }
}

fn any_value_to_json(value: &AnyValue) -> serde_json::Value {
    match &value.value {
        Some(any_value::Value::ArrayValue(arr)) => {
            serde_json::Value::Array(arr.values.iter().map(any_value_to_json).collect())
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            let map: serde_json::Map<String, serde_json::Value> = kvlist
                .values
                .iter()
                .filter_map(|kv| {
                    kv.value
                        .as_ref()
                        .map(|v| (kv.key.clone(), any_value_to_json(v)))
                })
                .collect();
            serde_json::Value::Object(map)
        }
        Some(any_value::Value::IntValue(i)) => serde_json::json!(i),
        Some(any_value::Value::DoubleValue(d)) => serde_json::json!(d),
        Some(any_value::Value::BoolValue(b)) => serde_json::json!(b),
        _ => serde_json::Value::String(any_value_to_string(value)),
    }
}
