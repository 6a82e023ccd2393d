//! Serializer/deserializer adapter between wire-safe JSON structures and
//! domain-object attribute maps.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::core::{CrudError, DataType, Record, Result, Value};
use crate::model::EntityModel;

pub type SerializeFn = Arc<dyn Fn(&EntityModel, &Record) -> Result<JsonValue> + Send + Sync>;
pub type DeserializeFn = Arc<dyn Fn(&EntityModel, &JsonValue) -> Result<Record> + Send + Sync>;

/// Convert one JSON value into a typed [`Value`].
pub fn convert(json: &JsonValue, expected: &DataType) -> Result<Value> {
    match (json, expected) {
        (JsonValue::Null, _) => Ok(Value::Null),

        (JsonValue::Bool(b), DataType::Boolean) => Ok(Value::Boolean(*b)),

        (JsonValue::Number(n), DataType::Integer) => n
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| CrudError::TypeMismatch(format!("Cannot convert {} to INTEGER", n))),

        // integers are accepted where floats are expected
        (JsonValue::Number(n), DataType::Float) => n
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| CrudError::TypeMismatch(format!("Cannot convert {} to FLOAT", n))),

        (JsonValue::String(s), DataType::Text) => Ok(Value::Text(s.clone())),

        (JsonValue::String(s), DataType::Timestamp) => {
            let dt = chrono::DateTime::parse_from_rfc3339(s)
                .map_err(|e| CrudError::TypeMismatch(format!("Invalid timestamp: {}", e)))?;
            Ok(Value::Timestamp(dt.with_timezone(&chrono::Utc)))
        }

        (JsonValue::String(s), DataType::Uuid) => {
            let u = uuid::Uuid::parse_str(s)
                .map_err(|e| CrudError::TypeMismatch(format!("Invalid UUID: {}", e)))?;
            Ok(Value::Uuid(u))
        }

        (v, DataType::Json) => Ok(Value::Json(v.clone())),

        _ => Err(CrudError::TypeMismatch(format!(
            "Cannot convert JSON {} to {}",
            json, expected
        ))),
    }
}

/// Default serializer: every attribute of the record, as a JSON object.
pub fn to_serializable(_model: &EntityModel, record: &Record) -> Result<JsonValue> {
    let mut obj = Map::new();
    for (key, value) in record {
        obj.insert(key.clone(), value.to_json());
    }
    Ok(JsonValue::Object(obj))
}

/// Default deserializer: maps wire keys onto the entity's declared fields.
/// Unknown keys are dropped; absent fields stay absent, so partial payloads
/// translate to partial attribute maps.
pub fn from_serializable(model: &EntityModel, wire: &JsonValue) -> Result<Record> {
    let obj = wire.as_object().ok_or_else(|| {
        CrudError::Serialization(format!("Expected a JSON object for {}", model.name()))
    })?;

    let mut record = Record::new();
    for field in model.fields() {
        if let Some(json) = obj.get(&field.name) {
            record.insert(field.name.clone(), convert(json, &field.data_type)?);
        }
    }
    Ok(record)
}

pub fn default_serializer() -> SerializeFn {
    Arc::new(to_serializable)
}

pub fn default_deserializer() -> DeserializeFn {
    Arc::new(from_serializable)
}
