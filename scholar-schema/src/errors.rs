use scholar_core::errors::ScholarError;
use serde_json::{json, Map, Value};

/// Field-path keyed validation messages, serialized as
/// `{"field": ["msg", ...], "_schema": [...]}`.
#[derive(Debug, Default)]
pub struct SchemaErrors {
    map: Map<String, Value>,
}

impl SchemaErrors {
    pub fn push_schema(&mut self, msg: impl Into<String>) {
        Self::push_to(&mut self.map, "_schema", msg);
    }

    pub fn push_field(&mut self, field: &str, msg: impl Into<String>) {
        Self::push_to(&mut self.map, field, msg);
    }

    fn push_to(map: &mut Map<String, Value>, key: &str, msg: impl Into<String>) {
        let msg = Value::String(msg.into());
        match map.get_mut(key) {
            Some(Value::Array(arr)) => arr.push(msg),
            _ => {
                map.insert(key.to_string(), Value::Array(vec![msg]));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }

    pub fn into_unprocessable_anyhow(self, message: &str) -> anyhow::Error {
        ScholarError::unprocessable(message)
            .with_errors(self.into_value())
            .into_anyhow()
    }
}

pub fn unprocessable(message: &str, errors: Value) -> anyhow::Error {
    ScholarError::unprocessable(message).with_errors(errors).into_anyhow()
}

pub fn schema_error(message: &str, msg: impl Into<String>) -> anyhow::Error {
    unprocessable(message, json!({"_schema": [msg.into()]}))
}
