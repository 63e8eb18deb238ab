//! Conversion between JSON strings and smithy `Document` values

use crate::errs::{Error, Result};
use aws_smithy_types::{Document, Number};
use serde_json::Value;
use std::collections::HashMap;

pub fn document_from_json_string(s: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(s).map_err(|e| Error::InvalidJson(e.to_string()))?;
    Ok(document_from_value(value))
}

pub fn document_to_json_string(document: &Document) -> Result<String> {
    serde_json::to_string(&document_to_value(document)).map_err(|e| Error::InvalidJson(e.to_string()))
}

pub fn document_from_value(value: Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                Document::Number(Number::Float(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => Document::String(s),
        Value::Array(items) => Document::Array(items.into_iter().map(document_from_value).collect()),
        Value::Object(map) => Document::Object(
            map.into_iter()
                .map(|(k, v)| (k, document_from_value(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

pub fn document_to_value(document: &Document) -> Value {
    match document {
        Document::Null => Value::Null,
        Document::Bool(b) => Value::Bool(*b),
        Document::Number(Number::PosInt(u)) => Value::from(*u),
        Document::Number(Number::NegInt(i)) => Value::from(*i),
        Document::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Document::String(s) => Value::String(s.clone()),
        Document::Array(items) => Value::Array(items.iter().map(document_to_value).collect()),
        Document::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_to_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_survives_document_conversion() {
        let json = r#"{"a":[1,-2,2.5,"x",true,null],"b":{"c":"d"}}"#;
        let document = document_from_json_string(json).unwrap();
        assert_eq!(document_to_json_string(&document).unwrap(), json);
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            document_from_json_string("{nope"),
            Err(Error::InvalidJson(_))
        ));
    }
}
