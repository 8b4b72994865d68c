//! Variables codec (§3, §4.6, §6).
//!
//! The orchestrator's variables blob is a UTF-8 JSON document whose numeric
//! values are doubles even when the workflow author typed an integer literal
//! (integer workflow variables arrive as doubles). [`FlexInt`] coerces a
//! double back to an integer when lossless, and also accepts string-encoded
//! numbers with thousands separators, matching §4.6's boundary semantics.
//! Anything else fails to parse, which the job adapter turns into
//! `PARSE_ERROR`.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use jobworker_shared::error::{ErrorKind, ErrorRecord};

/// Decode the orchestrator's variables blob (raw UTF-8 JSON bytes) into a
/// generic document value. Malformed bytes surface as `PARSE_ERROR`.
pub fn decode_document(blob: &[u8]) -> Result<Value, ErrorRecord> {
    let text = std::str::from_utf8(blob).map_err(|e| {
        ErrorRecord::new(ErrorKind::ParseError, "variables blob is not valid UTF-8")
            .with_detail(e.to_string())
    })?;
    serde_json::from_str(text).map_err(|e| {
        ErrorRecord::new(ErrorKind::ParseError, "variables blob is not a valid document")
            .with_detail(e.to_string())
    })
}

/// Decode a document into a task's typed input. Any mismatch (missing
/// field, wrong type, lossy numeric coercion) surfaces as `PARSE_ERROR`.
pub fn decode_input<T: serde::de::DeserializeOwned>(doc: &Value) -> Result<T, ErrorRecord> {
    serde_json::from_value(doc.clone()).map_err(|e| {
        ErrorRecord::new(ErrorKind::ParseError, "variables do not match the task's input shape")
            .with_detail(e.to_string())
    })
}

/// Serialize a task's typed output back into the variables wire encoding.
pub fn encode_output<T: Serialize>(output: &T) -> Result<Value, ErrorRecord> {
    serde_json::to_value(output).map_err(|e| {
        ErrorRecord::new(ErrorKind::Unknown, "failed to encode output as variables")
            .with_detail(e.to_string())
    })
}

/// An integer accepted from the variables wire format: a JSON number (with
/// a lossless integer value), or a string-encoded number with optional
/// thousands separators (e.g. `"1,000,000"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FlexInt(pub i64);

impl<'de> Deserialize<'de> for FlexInt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlexIntVisitor;

        impl<'de> Visitor<'de> for FlexIntVisitor {
            type Value = FlexInt;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer, a lossless float, or a numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(FlexInt(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map(FlexInt)
                    .map_err(|_| de::Error::custom("integer out of range"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                if v.fract() == 0.0 && v.is_finite() {
                    Ok(FlexInt(v as i64))
                } else {
                    Err(de::Error::custom(format!(
                        "float {v} cannot be losslessly coerced to an integer"
                    )))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                let cleaned: String = v.chars().filter(|c| *c != ',').collect();
                cleaned
                    .parse::<i64>()
                    .map(FlexInt)
                    .map_err(|_| de::Error::custom(format!("'{v}' is not a numeric string")))
            }
        }

        deserializer.deserialize_any(FlexIntVisitor)
    }
}

impl Serialize for FlexInt {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl From<FlexInt> for i64 {
    fn from(v: FlexInt) -> Self {
        v.0
    }
}
