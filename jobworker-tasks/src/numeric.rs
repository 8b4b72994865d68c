//! Flexible numeric input parsing shared by the scoring tasks (§4.10):
//! accepts a JSON number or a comma-stripped numeric string, matching the
//! readiness/match-score contract ("integer, float, and comma-stripped
//! string forms").

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlexNumber(pub f64);

impl FlexNumber {
    pub fn clamp_non_negative(self) -> f64 {
        self.0.max(0.0)
    }

    pub fn clamp(self, min: f64, max: f64) -> f64 {
        self.0.clamp(min, max)
    }
}

impl<'de> Deserialize<'de> for FlexNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlexNumberVisitor;

        impl<'de> Visitor<'de> for FlexNumberVisitor {
            type Value = FlexNumber;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or a numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(FlexNumber(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(FlexNumber(v as f64))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(FlexNumber(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                let cleaned: String = v.chars().filter(|c| *c != ',').collect();
                cleaned
                    .trim()
                    .parse::<f64>()
                    .map(FlexNumber)
                    .map_err(|_| de::Error::custom(format!("'{v}' is not a numeric string")))
            }
        }

        deserializer.deserialize_any(FlexNumberVisitor)
    }
}
