use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Version of a stored value, used for optimistic concurrency control.
///
/// Version 0 stands for "no value stored". The first write of a key produces
/// version 1 and every later write increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of an absent key (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version produced by the first write (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A value read from the store together with its version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    /// The key the value is stored under.
    pub key: String,

    /// The stored JSON document.
    pub value: serde_json::Value,

    /// Version of the value; pass it back in a conditional write.
    pub version: Version,

    /// When the value was last written.
    pub updated_at: DateTime<Utc>,
}

impl StateEntry {
    /// Deserializes the stored value into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering_and_next() {
        assert!(Version::initial() < Version::first());
        assert_eq!(Version::initial().next(), Version::first());
        assert_eq!(Version::new(7).next().as_i64(), 8);
    }

    #[test]
    fn entry_decodes_typed_value() {
        #[derive(Deserialize)]
        struct Stock {
            quantity: u32,
        }

        let entry = StateEntry {
            key: "Cars".to_string(),
            value: serde_json::json!({ "quantity": 12 }),
            version: Version::first(),
            updated_at: Utc::now(),
        };

        let stock: Stock = entry.decode().unwrap();
        assert_eq!(stock.quantity, 12);
    }

    #[test]
    fn entry_decode_reports_shape_mismatch() {
        let entry = StateEntry {
            key: "Cars".to_string(),
            value: serde_json::json!("not an object"),
            version: Version::first(),
            updated_at: Utc::now(),
        };

        let result: Result<std::collections::HashMap<String, u32>, _> = entry.decode();
        assert!(result.is_err());
    }
}
