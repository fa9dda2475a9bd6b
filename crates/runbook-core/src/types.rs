use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A unit of loosely-typed data moving through the engine.
///
/// Trigger contexts, agent inputs, and approval payloads are all carried as
/// JSON values; this wrapper adds the small set of helpers the engine needs,
/// including dotted-path lookups used by condition evaluation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    /// The inner JSON value
    pub value: serde_json::Value,
}

impl Payload {
    /// Create a new payload from a JSON value
    #[inline]
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Create a null payload
    #[inline]
    pub fn null() -> Self {
        Self {
            value: serde_json::Value::Null,
        }
    }

    /// Get the inner JSON value
    #[inline]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Take ownership of the inner JSON value
    #[inline]
    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    /// Check if the payload is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Try to view the payload as an object map
    #[inline]
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.value.as_object()
    }

    /// Resolve a dotted path (`"lease.region"`) inside the payload.
    ///
    /// Each segment is an object key; numeric segments index into arrays.
    /// Returns `None` as soon as a segment does not resolve.
    pub fn lookup(&self, path: &str) -> Option<&serde_json::Value> {
        let mut current = &self.value;
        for segment in path.split('.') {
            current = match current {
                serde_json::Value::Object(map) => map.get(segment)?,
                serde_json::Value::Array(items) => {
                    let index: usize = segment.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Try to convert the payload to a specific type
    pub fn to<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.value.clone())
    }

    /// Create a payload from a serializable value
    pub fn from<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        Ok(Self::new(serde_json::to_value(value)?))
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::null()
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}
