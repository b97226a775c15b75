//! Business keys.

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Supplies the business key stored alongside a consistency record.
///
/// Best-effort: return an empty string when the type has no meaningful key.
pub trait BusinessKey {
    fn business_key(&self) -> String;
}

impl<T: BusinessKey + ?Sized> BusinessKey for &T {
    fn business_key(&self) -> String {
        (**self).business_key()
    }
}

impl BusinessKey for String {
    fn business_key(&self) -> String {
        String::new()
    }
}

impl BusinessKey for str {
    fn business_key(&self) -> String {
        String::new()
    }
}

/// Uses the top-level `"id"` field of a JSON object.
impl BusinessKey for Value {
    fn business_key(&self) -> String {
        match self.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            Some(Value::Bool(id)) => id.to_string(),
            _ => String::new(),
        }
    }
}

/// Pairs a payload with an explicit key, for types without a `BusinessKey` impl.
///
/// Serializes exactly like the wrapped value.
pub struct Keyed<'a, T: ?Sized> {
    key: String,
    value: &'a T,
}

impl<'a, T: ?Sized> Keyed<'a, T> {
    pub fn new(key: impl Into<String>, value: &'a T) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl<T: ?Sized> BusinessKey for Keyed<'_, T> {
    fn business_key(&self) -> String {
        self.key.clone()
    }
}

impl<T: Serialize + ?Sized> Serialize for Keyed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}
