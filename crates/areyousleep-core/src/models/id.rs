use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier for a backend entity.
///
/// The backend hands out numeric ids, but realtime payloads and query strings
/// may carry them as strings. Two ids are equal when their textual forms match,
/// and an id that arrived as a number is sent back as a number.
#[derive(Debug, Clone, Eq)]
pub struct Id {
    value: String,
    numeric: bool,
}

pub type UserId = Id;
pub type RequestId = Id;

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            numeric: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self {
            value: value.to_string(),
            numeric: true,
        }
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.numeric {
            if let Ok(n) = self.value.parse::<i64>() {
                return serializer.serialize_i64(n);
            }
        }
        serializer.serialize_str(&self.value)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Id::from(n),
            Raw::Text(s) => Id::new(s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_and_string_ids_compare_equal() {
        let from_number: Id = serde_json::from_str("2").unwrap();
        let from_string: Id = serde_json::from_str("\"2\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number.as_str(), "2");
    }

    #[test]
    fn test_numeric_id_serializes_as_number() {
        let id: Id = serde_json::from_str("42").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let id = Id::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
