//! State values stored inside documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The value a document stores to record its workflow state.
///
/// Serialized untagged, so a JSON or YAML document carries plain `0`,
/// `"draft"` or `true`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl StateValue {
    /// Converts a JSON value. Floats, arrays, objects and null have no state value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(StateValue::Bool(*b)),
            Value::Number(n) => n.as_i64().map(StateValue::Int),
            Value::String(s) => Some(StateValue::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            StateValue::Bool(b) => Value::Bool(*b),
            StateValue::Int(i) => Value::from(*i),
            StateValue::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StateValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Bool(b) => write!(f, "{}", b),
            StateValue::Int(i) => write!(f, "{}", i),
            StateValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<i64> for StateValue {
    fn from(i: i64) -> Self {
        StateValue::Int(i)
    }
}

impl From<i32> for StateValue {
    fn from(i: i32) -> Self {
        StateValue::Int(i64::from(i))
    }
}

impl From<u32> for StateValue {
    fn from(i: u32) -> Self {
        StateValue::Int(i64::from(i))
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Str(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::Str(s)
    }
}

impl TryFrom<StateValue> for bool {
    type Error = StateValue;

    fn try_from(value: StateValue) -> Result<Self, Self::Error> {
        match value {
            StateValue::Bool(b) => Ok(b),
            other => Err(other),
        }
    }
}

impl TryFrom<StateValue> for i64 {
    type Error = StateValue;

    fn try_from(value: StateValue) -> Result<Self, Self::Error> {
        match value {
            StateValue::Int(i) => Ok(i),
            other => Err(other),
        }
    }
}

impl TryFrom<StateValue> for i32 {
    type Error = StateValue;

    fn try_from(value: StateValue) -> Result<Self, Self::Error> {
        match value {
            StateValue::Int(i) => i32::try_from(i).map_err(|_| StateValue::Int(i)),
            other => Err(other),
        }
    }
}

impl TryFrom<StateValue> for String {
    type Error = StateValue;

    fn try_from(value: StateValue) -> Result<Self, Self::Error> {
        match value {
            StateValue::Str(s) => Ok(s),
            other => Err(other),
        }
    }
}
