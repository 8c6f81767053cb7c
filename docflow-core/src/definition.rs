//! Declaration tables: the serde form of a workflow's declarations.
//!
//! ```yaml
//! name: ArticleWorkflow
//! state_attr: status
//! states:
//!   - { name: draft, value: 0, title: Draft }
//!   - { name: pending, value: 1, title: Pending }
//! groups:
//!   - { name: open, values: [0, 1], title: Open }
//! transitions:
//!   - name: submit
//!     from: draft
//!     to: pending
//!     title: Submit
//! ```

use crate::error::DocflowError;
use crate::value::StateValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// One state declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDecl {
    pub name: String,
    pub value: StateValue,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// One group declaration. Members may be literal values, state names, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<StateValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// One transition declaration, possibly from several source states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDecl {
    pub name: String,

    /// Source state(s): a single name or a list of names.
    #[serde(deserialize_with = "deserialize_from_states")]
    pub from: Vec<String>,

    pub to: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

fn deserialize_from_states<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct FromStatesVisitor;

    impl<'de> Visitor<'de> for FromStatesVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a state name or a list of state names")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut states = Vec::new();
            while let Some(s) = seq.next_element::<String>()? {
                states.push(s);
            }
            Ok(states)
        }
    }

    deserializer.deserialize_any(FromStatesVisitor)
}

/// Raw workflow definition as stored or loaded from a file.
///
/// At most one of `state_attr` and `state_key` may be set. A table with
/// neither can only be built on top of a parent definition, or with a custom
/// accessor supplied to the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinitionRaw {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_attr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    #[serde(default)]
    pub states: Vec<StateDecl>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupDecl>,

    #[serde(default)]
    pub transitions: Vec<TransitionDecl>,

    /// Optional metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl WorkflowDefinitionRaw {
    pub fn from_json(json: &Value) -> Result<Self, DocflowError> {
        Ok(serde_json::from_value(json.clone())?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, DocflowError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml(s: &str) -> Result<Self, DocflowError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Loads a table from a file: YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DocflowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn to_json(&self) -> Result<Value, DocflowError> {
        Ok(serde_json::to_value(self)?)
    }

    /// CRC32C of the canonical JSON encoding, as 8 hex digits.
    pub fn checksum(&self) -> Result<String, DocflowError> {
        let json_bytes = serde_json::to_vec(self)?;
        Ok(format!("{:08x}", crc32c::crc32c(&json_bytes)))
    }
}
