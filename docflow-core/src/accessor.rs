//! Reading and writing the state value inside a document.
//!
//! A definition picks exactly one [`StateAccessor`]:
//!
//! - `Attribute(name)` - a named field, exposed through [`Document::attribute`]
//! - `Key(name)` - an entry of a keyed container, through [`Document::entry`]
//! - `Custom { get, set }` - caller-supplied getter and setter
//!
//! Structs get attribute access from the [`document_attributes!`] macro:
//!
//! ```
//! use docflow_core::{document_attributes, Document, StateValue};
//!
//! #[derive(Default)]
//! struct Article {
//!     status: Option<i64>,
//! }
//!
//! document_attributes!(Article { status });
//!
//! let mut article = Article::default();
//! assert_eq!(article.attribute("status"), None);
//! assert!(article.set_attribute("status", StateValue::Int(1)));
//! assert_eq!(article.status, Some(1));
//! ```
//!
//! [`document_attributes!`]: crate::document_attributes

use crate::error::DocflowError;
use crate::value::StateValue;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A record whose workflow state is stored inside it.
///
/// Every hook defaults to "not supported"; implement the ones matching the
/// accessor the workflow definition uses. Custom accessors need none.
pub trait Document {
    /// Reads a named attribute. `None` if absent or unset.
    fn attribute(&self, _name: &str) -> Option<StateValue> {
        None
    }

    /// Writes a named attribute. Returns false if the attribute cannot hold the value.
    fn set_attribute(&mut self, _name: &str, _value: StateValue) -> bool {
        false
    }

    /// Reads a keyed entry. `None` if absent.
    fn entry(&self, _key: &str) -> Option<StateValue> {
        None
    }

    /// Writes a keyed entry. Returns false if the container refuses it.
    fn set_entry(&mut self, _key: &str, _value: StateValue) -> bool {
        false
    }
}

/// Implements [`Document`] attribute access for struct fields of type `Option<T>`,
/// where `T: Clone + Into<StateValue> + TryFrom<StateValue>`.
#[macro_export]
macro_rules! document_attributes {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::Document for $ty {
            fn attribute(&self, name: &str) -> ::std::option::Option<$crate::StateValue> {
                $(
                    if name == stringify!($field) {
                        return self.$field.clone().map(::std::convert::Into::into);
                    }
                )+
                None
            }

            fn set_attribute(&mut self, name: &str, value: $crate::StateValue) -> bool {
                $(
                    if name == stringify!($field) {
                        return match ::std::convert::TryFrom::try_from(value) {
                            Ok(v) => {
                                self.$field = Some(v);
                                true
                            }
                            Err(_) => false,
                        };
                    }
                )+
                let _ = value;
                false
            }
        }
    };
}

impl Document for Map<String, Value> {
    fn attribute(&self, name: &str) -> Option<StateValue> {
        Document::entry(self, name)
    }

    fn set_attribute(&mut self, name: &str, value: StateValue) -> bool {
        Document::set_entry(self, name, value)
    }

    fn entry(&self, key: &str) -> Option<StateValue> {
        self.get(key).and_then(StateValue::from_json)
    }

    fn set_entry(&mut self, key: &str, value: StateValue) -> bool {
        self.insert(key.to_string(), value.to_json());
        true
    }
}

/// JSON objects expose their fields both as attributes and as keys.
impl Document for Value {
    fn attribute(&self, name: &str) -> Option<StateValue> {
        self.as_object().and_then(|obj| Document::entry(obj, name))
    }

    fn set_attribute(&mut self, name: &str, value: StateValue) -> bool {
        self.as_object_mut()
            .map(|obj| Document::set_entry(obj, name, value))
            .unwrap_or(false)
    }

    fn entry(&self, key: &str) -> Option<StateValue> {
        self.attribute(key)
    }

    fn set_entry(&mut self, key: &str, value: StateValue) -> bool {
        self.set_attribute(key, value)
    }
}

impl Document for HashMap<String, StateValue> {
    fn entry(&self, key: &str) -> Option<StateValue> {
        self.get(key).cloned()
    }

    fn set_entry(&mut self, key: &str, value: StateValue) -> bool {
        self.insert(key.to_string(), value);
        true
    }
}

impl Document for BTreeMap<String, StateValue> {
    fn entry(&self, key: &str) -> Option<StateValue> {
        self.get(key).cloned()
    }

    fn set_entry(&mut self, key: &str, value: StateValue) -> bool {
        self.insert(key.to_string(), value);
        true
    }
}

/// Reads the state value of a document, `None` if it has none.
pub type StateGetter<D> = Arc<dyn Fn(&D) -> Option<StateValue> + Send + Sync>;

/// Writes the state value into a document.
pub type StateSetter<D> = Arc<dyn Fn(&mut D, StateValue) -> Result<(), DocflowError> + Send + Sync>;

/// How a workflow definition locates the state value inside its documents.
pub enum StateAccessor<D> {
    Attribute(String),
    Key(String),
    Custom {
        get: StateGetter<D>,
        set: StateSetter<D>,
    },
}

impl<D> StateAccessor<D> {
    pub fn custom<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&D) -> Option<StateValue> + Send + Sync + 'static,
        S: Fn(&mut D, StateValue) -> Result<(), DocflowError> + Send + Sync + 'static,
    {
        StateAccessor::Custom {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Short description used in log lines and declaration tables.
    pub fn describe(&self) -> String {
        match self {
            StateAccessor::Attribute(name) => format!("attribute '{}'", name),
            StateAccessor::Key(key) => format!("key '{}'", key),
            StateAccessor::Custom { .. } => "custom accessor".to_string(),
        }
    }
}

impl<D: Document> StateAccessor<D> {
    /// Reads the raw state value. Fails with `UnknownState` if the document has none.
    pub fn read(&self, document: &D) -> Result<StateValue, DocflowError> {
        let value = match self {
            StateAccessor::Attribute(name) => document.attribute(name),
            StateAccessor::Key(key) => document.entry(key),
            StateAccessor::Custom { get, .. } => get(document),
        };
        value.ok_or_else(|| DocflowError::UnknownState {
            value: format!("no value at {}", self.describe()),
        })
    }

    /// Writes the state value. Fails with `StateNotWritable` if the document refuses it.
    pub fn write(&self, document: &mut D, value: StateValue) -> Result<(), DocflowError> {
        let written = match self {
            StateAccessor::Attribute(name) => document.set_attribute(name, value.clone()),
            StateAccessor::Key(key) => document.set_entry(key, value.clone()),
            StateAccessor::Custom { set, .. } => return set(document, value),
        };
        if written {
            Ok(())
        } else {
            Err(DocflowError::StateNotWritable {
                reason: format!("document rejected value {} at {}", value, self.describe()),
            })
        }
    }
}

impl<D> Clone for StateAccessor<D> {
    fn clone(&self) -> Self {
        match self {
            StateAccessor::Attribute(name) => StateAccessor::Attribute(name.clone()),
            StateAccessor::Key(key) => StateAccessor::Key(key.clone()),
            StateAccessor::Custom { get, set } => StateAccessor::Custom {
                get: Arc::clone(get),
                set: Arc::clone(set),
            },
        }
    }
}

impl<D> fmt::Debug for StateAccessor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateAccessor::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            StateAccessor::Key(key) => f.debug_tuple("Key").field(key).finish(),
            StateAccessor::Custom { .. } => f.write_str("Custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Article {
        status: Option<i64>,
        label: Option<String>,
    }

    crate::document_attributes!(Article { status, label });

    #[test]
    fn test_attribute_accessor() {
        let accessor = StateAccessor::<Article>::Attribute("status".to_string());
        let mut doc = Article::default();

        assert!(matches!(
            accessor.read(&doc),
            Err(DocflowError::UnknownState { .. })
        ));

        accessor.write(&mut doc, StateValue::Int(2)).unwrap();
        assert_eq!(doc.status, Some(2));
        assert_eq!(accessor.read(&doc).unwrap(), StateValue::Int(2));
    }

    #[test]
    fn test_attribute_type_mismatch_is_not_writable() {
        let accessor = StateAccessor::<Article>::Attribute("status".to_string());
        let mut doc = Article::default();

        let err = accessor
            .write(&mut doc, StateValue::from("published"))
            .unwrap_err();
        assert!(matches!(err, DocflowError::StateNotWritable { .. }));
        assert_eq!(doc.status, None);
    }

    #[test]
    fn test_missing_attribute() {
        let accessor = StateAccessor::<Article>::Attribute("missing".to_string());
        let mut doc = Article {
            status: Some(0),
            label: None,
        };

        assert!(accessor.read(&doc).is_err());
        assert!(accessor.write(&mut doc, StateValue::Int(1)).is_err());
    }

    #[test]
    fn test_key_accessor_on_json() {
        let accessor = StateAccessor::<Value>::Key("status".to_string());
        let mut doc = json!({});

        assert!(matches!(
            accessor.read(&doc),
            Err(DocflowError::UnknownState { .. })
        ));

        accessor.write(&mut doc, StateValue::Int(1)).unwrap();
        assert_eq!(doc, json!({"status": 1}));
    }

    #[test]
    fn test_key_accessor_on_non_object() {
        let accessor = StateAccessor::<Value>::Key("status".to_string());
        let mut doc = json!([1, 2]);

        assert!(accessor.read(&doc).is_err());
        assert!(matches!(
            accessor.write(&mut doc, StateValue::Int(1)),
            Err(DocflowError::StateNotWritable { .. })
        ));
    }

    #[test]
    fn test_key_accessor_on_map() {
        let accessor = StateAccessor::<HashMap<String, StateValue>>::Key("status".to_string());
        let mut doc = HashMap::new();
        doc.insert("status".to_string(), StateValue::from("draft"));

        assert_eq!(accessor.read(&doc).unwrap(), StateValue::from("draft"));
        accessor.write(&mut doc, StateValue::from("pending")).unwrap();
        assert_eq!(doc["status"], StateValue::from("pending"));
    }

    #[test]
    fn test_unsupported_hooks_refuse() {
        let accessor = StateAccessor::<HashMap<String, StateValue>>::Attribute("status".to_string());
        let mut doc = HashMap::new();
        doc.insert("status".to_string(), StateValue::Int(0));

        assert!(accessor.read(&doc).is_err());
        assert!(matches!(
            accessor.write(&mut doc, StateValue::Int(1)),
            Err(DocflowError::StateNotWritable { .. })
        ));

        let keyed = StateAccessor::<Article>::Key("status".to_string());
        assert!(keyed.read(&Article::default()).is_err());
    }

    #[test]
    fn test_custom_accessor() {
        let accessor = StateAccessor::<Article>::custom(
            |doc| doc.label.clone().map(StateValue::from),
            |doc, value| {
                doc.label = Some(String::try_from(value).map_err(|v| {
                    DocflowError::StateNotWritable {
                        reason: format!("label must be a string, got {}", v),
                    }
                })?);
                Ok(())
            },
        );
        let mut doc = Article::default();

        accessor.write(&mut doc, StateValue::from("draft")).unwrap();
        assert_eq!(accessor.read(&doc).unwrap(), StateValue::from("draft"));
        assert!(accessor.write(&mut doc, StateValue::Int(3)).is_err());
        assert_eq!(doc.label.as_deref(), Some("draft"));
    }
}
