//! States, state groups and the is-current query protocol.
//!
//! Class-level states and groups live inside a [`WorkflowDefinition`] and
//! have no owner. Each [`Workflow`] instance holds attached copies that carry
//! the instance's [`InstanceId`]; an is-current query resolves that id
//! through a [`StateLookup`] rather than holding a pointer back to the
//! instance.
//!
//! [`WorkflowDefinition`]: crate::WorkflowDefinition
//! [`Workflow`]: crate::Workflow

use crate::error::DocflowError;
use crate::value::StateValue;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Opaque identity of one workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wf-{}", self.0)
    }
}

/// Side table resolving an owner id to the live state value of its document.
pub trait StateLookup {
    /// Returns `None` when `owner` is not known to this lookup.
    fn current_value(&self, owner: InstanceId) -> Option<Result<StateValue, DocflowError>>;
}

/// Query protocol shared by states and groups.
pub trait StateQuery {
    fn name(&self) -> &str;

    fn owner(&self) -> Option<InstanceId>;

    /// Returns true if `value` is this state's value or one of this group's members.
    fn matches(&self, value: &StateValue) -> bool;

    /// Returns true if the owning instance's document is currently in this state.
    ///
    /// Fails with [`DocflowError::Unattached`] for class-level objects and
    /// for objects whose owner `lookup` does not know.
    fn is_current<L>(&self, lookup: &L) -> Result<bool, DocflowError>
    where
        L: StateLookup + ?Sized,
    {
        let unattached = || DocflowError::Unattached {
            state: self.name().to_string(),
        };
        let owner = self.owner().ok_or_else(unattached)?;
        let value = lookup.current_value(owner).ok_or_else(unattached)??;
        Ok(self.matches(&value))
    }
}

/// A named, valued point in a workflow.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    name: String,
    value: StateValue,
    title: String,
    description: String,
    #[serde(skip)]
    creation_order: u64,
    #[serde(skip)]
    owner: Option<InstanceId>,
}

impl State {
    pub(crate) fn new(
        name: impl Into<String>,
        value: StateValue,
        title: impl Into<String>,
        description: impl Into<String>,
        creation_order: u64,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            title: title.into(),
            description: description.into(),
            creation_order,
            owner: None,
        }
    }

    /// Returns a copy bound to the given instance.
    pub(crate) fn attach(&self, owner: InstanceId) -> Self {
        Self {
            owner: Some(owner),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &StateValue {
        &self.value
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Position in the declaration sequence; `states()` listings sort on it.
    pub fn creation_order(&self) -> u64 {
        self.creation_order
    }

    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }
}

impl StateQuery for State {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> Option<InstanceId> {
        self.owner
    }

    fn matches(&self, value: &StateValue) -> bool {
        self.value == *value
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.name == other.name
            && self.title == other.title
            && self.description == other.description
    }
}

impl Eq for State {}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<WorkflowState {:?}>", self.title)
    }
}

/// A group member as declared: a literal value or the name of another state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMember {
    Value(StateValue),
    State(String),
}

impl GroupMember {
    /// Refers to a state by name; resolved to its value when the definition is built.
    pub fn state(name: impl Into<String>) -> Self {
        GroupMember::State(name.into())
    }
}

impl From<StateValue> for GroupMember {
    fn from(value: StateValue) -> Self {
        GroupMember::Value(value)
    }
}

impl From<i64> for GroupMember {
    fn from(value: i64) -> Self {
        GroupMember::Value(value.into())
    }
}

impl From<i32> for GroupMember {
    fn from(value: i32) -> Self {
        GroupMember::Value(value.into())
    }
}

impl From<bool> for GroupMember {
    fn from(value: bool) -> Self {
        GroupMember::Value(value.into())
    }
}

/// A named set of state values, used for membership queries only.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    name: String,
    members: Vec<StateValue>,
    title: String,
    description: String,
    #[serde(skip)]
    creation_order: u64,
    #[serde(skip)]
    owner: Option<InstanceId>,
}

impl Group {
    pub(crate) fn new(
        name: impl Into<String>,
        members: Vec<StateValue>,
        title: impl Into<String>,
        description: impl Into<String>,
        creation_order: u64,
    ) -> Self {
        Self {
            name: name.into(),
            members,
            title: title.into(),
            description: description.into(),
            creation_order,
            owner: None,
        }
    }

    pub(crate) fn attach(&self, owner: InstanceId) -> Self {
        Self {
            owner: Some(owner),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member values in declaration order, without duplicates.
    pub fn members(&self) -> &[StateValue] {
        &self.members
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn creation_order(&self) -> u64 {
        self.creation_order
    }

    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }
}

impl StateQuery for Group {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> Option<InstanceId> {
        self.owner
    }

    fn matches(&self, value: &StateValue) -> bool {
        self.members.contains(value)
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
            && self.name == other.name
            && self.title == other.title
            && self.description == other.description
    }
}

impl Eq for Group {}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<WorkflowStateGroup {:?}>", self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup {
        id: InstanceId,
        value: StateValue,
    }

    impl StateLookup for FixedLookup {
        fn current_value(&self, owner: InstanceId) -> Option<Result<StateValue, DocflowError>> {
            (owner == self.id).then(|| Ok(self.value.clone()))
        }
    }

    #[test]
    fn test_unattached_state_fails() {
        let state = State::new("draft", StateValue::Int(0), "Draft", "", 1);
        let lookup = FixedLookup {
            id: InstanceId::new(),
            value: StateValue::Int(0),
        };

        let err = state.is_current(&lookup).unwrap_err();
        assert!(matches!(err, DocflowError::Unattached { ref state } if state == "draft"));
    }

    #[test]
    fn test_foreign_owner_is_unattached() {
        let state = State::new("draft", StateValue::Int(0), "Draft", "", 1).attach(InstanceId::new());
        let lookup = FixedLookup {
            id: InstanceId::new(),
            value: StateValue::Int(0),
        };

        assert!(matches!(
            state.is_current(&lookup),
            Err(DocflowError::Unattached { .. })
        ));
    }

    #[test]
    fn test_attached_state_query() {
        let id = InstanceId::new();
        let state = State::new("draft", StateValue::Int(0), "Draft", "", 1).attach(id);

        assert!(state
            .is_current(&FixedLookup {
                id,
                value: StateValue::Int(0)
            })
            .unwrap());
        assert!(!state
            .is_current(&FixedLookup {
                id,
                value: StateValue::Int(1)
            })
            .unwrap());
    }

    #[test]
    fn test_group_membership() {
        let id = InstanceId::new();
        let members = vec![StateValue::Int(0), StateValue::Int(1)];
        let group = Group::new("not_published", members, "Not Published", "", 6).attach(id);

        for (value, expected) in [(0, true), (1, true), (2, false), (3, false), (4, false)] {
            let lookup = FixedLookup {
                id,
                value: StateValue::Int(value),
            };
            assert_eq!(group.is_current(&lookup).unwrap(), expected, "value {}", value);
        }
    }

    #[test]
    fn test_attach_leaves_original_unowned() {
        let state = State::new("draft", StateValue::Int(0), "Draft", "", 1);
        let attached = state.attach(InstanceId::new());

        assert!(!state.is_attached());
        assert!(attached.is_attached());
        assert_eq!(state, attached);
    }

    #[test]
    fn test_display() {
        let state = State::new("draft", StateValue::Int(0), "Draft", "", 1);
        let group = Group::new("not_published", vec![StateValue::Int(0)], "Not Published", "", 2);
        assert_eq!(state.to_string(), "<WorkflowState \"Draft\">");
        assert_eq!(group.to_string(), "<WorkflowStateGroup \"Not Published\">");
    }
}
