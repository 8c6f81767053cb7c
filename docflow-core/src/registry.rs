//! Workflow definitions and their builder.
//!
//! A [`WorkflowDefinition`] is the class-level registry of one workflow: its
//! states, groups, transitions, accessor, permission evaluator and signal hub.
//! It is immutable once built and shared through `Arc`.

use crate::accessor::{Document, StateAccessor};
use crate::definition::{GroupDecl, StateDecl, TransitionDecl, WorkflowDefinitionRaw};
use crate::error::DocflowError;
use crate::signal::{SubscriptionId, TransitionEvent, TransitionSignals};
use crate::state::{Group, GroupMember, State};
use crate::transition::{
    noop_handler, shared_handler, Handler, Transition, TransitionBuilder, TransitionInfo,
};
use crate::value::StateValue;
use crate::workflow::Workflow;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Computes the permission tokens available to the caller of a workflow instance.
pub type PermissionFn<D, C> =
    Arc<dyn for<'w, 'd> Fn(&'w Workflow<'d, D, C>) -> HashSet<String> + Send + Sync>;

fn permission_fn<D, C, F>(f: F) -> PermissionFn<D, C>
where
    F: for<'w, 'd> Fn(&'w Workflow<'d, D, C>) -> HashSet<String> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct GroupDeclaration {
    name: String,
    title: String,
    description: String,
    members: Vec<GroupMember>,
    seq: u64,
}

/// Declares a workflow definition.
///
/// Declarations are numbered in call order. The numbers are offset past the
/// parent's highest creation order at build time, so inherited states always
/// list before the ones added here.
pub struct WorkflowBuilder<D, C = ()> {
    name: String,
    parent: Option<Arc<WorkflowDefinition<D, C>>>,
    seq: u64,
    accessors: Vec<StateAccessor<D>>,
    states: Vec<(u64, StateDecl)>,
    groups: Vec<GroupDeclaration>,
    transitions: Vec<TransitionBuilder<D, C>>,
    bound: Vec<(String, Handler<D, C>)>,
    permissions: Option<PermissionFn<D, C>>,
    meta: Option<Value>,
}

impl<D: 'static, C: 'static> WorkflowBuilder<D, C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            seq: 0,
            accessors: Vec::new(),
            states: Vec::new(),
            groups: Vec::new(),
            transitions: Vec::new(),
            bound: Vec::new(),
            permissions: None,
            meta: None,
        }
    }

    /// Starts from a copy of every declaration of `parent`.
    ///
    /// The new definition shares the parent's signal hub.
    pub fn extends(mut self, parent: &Arc<WorkflowDefinition<D, C>>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Stores the state value in a named attribute of the document.
    pub fn state_attr(mut self, name: impl Into<String>) -> Self {
        self.accessors.push(StateAccessor::Attribute(name.into()));
        self
    }

    /// Stores the state value under a key of a keyed document.
    pub fn state_key(mut self, key: impl Into<String>) -> Self {
        self.accessors.push(StateAccessor::Key(key.into()));
        self
    }

    /// Reads and writes the state value through caller-supplied functions.
    pub fn state_accessor<G, S>(mut self, get: G, set: S) -> Self
    where
        G: Fn(&D) -> Option<StateValue> + Send + Sync + 'static,
        S: Fn(&mut D, StateValue) -> Result<(), DocflowError> + Send + Sync + 'static,
    {
        self.accessors.push(StateAccessor::custom(get, set));
        self
    }

    pub fn state(
        mut self,
        name: impl Into<String>,
        value: impl Into<StateValue>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let seq = self.next_seq();
        self.states.push((
            seq,
            StateDecl {
                name: name.into(),
                value: value.into(),
                title: title.into(),
                description: description.into(),
            },
        ));
        self
    }

    /// Declares a group. Members are literal values or [`GroupMember::state`] references.
    pub fn group<I, M>(self, name: impl Into<String>, title: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<GroupMember>,
    {
        self.group_described(name, title, "", members)
    }

    pub fn group_described<I, M>(
        mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        members: I,
    ) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<GroupMember>,
    {
        let seq = self.next_seq();
        self.groups.push(GroupDeclaration {
            name: name.into(),
            title: title.into(),
            description: description.into(),
            members: members.into_iter().map(Into::into).collect(),
            seq,
        });
        self
    }

    pub fn transition(mut self, transition: TransitionBuilder<D, C>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Sets the permission evaluator. Without one, no permission token is ever held.
    pub fn permissions<F>(mut self, f: F) -> Self
    where
        F: for<'w, 'd> Fn(&'w Workflow<'d, D, C>) -> HashSet<String> + Send + Sync + 'static,
    {
        self.permissions = Some(permission_fn(f));
        self
    }

    /// Replaces the handler of every transition named `name`, own or inherited.
    pub fn bind_handler<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: for<'w, 'd> Fn(&'w mut Workflow<'d, D, C>, &Value) -> Result<Value, DocflowError>
            + Send
            + Sync
            + 'static,
    {
        self.bind_handler_arc(name, shared_handler(f))
    }

    pub fn bind_handler_arc(mut self, name: impl Into<String>, handler: Handler<D, C>) -> Self {
        self.bound.push((name.into(), handler));
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Creates a builder from a declaration table.
    ///
    /// Transitions get a handler that completes immediately; bind real ones
    /// with [`bind_handler`](Self::bind_handler).
    pub fn from_raw(raw: WorkflowDefinitionRaw) -> Self {
        let mut builder = Self::new(raw.name.unwrap_or_else(|| "Workflow".to_string()));
        if let Some(attr) = raw.state_attr {
            builder = builder.state_attr(attr);
        }
        if let Some(key) = raw.state_key {
            builder = builder.state_key(key);
        }
        for state in raw.states {
            builder = builder.state(state.name, state.value, state.title, state.description);
        }
        for group in raw.groups {
            let members = group
                .values
                .into_iter()
                .map(GroupMember::Value)
                .chain(group.states.into_iter().map(GroupMember::State));
            builder = builder.group_described(group.name, group.title, group.description, members);
        }
        for decl in raw.transitions {
            let mut transition = TransitionBuilder::new(decl.name)
                .from_any(decl.from)
                .to(decl.to)
                .title(decl.title)
                .description(decl.description)
                .category(decl.category);
            if let Some(permission) = decl.permission {
                transition = transition.permission(permission);
            }
            transition.meta = decl.meta;
            builder = builder.transition(transition);
        }
        builder.meta = raw.meta;
        builder
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Validates the declarations and builds the definition.
    pub fn build(self) -> Result<Arc<WorkflowDefinition<D, C>>, DocflowError> {
        let WorkflowBuilder {
            name,
            parent,
            accessors,
            states: own_states,
            groups: own_groups,
            transitions: own_transitions,
            bound,
            permissions: own_permissions,
            meta,
            ..
        } = self;

        let mut accessor = parent.as_ref().map(|p| p.accessor.clone());
        let mut states: Vec<State> = parent.as_ref().map(|p| p.states.clone()).unwrap_or_default();
        let mut groups: Vec<Group> = parent.as_ref().map(|p| p.groups.clone()).unwrap_or_default();
        let mut value_index = parent
            .as_ref()
            .map(|p| p.value_index.clone())
            .unwrap_or_default();
        let mut transitions = parent
            .as_ref()
            .map(|p| p.transitions.clone())
            .unwrap_or_default();
        let mut lineage = parent.as_ref().map(|p| p.lineage.clone()).unwrap_or_default();
        lineage.push(name.clone());
        let permissions = own_permissions.or_else(|| parent.as_ref().and_then(|p| p.permissions.clone()));
        let signals = parent
            .as_ref()
            .map(|p| Arc::clone(&p.signals))
            .unwrap_or_default();
        let base = parent.as_ref().map(|p| p.max_creation_order()).unwrap_or(0);

        // Accessor
        let mut accessors = accessors.into_iter();
        match (accessors.next(), accessors.next()) {
            (Some(own), None) => accessor = Some(own),
            (Some(_), Some(_)) => {
                return Err(DocflowError::invalid_definition(format!(
                    "workflow '{}' declares more than one state accessor",
                    name
                )))
            }
            (None, _) => {}
        }
        let accessor = accessor.ok_or_else(|| {
            DocflowError::invalid_definition(format!(
                "workflow '{}' declares no state accessor (state_attr, state_key or state_accessor)",
                name
            ))
        })?;

        // States
        for (seq, decl) in own_states {
            if groups.iter().any(|g| g.name() == decl.name) {
                return Err(DocflowError::invalid_definition(format!(
                    "state '{}' clashes with a group of the same name",
                    decl.name
                )));
            }
            if let Some(holder) = value_index.get(&decl.value) {
                if *holder != decl.name {
                    return Err(DocflowError::invalid_definition(format!(
                        "state '{}' reuses value {} of state '{}'",
                        decl.name, decl.value, holder
                    )));
                }
            }
            if let Some(pos) = states.iter().position(|s| s.name() == decl.name) {
                let shadowed = states.remove(pos);
                value_index.remove(shadowed.value());
            }
            value_index.insert(decl.value.clone(), decl.name.clone());
            states.push(State::new(
                decl.name,
                decl.value,
                decl.title,
                decl.description,
                base + seq,
            ));
        }

        // Groups
        for decl in own_groups {
            if states.iter().any(|s| s.name() == decl.name) {
                return Err(DocflowError::invalid_definition(format!(
                    "group '{}' clashes with a state of the same name",
                    decl.name
                )));
            }
            let mut members: Vec<StateValue> = Vec::new();
            for member in decl.members {
                let value = match member {
                    GroupMember::Value(value) => {
                        if !value_index.contains_key(&value) {
                            return Err(DocflowError::invalid_definition(format!(
                                "group '{}' lists value {} which is not a state",
                                decl.name, value
                            )));
                        }
                        value
                    }
                    GroupMember::State(state) => states
                        .iter()
                        .find(|s| s.name() == state)
                        .map(|s| s.value().clone())
                        .ok_or_else(|| {
                            DocflowError::invalid_definition(format!(
                                "group '{}' lists unknown state '{}'",
                                decl.name, state
                            ))
                        })?,
                };
                if !members.contains(&value) {
                    members.push(value);
                }
            }
            if members.is_empty() {
                return Err(DocflowError::invalid_definition(format!(
                    "group '{}' has no members",
                    decl.name
                )));
            }
            groups.retain(|g| g.name() != decl.name);
            groups.push(Group::new(
                decl.name,
                members,
                decl.title,
                decl.description,
                base + decl.seq,
            ));
        }

        // Transitions
        let endpoint = |transition: &str, state: &str| -> Result<(), DocflowError> {
            if groups.iter().any(|g| g.name() == state) {
                return Err(DocflowError::TransitionOnGroup {
                    transition: transition.to_string(),
                    group: state.to_string(),
                });
            }
            if !states.iter().any(|s| s.name() == state) {
                return Err(DocflowError::invalid_definition(format!(
                    "transition '{}' refers to unknown state '{}'",
                    transition, state
                )));
            }
            Ok(())
        };
        for decl in own_transitions {
            let to = decl.to.clone().ok_or_else(|| {
                DocflowError::invalid_definition(format!("transition '{}' has no target", decl.name))
            })?;
            if decl.from.is_empty() {
                return Err(DocflowError::invalid_definition(format!(
                    "transition '{}' has no source",
                    decl.name
                )));
            }
            endpoint(&decl.name, &to)?;
            let handler = decl.handler.clone().unwrap_or_else(noop_handler);
            for from in &decl.from {
                endpoint(&decl.name, from)?;
                let transition = Arc::new(Transition::new(
                    TransitionInfo {
                        name: decl.name.clone(),
                        from: from.clone(),
                        to: to.clone(),
                        permission: decl.permission.clone(),
                        title: decl.title.clone(),
                        description: decl.description.clone(),
                        category: decl.category.clone(),
                        meta: decl.meta.clone(),
                    },
                    Arc::clone(&handler),
                ));
                register(&mut transitions, transition);
            }
        }

        for (bound_name, handler) in bound {
            let mut found = false;
            for list in transitions.values_mut() {
                for slot in list.iter_mut().filter(|t| t.name() == bound_name) {
                    *slot = Arc::new(slot.with_handler(Arc::clone(&handler)));
                    found = true;
                }
            }
            if !found {
                return Err(DocflowError::UnknownTransition {
                    transition: bound_name,
                });
            }
        }

        states.sort_by_key(State::creation_order);
        groups.sort_by_key(Group::creation_order);

        let raw = export_raw(&name, &accessor, &states, &groups, &transitions, meta);
        let checksum = raw.checksum()?;

        info!(
            "Built workflow '{}' ({} states, {} groups, {} transitions, checksum {})",
            name,
            states.len(),
            groups.len(),
            transitions.values().map(Vec::len).sum::<usize>(),
            checksum
        );

        Ok(Arc::new(WorkflowDefinition {
            name,
            lineage,
            accessor,
            states,
            groups,
            value_index,
            transitions,
            permissions,
            signals,
            raw,
            checksum,
        }))
    }
}

/// Adds a transition under its source state. Re-declaring a name from the
/// same source replaces the earlier one in place.
fn register<D, C>(
    transitions: &mut HashMap<String, Vec<Arc<Transition<D, C>>>>,
    transition: Arc<Transition<D, C>>,
) {
    let list = transitions.entry(transition.from().to_string()).or_default();
    match list.iter().position(|t| t.name() == transition.name()) {
        Some(pos) => list[pos] = transition,
        None => list.push(transition),
    }
}

fn export_raw<D, C>(
    name: &str,
    accessor: &StateAccessor<D>,
    states: &[State],
    groups: &[Group],
    transitions: &HashMap<String, Vec<Arc<Transition<D, C>>>>,
    meta: Option<Value>,
) -> WorkflowDefinitionRaw {
    let (state_attr, state_key) = match accessor {
        StateAccessor::Attribute(attr) => (Some(attr.clone()), None),
        StateAccessor::Key(key) => (None, Some(key.clone())),
        StateAccessor::Custom { .. } => (None, None),
    };
    WorkflowDefinitionRaw {
        name: Some(name.to_string()),
        state_attr,
        state_key,
        states: states
            .iter()
            .map(|s| StateDecl {
                name: s.name().to_string(),
                value: s.value().clone(),
                title: s.title().to_string(),
                description: s.description().to_string(),
            })
            .collect(),
        groups: groups
            .iter()
            .map(|g| GroupDecl {
                name: g.name().to_string(),
                values: g.members().to_vec(),
                states: Vec::new(),
                title: g.title().to_string(),
                description: g.description().to_string(),
            })
            .collect(),
        transitions: states
            .iter()
            .filter_map(|s| transitions.get(s.name()))
            .flatten()
            .map(|t| {
                let info = t.info();
                TransitionDecl {
                    name: info.name.clone(),
                    from: vec![info.from.clone()],
                    to: info.to.clone(),
                    permission: info.permission.clone(),
                    title: info.title.clone(),
                    description: info.description.clone(),
                    category: info.category.clone(),
                    meta: info.meta.clone(),
                }
            })
            .collect(),
        meta,
    }
}

/// Class-level registry of one workflow.
pub struct WorkflowDefinition<D, C = ()> {
    name: String,
    lineage: Vec<String>,
    accessor: StateAccessor<D>,
    /// Sorted by creation order.
    states: Vec<State>,
    groups: Vec<Group>,
    value_index: HashMap<StateValue, String>,
    /// Transitions keyed by source state name, in declaration order.
    transitions: HashMap<String, Vec<Arc<Transition<D, C>>>>,
    permissions: Option<PermissionFn<D, C>>,
    signals: Arc<TransitionSignals>,
    raw: WorkflowDefinitionRaw,
    checksum: String,
}

impl<D, C> WorkflowDefinition<D, C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of this definition and its ancestors, root first.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// CRC32C of the exported declaration table.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn accessor(&self) -> &StateAccessor<D> {
        &self.accessor
    }

    /// All states, groups excluded, in creation order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name() == name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn state_for_value(&self, value: &StateValue) -> Option<&State> {
        self.value_index.get(value).and_then(|name| self.state(name))
    }

    /// Transitions leaving `state`, in declaration order.
    pub fn transitions_from(&self, state: &str) -> &[Arc<Transition<D, C>>] {
        self.transitions.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transitions entering `state`, ordered by source state.
    pub fn transitions_into(&self, state: &str) -> Vec<&Arc<Transition<D, C>>> {
        self.states
            .iter()
            .flat_map(|s| self.transitions_from(s.name()))
            .filter(|t| t.to() == state)
            .collect()
    }

    /// Distinct transition names, in state order.
    pub fn transition_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for transition in self.states.iter().flat_map(|s| self.transitions_from(s.name())) {
            if !names.contains(&transition.name()) {
                names.push(transition.name());
            }
        }
        names
    }

    pub(crate) fn find_transition(&self, state: &str, name: &str) -> Option<&Arc<Transition<D, C>>> {
        self.transitions_from(state).iter().find(|t| t.name() == name)
    }

    pub(crate) fn has_transition(&self, name: &str) -> bool {
        self.transitions.values().flatten().any(|t| t.name() == name)
    }

    /// Returns the permission tokens the instance's caller holds.
    pub fn evaluate_permissions(&self, workflow: &Workflow<'_, D, C>) -> HashSet<String> {
        self.permissions
            .as_ref()
            .map(|f| f(workflow))
            .unwrap_or_default()
    }

    /// Subscribes to completions of the transition named `transition`.
    pub fn on_transition<F>(&self, transition: &str, listener: F) -> SubscriptionId
    where
        F: Fn(&TransitionEvent) + Send + Sync + 'static,
    {
        self.signals.connect(transition, listener)
    }

    /// Subscribes to completions of every transition.
    ///
    /// Derived definitions share this hub, so the listener also hears
    /// transitions declared only by them.
    pub fn on_any<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&TransitionEvent) + Send + Sync + 'static,
    {
        self.signals.connect_all(listener)
    }

    pub fn disconnect(&self, id: &SubscriptionId) -> bool {
        self.signals.disconnect(id)
    }

    pub fn signals(&self) -> &Arc<TransitionSignals> {
        &self.signals
    }

    /// The full declaration table, inherited declarations included.
    pub fn to_raw(&self) -> WorkflowDefinitionRaw {
        self.raw.clone()
    }

    fn max_creation_order(&self) -> u64 {
        let states = self.states.iter().map(State::creation_order);
        let groups = self.groups.iter().map(Group::creation_order);
        states.chain(groups).max().unwrap_or(0)
    }
}

impl<D: Document, C> WorkflowDefinition<D, C> {
    /// Reads a document's state. Fails with `UnknownState` if the document has
    /// no value or a value no state declares.
    pub fn read_state(&self, document: &D) -> Result<&State, DocflowError> {
        let value = self.accessor.read(document)?;
        self.state_for_value(&value)
            .ok_or_else(|| DocflowError::UnknownState {
                value: value.to_string(),
            })
    }

    /// Buckets documents by state name, keeping input order inside each
    /// bucket. States with no documents are left out.
    pub fn sort_documents<'a, I>(&self, documents: I) -> Result<HashMap<String, Vec<&'a D>>, DocflowError>
    where
        I: IntoIterator<Item = &'a D>,
    {
        let mut sorted: HashMap<String, Vec<&'a D>> = HashMap::new();
        for document in documents {
            let state = self.read_state(document)?;
            sorted.entry(state.name().to_string()).or_default().push(document);
        }
        Ok(sorted)
    }
}

impl<D, C> fmt::Debug for WorkflowDefinition<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field("lineage", &self.lineage)
            .field("accessor", &self.accessor)
            .field("states", &self.states)
            .field("groups", &self.groups)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

impl<D, C> fmt::Debug for WorkflowBuilder<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowBuilder")
            .field("name", &self.name)
            .field("extends", &self.parent.as_ref().map(|p| p.name()))
            .field("states", &self.states.len())
            .field("groups", &self.groups.len())
            .field("transitions", &self.transitions.len())
            .finish_non_exhaustive()
    }
}
