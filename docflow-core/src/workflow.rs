//! Workflow instances: one definition attached to one document.

use crate::accessor::Document;
use crate::error::DocflowError;
use crate::interactive::PendingTransition;
use crate::registry::WorkflowDefinition;
use crate::signal::TransitionEvent;
use crate::state::{Group, InstanceId, State, StateLookup, StateQuery};
use crate::transition::{Outcome, Transition, TransitionInfo};
use crate::value::StateValue;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyResult {
    pub transition: String,
    pub from_state: String,
    pub to_state: String,
    /// Whatever the handler returned.
    pub output: Value,
}

/// What [`Workflow::apply`] did.
pub enum Dispatch<D, C> {
    /// The state changed.
    Committed(ApplyResult),
    /// The transition needs a confirmation step; the state is unchanged.
    Pending(PendingTransition<D, C>),
}

impl<D, C> Dispatch<D, C> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatch::Pending(_))
    }

    pub fn into_committed(self) -> Option<ApplyResult> {
        match self {
            Dispatch::Committed(result) => Some(result),
            Dispatch::Pending(_) => None,
        }
    }

    pub fn into_pending(self) -> Option<PendingTransition<D, C>> {
        match self {
            Dispatch::Pending(pending) => Some(pending),
            Dispatch::Committed(_) => None,
        }
    }
}

impl<D, C> fmt::Debug for Dispatch<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Committed(result) => f.debug_tuple("Committed").field(result).finish(),
            Dispatch::Pending(pending) => f.debug_tuple("Pending").field(pending).finish(),
        }
    }
}

/// A workflow definition bound to one document.
///
/// The instance borrows the document mutably for its whole life and never
/// caches the state: every query and dispatch re-reads it, so changes made
/// to the document directly are seen at once.
pub struct Workflow<'d, D, C = ()> {
    id: InstanceId,
    definition: Arc<WorkflowDefinition<D, C>>,
    document: &'d mut D,
    context: C,
    states: Vec<State>,
    groups: Vec<Group>,
}

impl<'d, D: Document, C: Default> Workflow<'d, D, C> {
    /// Attaches `definition` to `document` with a default context.
    pub fn new(
        definition: Arc<WorkflowDefinition<D, C>>,
        document: &'d mut D,
    ) -> Result<Self, DocflowError> {
        Self::with_context(definition, document, C::default())
    }
}

impl<'d, D: Document, C> Workflow<'d, D, C> {
    /// Attaches `definition` to `document`.
    ///
    /// Fails with `UnknownState` if the document is not in one of the
    /// definition's states. The definition itself is left untouched.
    pub fn with_context(
        definition: Arc<WorkflowDefinition<D, C>>,
        document: &'d mut D,
        context: C,
    ) -> Result<Self, DocflowError> {
        let current = definition.read_state(document)?.name().to_string();
        let id = InstanceId::new();
        let states = definition.states().iter().map(|s| s.attach(id)).collect();
        let groups = definition.groups().iter().map(|g| g.attach(id)).collect();
        trace!("Attached {} to document in state '{}'", definition.name(), current);

        Ok(Self {
            id,
            definition,
            document,
            context,
            states,
            groups,
        })
    }

    /// The document's current state, attached to this instance.
    pub fn state(&self) -> Result<&State, DocflowError> {
        let current = self.definition.read_state(&*self.document)?;
        self.state_named(current.name())
    }

    /// Returns true if the document is in the named state, or in one of the
    /// named group's states.
    pub fn is(&self, name: &str) -> Result<bool, DocflowError> {
        if let Ok(state) = self.state_named(name) {
            return state.is_current(self);
        }
        self.group(name)?.is_current(self)
    }

    /// Permission tokens held in the current context.
    pub fn permissions(&self) -> HashSet<String> {
        self.definition.evaluate_permissions(self)
    }

    /// Transitions available right now: leaving the current state, and either
    /// unguarded or guarded by a permission the context holds.
    pub fn transitions(&self) -> Result<Vec<&TransitionInfo>, DocflowError> {
        let current = self.definition.read_state(&*self.document)?;
        let permissions = self.permissions();
        Ok(self
            .definition
            .transitions_from(current.name())
            .iter()
            .filter(|t| t.permission().map_or(true, |p| permissions.contains(p)))
            .map(|t| t.info())
            .collect())
    }

    /// Applies the transition `name` with handler arguments `args`.
    ///
    /// The current state and the permission are checked before the handler
    /// runs; on failure the handler is not called and the document is not
    /// touched. A handler error is returned as is and nothing commits.
    pub fn apply(&mut self, name: &str, args: Value) -> Result<Dispatch<D, C>, DocflowError> {
        let current = self.definition.read_state(&*self.document)?.name().to_string();
        let transition = match self.definition.find_transition(&current, name) {
            Some(transition) => Arc::clone(transition),
            None if self.definition.has_transition(name) => {
                return Err(DocflowError::IncorrectState {
                    transition: name.to_string(),
                    state: current,
                })
            }
            None => {
                return Err(DocflowError::UnknownTransition {
                    transition: name.to_string(),
                })
            }
        };

        if let Some(permission) = transition.permission() {
            if !self.permissions().contains(permission) {
                return Err(DocflowError::PermissionDenied {
                    transition: name.to_string(),
                    permission: permission.to_string(),
                });
            }
        }

        let handler = Arc::clone(&transition.handler);
        match handler(&mut *self, &args)? {
            Outcome::Completed(output) => self.commit(&transition, output).map(Dispatch::Committed),
            Outcome::Pending(step) => {
                debug!(
                    "Transition '{}' on {} is pending step '{}'",
                    name,
                    self.id,
                    step.name()
                );
                Ok(Dispatch::Pending(PendingTransition::new(self.id, transition, step)))
            }
        }
    }

    /// Fails with `IncorrectState` unless the document is in the transition's source state.
    pub(crate) fn ensure_source(&self, transition: &Transition<D, C>) -> Result<(), DocflowError> {
        let current = self.definition.read_state(&*self.document)?;
        if current.name() != transition.from() {
            return Err(DocflowError::IncorrectState {
                transition: transition.name().to_string(),
                state: current.name().to_string(),
            });
        }
        Ok(())
    }

    /// Writes the target value, then announces the transition.
    pub(crate) fn commit(
        &mut self,
        transition: &Transition<D, C>,
        output: Value,
    ) -> Result<ApplyResult, DocflowError> {
        let from_value = self.value_of(transition.from())?;
        let to_value = self.value_of(transition.to())?;

        self.definition
            .accessor()
            .write(&mut *self.document, to_value.clone())?;
        debug!(
            "Committed '{}' on {}: {} -> {}",
            transition.name(),
            self.id,
            transition.from(),
            transition.to()
        );

        self.definition.signals().notify(&TransitionEvent {
            workflow: self.definition.name().to_string(),
            instance: self.id,
            transition: transition.info().clone(),
            from_value,
            to_value,
        });

        Ok(ApplyResult {
            transition: transition.name().to_string(),
            from_state: transition.from().to_string(),
            to_state: transition.to().to_string(),
            output,
        })
    }

    fn value_of(&self, state: &str) -> Result<StateValue, DocflowError> {
        self.definition
            .state(state)
            .map(|s| s.value().clone())
            .ok_or_else(|| DocflowError::StateNotFound {
                name: state.to_string(),
            })
    }
}

impl<'d, D, C> Workflow<'d, D, C> {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition<D, C>> {
        &self.definition
    }

    pub fn document(&self) -> &D {
        &*self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut *self.document
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Replaces the context. Permissions are evaluated against it from the next call on.
    pub fn set_context(&mut self, context: C) {
        self.context = context;
    }

    /// This instance's copy of the named state.
    pub fn state_named(&self, name: &str) -> Result<&State, DocflowError> {
        self.states
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| DocflowError::StateNotFound {
                name: name.to_string(),
            })
    }

    /// This instance's copy of the named group.
    pub fn group(&self, name: &str) -> Result<&Group, DocflowError> {
        self.groups
            .iter()
            .find(|g| g.name() == name)
            .ok_or_else(|| DocflowError::StateNotFound {
                name: name.to_string(),
            })
    }

    /// All states, attached to this instance, in creation order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

impl<D: Document, C> StateLookup for Workflow<'_, D, C> {
    fn current_value(&self, owner: InstanceId) -> Option<Result<StateValue, DocflowError>> {
        if owner != self.id {
            return None;
        }
        Some(
            self.definition
                .read_state(&*self.document)
                .map(|s| s.value().clone()),
        )
    }
}

impl<D, C> fmt::Debug for Workflow<'_, D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("definition", &self.definition.name())
            .finish_non_exhaustive()
    }
}

impl<D, C> fmt::Display for Workflow<'_, D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Workflow {}>", self.definition.name())
    }
}
