//! Multi-step transitions.
//!
//! An interactive transition's handler returns an [`InteractiveTransition`]
//! step instead of finishing the change. Dispatch hands it back wrapped in a
//! [`PendingTransition`]; the document stays in the source state until
//! [`PendingTransition::submit`] succeeds, which commits and announces the
//! transition exactly like a direct one.

use crate::error::DocflowError;
use crate::state::InstanceId;
use crate::transition::{Transition, TransitionInfo};
use crate::workflow::{ApplyResult, Workflow};
use crate::Document;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The confirmation step of a multi-step transition.
pub trait InteractiveTransition<D, C> {
    fn name(&self) -> &str;

    /// Describes the input the step expects. Rendering it is up to the caller.
    fn form(&self) -> Value {
        Value::Null
    }

    fn validate(&self, _form: &Value) -> bool {
        true
    }

    /// Applies the step's own changes to the document. The state value is
    /// written afterwards, only if this returns `Ok`.
    fn submit(&mut self, workflow: &mut Workflow<'_, D, C>, form: &Value)
        -> Result<(), DocflowError>;
}

/// A multi-step transition waiting for its submission.
pub struct PendingTransition<D, C> {
    owner: InstanceId,
    transition: Arc<Transition<D, C>>,
    step: Box<dyn InteractiveTransition<D, C>>,
    submitted: bool,
}

impl<D, C> PendingTransition<D, C> {
    pub(crate) fn new(
        owner: InstanceId,
        transition: Arc<Transition<D, C>>,
        step: Box<dyn InteractiveTransition<D, C>>,
    ) -> Self {
        Self {
            owner,
            transition,
            step,
            submitted: false,
        }
    }

    pub fn name(&self) -> &str {
        self.step.name()
    }

    pub fn transition(&self) -> &TransitionInfo {
        self.transition.info()
    }

    pub fn form(&self) -> Value {
        self.step.form()
    }

    pub fn validate(&self, form: &Value) -> bool {
        self.step.validate(form)
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }
}

impl<D: Document, C> PendingTransition<D, C> {
    /// Completes the transition: runs the step, then commits and announces.
    ///
    /// The permission check done at dispatch is not repeated. The document
    /// must still be in the source state, and a pending transition commits at
    /// most once: a second call fails with `AlreadySubmitted`.
    ///
    /// The step's own changes are not rolled back when writing the state
    /// value fails afterwards. The transition then stays unsubmitted, and a
    /// retry runs the step again.
    pub fn submit(
        &mut self,
        workflow: &mut Workflow<'_, D, C>,
        form: &Value,
    ) -> Result<ApplyResult, DocflowError> {
        let name = self.transition.name().to_string();
        if self.submitted {
            tracing::warn!("rejected second submit of transition '{}'", name);
            return Err(DocflowError::AlreadySubmitted { transition: name });
        }
        if workflow.id() != self.owner {
            return Err(DocflowError::Unattached {
                state: format!("pending transition '{}'", name),
            });
        }

        workflow.ensure_source(&self.transition)?;

        if !self.step.validate(form) {
            return Err(DocflowError::InvalidInput { transition: name });
        }

        self.step.submit(workflow, form)?;
        let result = workflow.commit(&self.transition, Value::Null)?;
        self.submitted = true;
        Ok(result)
    }
}

impl<D, C> fmt::Debug for PendingTransition<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTransition")
            .field("step", &self.step.name())
            .field("transition", self.transition.info())
            .field("submitted", &self.submitted)
            .finish()
    }
}

impl<D, C> fmt::Display for PendingTransition<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<InteractiveTransition {}>", self.step.name())
    }
}
