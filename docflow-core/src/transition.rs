//! Transition declarations.
//!
//! ```
//! use docflow_core::{DocflowError, TransitionBuilder};
//! use serde_json::{json, Value};
//!
//! let publish = TransitionBuilder::<Value>::new("publish")
//!     .from("pending")
//!     .to("published")
//!     .permission("can_publish")
//!     .title("Publish")
//!     .handler(|workflow, _args| {
//!         if workflow.document()["email_verified"] != json!(true) {
//!             return Err(DocflowError::rejected("email address is not verified"));
//!         }
//!         Ok(Value::Null)
//!     });
//! # let _ = publish;
//! ```

use crate::error::DocflowError;
use crate::interactive::InteractiveTransition;
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// What a transition handler produced.
pub enum Outcome<D, C> {
    /// The handler finished; the state change commits right away.
    Completed(Value),
    /// The handler started a multi-step transition; nothing commits until it is submitted.
    Pending(Box<dyn InteractiveTransition<D, C>>),
}

impl<D, C> fmt::Debug for Outcome<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            Outcome::Pending(step) => f.debug_tuple("Pending").field(&step.name()).finish(),
        }
    }
}

/// Transition logic, invoked after both guards pass.
pub type Handler<D, C> = Arc<
    dyn for<'w, 'd> Fn(&'w mut Workflow<'d, D, C>, &Value) -> Result<Outcome<D, C>, DocflowError>
        + Send
        + Sync,
>;

fn handler_fn<D: 'static, C: 'static, F>(f: F) -> Handler<D, C>
where
    F: for<'w, 'd> Fn(&'w mut Workflow<'d, D, C>, &Value) -> Result<Outcome<D, C>, DocflowError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Handler used when a declaration has none: the transition is a pure state change.
pub(crate) fn noop_handler<D: 'static, C: 'static>() -> Handler<D, C> {
    handler_fn(|_, _| Ok(Outcome::Completed(Value::Null)))
}

/// Metadata of one registered transition (one source state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionInfo {
    pub name: String,
    pub from: String,
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

/// A permission-gated edge from one source state to a target state.
pub struct Transition<D, C> {
    info: TransitionInfo,
    pub(crate) handler: Handler<D, C>,
}

impl<D, C> Transition<D, C> {
    pub(crate) fn new(info: TransitionInfo, handler: Handler<D, C>) -> Self {
        Self { info, handler }
    }

    pub fn info(&self) -> &TransitionInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn from(&self) -> &str {
        &self.info.from
    }

    pub fn to(&self) -> &str {
        &self.info.to
    }

    pub fn permission(&self) -> Option<&str> {
        self.info.permission.as_deref()
    }

    /// Returns a copy running a different handler.
    pub(crate) fn with_handler(&self, handler: Handler<D, C>) -> Self {
        Self {
            info: self.info.clone(),
            handler,
        }
    }
}

impl<D, C> fmt::Debug for Transition<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Fluent declaration of a transition, registered with
/// [`WorkflowBuilder::transition`](crate::WorkflowBuilder::transition).
///
/// Several source states may share one declaration (and one handler); each
/// source becomes its own [`Transition`] when the definition is built.
pub struct TransitionBuilder<D, C = ()> {
    pub(crate) name: String,
    pub(crate) from: Vec<String>,
    pub(crate) to: Option<String>,
    pub(crate) permission: Option<String>,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) category: String,
    pub(crate) meta: Map<String, Value>,
    pub(crate) handler: Option<Handler<D, C>>,
}

impl<D: 'static, C: 'static> TransitionBuilder<D, C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: Vec::new(),
            to: None,
            permission: None,
            title: String::new(),
            description: String::new(),
            category: String::new(),
            meta: Map::new(),
            handler: None,
        }
    }

    /// Adds a source state.
    pub fn from(mut self, state: impl Into<String>) -> Self {
        self.from.push(state.into());
        self
    }

    /// Adds several source states sharing this declaration.
    pub fn from_any<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.from.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn to(mut self, state: impl Into<String>) -> Self {
        self.to = Some(state.into());
        self
    }

    /// Requires a permission token. Without one, any caller may apply the transition.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Attaches extra metadata, carried in [`TransitionInfo::meta`].
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Sets a handler that completes the transition when it returns `Ok`.
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: for<'w, 'd> Fn(&'w mut Workflow<'d, D, C>, &Value) -> Result<Value, DocflowError>
            + Send
            + Sync
            + 'static,
    {
        self.handler = Some(handler_fn(move |workflow, args| {
            f(workflow, args).map(Outcome::Completed)
        }));
        self
    }

    /// Sets a handler that starts a multi-step transition.
    pub fn interactive<F>(mut self, f: F) -> Self
    where
        F: for<'w, 'd> Fn(
                &'w mut Workflow<'d, D, C>,
                &Value,
            ) -> Result<Box<dyn InteractiveTransition<D, C>>, DocflowError>
            + Send
            + Sync
            + 'static,
    {
        self.handler = Some(handler_fn(move |workflow, args| {
            f(workflow, args).map(Outcome::Pending)
        }));
        self
    }

    /// Shares an existing handler, e.g. one action reachable under several permissions.
    pub fn handler_arc(mut self, handler: Handler<D, C>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Wraps a raw handler that decides per call whether to complete or go pending.
    pub fn outcome<F>(self, f: F) -> Self
    where
        F: for<'w, 'd> Fn(&'w mut Workflow<'d, D, C>, &Value) -> Result<Outcome<D, C>, DocflowError>
            + Send
            + Sync
            + 'static,
    {
        self.handler_arc(handler_fn(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<D, C> fmt::Debug for TransitionBuilder<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionBuilder")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Builds a shareable handler for [`TransitionBuilder::handler_arc`].
pub fn shared_handler<D: 'static, C: 'static, F>(f: F) -> Handler<D, C>
where
    F: for<'w, 'd> Fn(&'w mut Workflow<'d, D, C>, &Value) -> Result<Value, DocflowError>
        + Send
        + Sync
        + 'static,
{
    handler_fn(move |workflow, args| f(workflow, args).map(Outcome::Completed))
}
