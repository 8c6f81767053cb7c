//! # docflow-core
//!
//! Workflow engine for docflow.
//!
//! This crate provides:
//! - State and state group declaration
//! - Workflow definitions with inheritance merging
//! - Document accessors (attribute, key, custom getter/setter)
//! - Permission-gated transition dispatch, including multi-step transitions
//! - Transition introspection and completion signals
//!
//! ```
//! use docflow_core::{TransitionBuilder, Workflow, WorkflowBuilder};
//! use serde_json::json;
//!
//! let definition = WorkflowBuilder::<serde_json::Value>::new("ArticleWorkflow")
//!     .state_key("status")
//!     .state("draft", 0, "Draft", "Only the owner can see it")
//!     .state("published", 1, "Published", "")
//!     .transition(TransitionBuilder::new("publish").from("draft").to("published"))
//!     .build()
//!     .unwrap();
//!
//! let mut article = json!({"status": 0});
//! let mut workflow = Workflow::new(definition, &mut article).unwrap();
//! workflow.apply("publish", json!(null)).unwrap();
//! assert!(workflow.is("published").unwrap());
//! ```

pub mod accessor;
pub mod binding;
pub mod definition;
pub mod error;
pub mod interactive;
pub mod registry;
pub mod signal;
pub mod state;
pub mod transition;
pub mod value;
pub mod workflow;

pub use accessor::{Document, StateAccessor, StateGetter, StateSetter};
pub use binding::{DocumentWorkflows, WorkflowBindings};
pub use definition::{GroupDecl, StateDecl, TransitionDecl, WorkflowDefinitionRaw};
pub use error::{DocflowError, ErrorKind};
pub use interactive::{InteractiveTransition, PendingTransition};
pub use registry::{PermissionFn, WorkflowBuilder, WorkflowDefinition};
pub use signal::{Listener, SubscriptionId, TransitionEvent, TransitionSignals};
pub use state::{Group, GroupMember, InstanceId, State, StateLookup, StateQuery};
pub use transition::{
    shared_handler, Handler, Outcome, Transition, TransitionBuilder, TransitionInfo,
};
pub use value::StateValue;
pub use workflow::{ApplyResult, Dispatch, Workflow};

#[cfg(test)]
pub(crate) mod fixtures;
