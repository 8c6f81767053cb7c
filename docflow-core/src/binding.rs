//! Registering workflows on a document type.
//!
//! ```
//! use docflow_core::{
//!     document_attributes, DocumentWorkflows, TransitionBuilder, WorkflowBindings, WorkflowBuilder,
//! };
//! use std::sync::OnceLock;
//!
//! #[derive(Default)]
//! struct Invoice {
//!     status: Option<i64>,
//! }
//!
//! document_attributes!(Invoice { status });
//!
//! impl DocumentWorkflows for Invoice {
//!     type Context = ();
//!
//!     fn bindings() -> &'static WorkflowBindings<Self> {
//!         static BINDINGS: OnceLock<WorkflowBindings<Invoice>> = OnceLock::new();
//!         BINDINGS.get_or_init(|| {
//!             let bindings = WorkflowBindings::new("Invoice");
//!             let definition = WorkflowBuilder::new("InvoiceWorkflow")
//!                 .state_attr("status")
//!                 .state("open", 0, "Open", "")
//!                 .state("paid", 1, "Paid", "")
//!                 .transition(TransitionBuilder::new("pay").from("open").to("paid"))
//!                 .build()
//!                 .unwrap();
//!             bindings.apply(definition).unwrap();
//!             bindings
//!         })
//!     }
//! }
//!
//! let mut invoice = Invoice { status: Some(0) };
//! invoice.workflow(None).unwrap().apply("pay", serde_json::Value::Null).unwrap();
//! assert_eq!(invoice.status, Some(1));
//! ```

use crate::accessor::Document;
use crate::error::DocflowError;
use crate::registry::WorkflowDefinition;
use crate::workflow::Workflow;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Workflows applied to one document type, in application order.
pub struct WorkflowBindings<D, C = ()> {
    document: String,
    workflows: RwLock<Vec<Arc<WorkflowDefinition<D, C>>>>,
}

impl<D, C> WorkflowBindings<D, C> {
    /// Creates an empty table. `document` names the document type in errors.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            workflows: RwLock::new(Vec::new()),
        }
    }

    /// Registers a workflow. A second workflow with the same name fails with
    /// `DuplicateWorkflow`.
    pub fn apply(&self, definition: Arc<WorkflowDefinition<D, C>>) -> Result<(), DocflowError> {
        let mut workflows = self.workflows.write();
        if workflows.iter().any(|w| w.name() == definition.name()) {
            warn!(
                "Workflow '{}' is already applied to {}",
                definition.name(),
                self.document
            );
            return Err(DocflowError::DuplicateWorkflow {
                workflow: definition.name().to_string(),
                document: self.document.clone(),
            });
        }
        debug!("Applied workflow '{}' to {}", definition.name(), self.document);
        workflows.push(definition);
        Ok(())
    }

    /// Looks up a workflow by name. `None` selects the first one applied.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<WorkflowDefinition<D, C>>, DocflowError> {
        let workflows = self.workflows.read();
        let found = match name {
            Some(name) => workflows.iter().find(|w| w.name() == name),
            None => workflows.first(),
        };
        found.cloned().ok_or_else(|| DocflowError::WorkflowNotFound {
            workflow: name.map_or_else(|| "(default)".to_string(), |n| format!("'{}'", n)),
            document: self.document.clone(),
        })
    }

    /// Names of the applied workflows, in application order.
    pub fn names(&self) -> Vec<String> {
        self.workflows
            .read()
            .iter()
            .map(|w| w.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.read().is_empty()
    }
}

impl<D: Document, C> WorkflowBindings<D, C> {
    /// Creates an instance of the named workflow for `document`, with a default context.
    pub fn workflow<'d>(
        &self,
        document: &'d mut D,
        name: Option<&str>,
    ) -> Result<Workflow<'d, D, C>, DocflowError>
    where
        C: Default,
    {
        Workflow::new(self.get(name)?, document)
    }

    pub fn workflow_with<'d>(
        &self,
        document: &'d mut D,
        name: Option<&str>,
        context: C,
    ) -> Result<Workflow<'d, D, C>, DocflowError> {
        Workflow::with_context(self.get(name)?, document, context)
    }
}

impl<D, C> fmt::Debug for WorkflowBindings<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowBindings")
            .field("document", &self.document)
            .field("workflows", &self.names())
            .finish()
    }
}

/// Gives a document type a `workflow()` accessor backed by a static table.
///
/// Instances are created on every call: a [`Workflow`] borrows the document,
/// so it cannot be cached on it.
pub trait DocumentWorkflows: Document + Sized + 'static {
    type Context: 'static;

    fn bindings() -> &'static WorkflowBindings<Self, Self::Context>;

    fn workflow(&mut self, name: Option<&str>) -> Result<Workflow<'_, Self, Self::Context>, DocflowError>
    where
        Self::Context: Default,
    {
        Self::bindings().workflow(self, name)
    }

    fn workflow_with(
        &mut self,
        name: Option<&str>,
        context: Self::Context,
    ) -> Result<Workflow<'_, Self, Self::Context>, DocflowError> {
        Self::bindings().workflow_with(self, name, context)
    }
}
