//! Workflow error types.

use thiserror::Error;

/// Errors from the workflow engine.
#[derive(Debug, Error)]
pub enum DocflowError {
    #[error("unknown state: {value}")]
    UnknownState { value: String },

    #[error("no state or group named '{name}'")]
    StateNotFound { name: String },

    #[error("unattached state: {state}")]
    Unattached { state: String },

    #[error("state cannot be changed: {reason}")]
    StateNotWritable { reason: String },

    #[error("incorrect state: cannot apply '{transition}' in state '{state}'")]
    IncorrectState { transition: String, state: String },

    #[error("unknown transition: {transition}")]
    UnknownTransition { transition: String },

    #[error("transition rejected: {reason}")]
    Rejected { reason: String },

    #[error("transition '{transition}' was already submitted")]
    AlreadySubmitted { transition: String },

    #[error("invalid input for transition '{transition}'")]
    InvalidInput { transition: String },

    #[error("permission '{permission}' not available for transition '{transition}'")]
    PermissionDenied {
        transition: String,
        permission: String,
    },

    #[error("transition '{transition}' cannot use group '{group}' as an endpoint")]
    TransitionOnGroup { transition: String, group: String },

    #[error("workflow '{workflow}' is already applied to {document}")]
    DuplicateWorkflow { workflow: String, document: String },

    #[error("no workflow {workflow} applied to {document}")]
    WorkflowNotFound { workflow: String, document: String },

    #[error("invalid workflow definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("handler error: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The error family a [`DocflowError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The document's state is unknown, unreadable, unwritable, or queried unattached.
    State,
    /// The transition does not apply to the current state.
    Transition,
    /// A required permission token is missing.
    Permission,
    /// Structural misuse while declaring or binding workflows.
    Definition,
    /// A transition handler failed with a domain error.
    Handler,
}

impl DocflowError {
    /// Wraps a domain error raised by a transition handler.
    pub fn handler(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        DocflowError::Handler(err.into())
    }

    /// A handler refusing to proceed, e.g. a business precondition that does not hold.
    pub fn rejected(reason: impl Into<String>) -> Self {
        DocflowError::Rejected {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_definition(reason: impl Into<String>) -> Self {
        DocflowError::InvalidDefinition {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DocflowError::UnknownState { .. }
            | DocflowError::StateNotFound { .. }
            | DocflowError::Unattached { .. }
            | DocflowError::StateNotWritable { .. } => ErrorKind::State,
            DocflowError::IncorrectState { .. }
            | DocflowError::UnknownTransition { .. }
            | DocflowError::Rejected { .. }
            | DocflowError::AlreadySubmitted { .. }
            | DocflowError::InvalidInput { .. } => ErrorKind::Transition,
            DocflowError::PermissionDenied { .. } => ErrorKind::Permission,
            DocflowError::TransitionOnGroup { .. }
            | DocflowError::DuplicateWorkflow { .. }
            | DocflowError::WorkflowNotFound { .. }
            | DocflowError::InvalidDefinition { .. }
            | DocflowError::Json(_)
            | DocflowError::Yaml(_)
            | DocflowError::Io(_) => ErrorKind::Definition,
            DocflowError::Handler(_) => ErrorKind::Handler,
        }
    }

    /// Returns a stable error code, e.g. for CLI exit reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            DocflowError::UnknownState { .. } => "UNKNOWN_STATE",
            DocflowError::StateNotFound { .. } => "STATE_NOT_FOUND",
            DocflowError::Unattached { .. } => "UNATTACHED_STATE",
            DocflowError::StateNotWritable { .. } => "STATE_NOT_WRITABLE",
            DocflowError::IncorrectState { .. } => "INCORRECT_STATE",
            DocflowError::UnknownTransition { .. } => "UNKNOWN_TRANSITION",
            DocflowError::Rejected { .. } => "TRANSITION_REJECTED",
            DocflowError::AlreadySubmitted { .. } => "ALREADY_SUBMITTED",
            DocflowError::InvalidInput { .. } => "INVALID_INPUT",
            DocflowError::PermissionDenied { .. } => "PERMISSION_DENIED",
            DocflowError::TransitionOnGroup { .. } => "BAD_DEFINITION",
            DocflowError::DuplicateWorkflow { .. } => "DUPLICATE_WORKFLOW",
            DocflowError::WorkflowNotFound { .. } => "WORKFLOW_NOT_FOUND",
            DocflowError::InvalidDefinition { .. } => "BAD_DEFINITION",
            DocflowError::Handler(_) => "HANDLER_FAILED",
            DocflowError::Json(_) => "BAD_DEFINITION",
            DocflowError::Yaml(_) => "BAD_DEFINITION",
            DocflowError::Io(_) => "IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            DocflowError::UnknownState {
                value: "7".to_string()
            }
            .kind(),
            ErrorKind::State
        );
        assert_eq!(DocflowError::rejected("nope").kind(), ErrorKind::Transition);
        assert_eq!(
            DocflowError::PermissionDenied {
                transition: "publish".to_string(),
                permission: "can_publish".to_string()
            }
            .kind(),
            ErrorKind::Permission
        );
        assert_eq!(
            DocflowError::invalid_definition("x").kind(),
            ErrorKind::Definition
        );
    }

    #[test]
    fn test_handler_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = DocflowError::handler(io);
        assert_eq!(err.kind(), ErrorKind::Handler);
        assert_eq!(err.to_string(), "handler error: disk full");
        assert!(std::error::Error::source(&err).is_some());
    }
}
