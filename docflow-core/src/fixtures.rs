//! Shared test workflows.

use crate::error::DocflowError;
use crate::interactive::InteractiveTransition;
use crate::registry::{WorkflowBuilder, WorkflowDefinition};
use crate::state::GroupMember;
use crate::transition::TransitionBuilder;
use crate::value::StateValue;
use crate::workflow::Workflow;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MyDocument {
    pub status: Option<i64>,
    pub email_verified: bool,
    pub comments: Option<String>,
}

crate::document_attributes!(MyDocument { status });

impl MyDocument {
    pub fn with_status(status: i64) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UserContext {
    pub is_admin: bool,
    pub is_reviewer: bool,
}

/// Fields the article workflow's handlers touch.
pub trait Article {
    fn email_verified(&self) -> bool;
    fn set_comments(&mut self, comments: String);
}

impl Article for MyDocument {
    fn email_verified(&self) -> bool {
        self.email_verified
    }

    fn set_comments(&mut self, comments: String) {
        self.comments = Some(comments);
    }
}

impl Article for Value {
    fn email_verified(&self) -> bool {
        self["email_verified"] == json!(true)
    }

    fn set_comments(&mut self, comments: String) {
        self["comments"] = Value::String(comments);
    }
}

pub struct ReturnForReview;

impl<D: Article> InteractiveTransition<D, UserContext> for ReturnForReview {
    fn name(&self) -> &str {
        "ReturnForReview"
    }

    fn form(&self) -> Value {
        json!({"comments": "string"})
    }

    fn validate(&self, form: &Value) -> bool {
        form.get("comments").map_or(false, Value::is_string)
    }

    fn submit(
        &mut self,
        workflow: &mut Workflow<'_, D, UserContext>,
        form: &Value,
    ) -> Result<(), DocflowError> {
        let comments = form["comments"].as_str().unwrap_or_default().to_string();
        workflow.document_mut().set_comments(comments);
        Ok(())
    }
}

fn return_for_review<D: Article + 'static>() -> Box<dyn InteractiveTransition<D, UserContext>> {
    Box::new(ReturnForReview)
}

/// States, groups, transitions and permissions of the article workflow,
/// on top of whatever accessor `builder` already has.
pub fn declare_article<D: Article + 'static>(
    builder: WorkflowBuilder<D, UserContext>,
) -> WorkflowBuilder<D, UserContext> {
    builder
        .state("draft", 0, "Draft", "Only owner can see it")
        .state("pending", 1, "Pending", "Pending review")
        .state("published", 2, "Published", "Published")
        .state("withdrawn", 3, "Withdrawn", "Withdrawn by owner")
        .state("rejected", 4, "Rejected", "Rejected by reviewer")
        .group("not_published", "Not Published", [0, 1])
        .group(
            "removed",
            "Removed",
            [GroupMember::state("withdrawn"), GroupMember::state("rejected")],
        )
        .permissions(|wf| {
            let mut permissions = HashSet::new();
            if wf.context().is_admin {
                permissions.insert("can_publish".to_string());
                permissions.insert("can_return".to_string());
            }
            if wf.context().is_reviewer {
                permissions.insert("can_return".to_string());
            }
            permissions
        })
        .transition(TransitionBuilder::new("submit").from("draft").to("pending").title("Submit"))
        .transition(
            TransitionBuilder::<D, UserContext>::new("publish")
                .from("pending")
                .to("published")
                .permission("can_publish")
                .title("Publish")
                .handler(|workflow, _args| {
                    if !workflow.document().email_verified() {
                        return Err(DocflowError::rejected("Email address is not verified."));
                    }
                    Ok(Value::Null)
                }),
        )
        .transition(
            TransitionBuilder::new("withdraw")
                .from_any(["draft", "pending", "published"])
                .to("withdrawn")
                .title("Withdraw"),
        )
        .transition(
            TransitionBuilder::new("also_withdraw")
                .from_any(["draft", "pending", "published"])
                .to("withdrawn")
                .title("Also Withdraw"),
        )
        .transition(
            TransitionBuilder::<D, UserContext>::new("return_for_review")
                .from("pending")
                .to("draft")
                .permission("can_return")
                .title("Return for review")
                .interactive(|_, _| Ok(return_for_review())),
        )
}

pub fn my_document_workflow() -> Arc<WorkflowDefinition<MyDocument, UserContext>> {
    declare_article(WorkflowBuilder::new("MyDocumentWorkflow").state_attr("status"))
        .build()
        .unwrap()
}

pub fn extra_state_workflow(
    base: &Arc<WorkflowDefinition<MyDocument, UserContext>>,
) -> Arc<WorkflowDefinition<MyDocument, UserContext>> {
    WorkflowBuilder::new("MyDocumentWorkflowExtraState")
        .extends(base)
        .state("expired", 5, "Expired", "")
        .build()
        .unwrap()
}

pub fn my_document_workflow_dict() -> Arc<WorkflowDefinition<Value, UserContext>> {
    declare_article(WorkflowBuilder::new("MyDocumentWorkflowDict").state_key("status"))
        .build()
        .unwrap()
}

pub fn my_document_workflow_custom() -> Arc<WorkflowDefinition<MyDocument, UserContext>> {
    WorkflowBuilder::new("MyDocumentWorkflowCustom")
        .extends(&my_document_workflow())
        .state_accessor(
            |doc: &MyDocument| doc.status.map(StateValue::Int),
            |doc, value| {
                doc.status = Some(i64::try_from(value).map_err(|v| DocflowError::StateNotWritable {
                    reason: format!("status must be an integer, got {}", v),
                })?);
                Ok(())
            },
        )
        .build()
        .unwrap()
}
