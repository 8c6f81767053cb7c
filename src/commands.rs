//! Command execution.

use crate::Commands;
use colored::Colorize;
use docflow_core::{Dispatch, Workflow, WorkflowBuilder, WorkflowDefinition, WorkflowDefinitionRaw};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Caller context for CLI workflows: the permission tokens granted with `--grant`.
#[derive(Debug, Default, Clone)]
pub struct Grants(pub HashSet<String>);

impl From<Vec<String>> for Grants {
    fn from(tokens: Vec<String>) -> Self {
        Grants(tokens.into_iter().collect())
    }
}

/// Loads a declaration table (YAML for `.yaml`/`.yml`, JSON otherwise) and
/// builds it. Permissions are exactly the granted tokens.
pub fn load_definition(
    path: &Path,
) -> Result<Arc<WorkflowDefinition<Value, Grants>>, Box<dyn std::error::Error>> {
    let raw = WorkflowDefinitionRaw::from_file(path)?;
    let definition = WorkflowBuilder::<Value, Grants>::from_raw(raw)
        .permissions(|wf| wf.context().0.clone())
        .build()?;
    tracing::debug!("Loaded workflow '{}' from {}", definition.name(), path.display());
    Ok(definition)
}

/// Executes a command and returns the formatted output.
pub fn execute(
    definition: &Arc<WorkflowDefinition<Value, Grants>>,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::States => {
            let mut output = format!(
                "{} ({})\n",
                format!("Workflow {}", definition.name().cyan()).bold(),
                definition.accessor().describe()
            );
            for state in definition.states() {
                output.push_str(&format!(
                    "  {} = {}  {}",
                    state.name().cyan(),
                    state.value(),
                    state.title()
                ));
                if !state.description().is_empty() {
                    output.push_str(&format!(" - {}", state.description().dimmed()));
                }
                output.push('\n');
            }
            if !definition.groups().is_empty() {
                output.push_str(&format!("{}\n", "Groups".bold()));
                for group in definition.groups() {
                    let members = group
                        .members()
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    output.push_str(&format!(
                        "  {} = [{}]  {}\n",
                        group.name().cyan(),
                        members,
                        group.title()
                    ));
                }
            }
            Ok(output.trim_end().to_string())
        }

        Commands::Describe => {
            let raw = definition.to_raw();
            Ok(format!(
                "{}\n  Checksum: {}\n  Lineage: {}\n{}",
                format!("Workflow {}", definition.name().cyan()).bold(),
                definition.checksum(),
                definition.lineage().join(" > "),
                format_json(&raw.to_json()?)
            ))
        }

        Commands::Transitions { document, grant } => {
            let mut document = parse_json_arg(&document)?;
            let workflow =
                Workflow::with_context(Arc::clone(definition), &mut document, Grants::from(grant))?;
            let state = workflow.state()?;
            let transitions = workflow.transitions()?;

            let mut output = format!("State: {}\n", state.name().yellow());
            if transitions.is_empty() {
                output.push_str(&"No transitions available".yellow().to_string());
                return Ok(output);
            }
            for t in transitions {
                output.push_str(&format!("  {} -> {}", t.name.cyan(), t.to));
                if !t.title.is_empty() {
                    output.push_str(&format!("  {}", t.title));
                }
                if let Some(permission) = &t.permission {
                    output.push_str(&format!(" [{}]", permission.dimmed()));
                }
                output.push('\n');
            }
            Ok(output.trim_end().to_string())
        }

        Commands::Apply {
            document,
            transition,
            args,
            grant,
            output,
        } => {
            let mut document = parse_json_arg(&document)?;
            let args = args
                .map(|a| parse_json_arg(&a))
                .transpose()?
                .unwrap_or(Value::Null);

            let mut workflow =
                Workflow::with_context(Arc::clone(definition), &mut document, Grants::from(grant))?;
            let summary = match workflow.apply(&transition, args)? {
                Dispatch::Committed(result) => format!(
                    "{} {}: {} -> {}",
                    "Applied".green(),
                    result.transition.cyan(),
                    result.from_state,
                    result.to_state.yellow()
                ),
                Dispatch::Pending(pending) => format!(
                    "{} {} awaits input: {}",
                    "Pending".yellow(),
                    pending.name().cyan(),
                    pending.form()
                ),
            };
            drop(workflow);

            if let Some(path) = output {
                std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
            }
            Ok(format!("{}\n{}", summary, format_json(&document)))
        }

        Commands::Sort { documents } => {
            let documents = parse_json_arg(&documents)?;
            let documents = documents
                .as_array()
                .ok_or("expected a JSON array of documents")?;
            let sorted = definition.sort_documents(documents)?;

            if sorted.is_empty() {
                return Ok("No documents".yellow().to_string());
            }
            let mut output = String::new();
            for state in definition.states() {
                if let Some(bucket) = sorted.get(state.name()) {
                    output.push_str(&format!("{} ({})\n", state.name().cyan(), bucket.len()));
                    for doc in bucket {
                        output.push_str(&format!("  {}\n", doc));
                    }
                }
            }
            Ok(output.trim_end().to_string())
        }
    }
}

/// Parses a JSON argument, reading it from a file if it starts with `@`.
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
