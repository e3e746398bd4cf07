//! Computed changes and their execution results.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use super::resource::{ObjectMeta, ResourceRef, ResourceType};
use crate::error::ChangeError;

/// Classification of a computed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    None,
}

impl Operation {
    /// Derives the operation from which sides of a delta are present.
    ///
    /// Returns `None` when neither side is present, which is not a change at all.
    pub fn derive(before_present: bool, after_present: bool, equal: bool) -> Option<Operation> {
        match (before_present, after_present) {
            (false, false) => None,
            (false, true) => Some(Operation::Create),
            (true, false) => Some(Operation::Delete),
            (true, true) if equal => Some(Operation::None),
            (true, true) => Some(Operation::Update),
        }
    }

    /// Returns all operations.
    pub fn all() -> &'static [Operation] {
        &[
            Operation::Create,
            Operation::Update,
            Operation::Delete,
            Operation::None,
        ]
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
            Operation::None => write!(f, "NONE"),
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "none" => Ok(Operation::None),
            _ => Err(format!("Unknown operation: {}", s)),
        }
    }
}

/// A single named field's before/after delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<Value>,
}

impl StateChange {
    pub fn new(
        name: impl Into<String>,
        before: Option<Value>,
        after: Option<Value>,
    ) -> Result<Self, ChangeError> {
        let name = name.into();
        if before.is_none() && after.is_none() {
            return Err(ChangeError::EmptyStateChange { name });
        }
        Ok(Self {
            name,
            before,
            after,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn before(&self) -> Option<&Value> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Value> {
        self.after.as_ref()
    }

    pub fn operation(&self) -> Operation {
        Operation::derive(
            self.before.is_some(),
            self.after.is_some(),
            self.before == self.after,
        )
        .unwrap_or(Operation::None)
    }

    /// False when both sides are present and equal.
    pub fn is_effective(&self) -> bool {
        self.operation() != Operation::None
    }
}

/// A resource's metadata plus the operation and field deltas needed to converge it.
///
/// The operation is derived from the before/after values given to
/// [`ResourceChange::between`]; there is no way to set it independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChange {
    resource_type: ResourceType,
    metadata: ObjectMeta,
    operation: Operation,
    changes: Vec<StateChange>,
}

impl ResourceChange {
    /// Builds a change between two value representations of the same resource.
    ///
    /// Object values are split into one [`StateChange`] per top-level key, in key
    /// order. Anything else becomes a single state change named `field`.
    pub fn between(
        resource_type: ResourceType,
        metadata: ObjectMeta,
        field: &str,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> Result<Self, ChangeError> {
        let operation = Operation::derive(before.is_some(), after.is_some(), before == after)
            .ok_or_else(|| ChangeError::EmptyStateChange {
                name: field.to_string(),
            })?;
        let changes = state_changes(field, before, after)?;
        Ok(Self {
            resource_type,
            metadata,
            operation,
            changes,
        })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.resource_type.clone(), self.metadata.name.clone())
    }

    pub fn changes(&self) -> &[StateChange] {
        &self.changes
    }

    /// Looks up a state change by field name.
    pub fn state(&self, name: &str) -> Option<&StateChange> {
        self.changes.iter().find(|c| c.name == name)
    }
}

fn state_changes(
    field: &str,
    before: Option<&Value>,
    after: Option<&Value>,
) -> Result<Vec<StateChange>, ChangeError> {
    let before_obj = before.and_then(Value::as_object);
    let after_obj = after.and_then(Value::as_object);
    let splittable = match (before, after) {
        (Some(b), Some(a)) => b.is_object() && a.is_object(),
        (Some(b), None) => b.is_object(),
        (None, Some(a)) => a.is_object(),
        (None, None) => false,
    };

    if splittable {
        let keys: BTreeSet<&String> = before_obj
            .into_iter()
            .flat_map(|m| m.keys())
            .chain(after_obj.into_iter().flat_map(|m| m.keys()))
            .collect();
        if !keys.is_empty() {
            return keys
                .into_iter()
                .map(|key| {
                    StateChange::new(
                        key.clone(),
                        before_obj.and_then(|m| m.get(key)).cloned(),
                        after_obj.and_then(|m| m.get(key)).cloned(),
                    )
                })
                .collect();
        }
    }

    Ok(vec![StateChange::new(
        field,
        before.cloned(),
        after.cloned(),
    )?])
}

/// Execution status of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeStatus {
    Changed,
    Ok,
    Failed,
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeStatus::Changed => write!(f, "CHANGED"),
            ChangeStatus::Ok => write!(f, "OK"),
            ChangeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Error code for a fault raised without a more specific code.
pub const CODE_EXECUTION_FAILED: &str = "EXECUTION_FAILED";

/// A per-change fault captured during execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionError {
    pub message: String,
    pub code: String,
}

impl ExecutionError {
    /// A fault with the generic `EXECUTION_FAILED` code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: CODE_EXECUTION_FAILED.to_string(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// The outcome of executing (or dry-running) one change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeResult {
    pub change: ResourceChange,
    pub status: ChangeStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExecutionError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ChangeResult {
    pub fn ok(change: ResourceChange) -> Self {
        Self {
            change,
            status: ChangeStatus::Ok,
            errors: Vec::new(),
            description: None,
        }
    }

    pub fn changed(change: ResourceChange) -> Self {
        Self {
            change,
            status: ChangeStatus::Changed,
            errors: Vec::new(),
            description: None,
        }
    }

    pub fn failed(change: ResourceChange, error: ExecutionError) -> Self {
        Self {
            change,
            status: ChangeStatus::Failed,
            errors: vec![error],
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == ChangeStatus::Failed
    }
}

/// Per-operation counts over a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ChangeSummary {
    /// Counts results by operation; failed results are counted only as failed.
    pub fn from_results(results: &[ChangeResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            if result.is_failed() {
                summary.failed += 1;
                continue;
            }
            match result.change.operation() {
                Operation::Create => summary.created += 1,
                Operation::Update => summary.updated += 1,
                Operation::Delete => summary.deleted += 1,
                Operation::None => summary.unchanged += 1,
            }
        }
        summary
    }
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={}, updated={}, deleted={}, unchanged={}, failed={}",
            self.created, self.updated, self.deleted, self.unchanged, self.failed
        )
    }
}
