//! Validation chain: rejects invalid desired resources before anything is touched.

pub mod builtin;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::Configuration;
use crate::extension::{Extension, ExtensionRegistry};
use crate::model::{Resource, ResourceRef};
use crate::parallel;

pub use builtin::{DuplicateResourceValidation, JsonSchemaValidation, NamePatternValidation};

/// A validation run against every desired resource of an accepted type.
pub trait Validation: Extension {
    fn validate(&self, resource: &Resource, config: &Configuration) -> ValidationResult;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Success,
    Failure(Vec<ValidationError>),
}

impl ValidationResult {
    pub fn failure(error: ValidationError) -> Self {
        ValidationResult::Failure(vec![error])
    }

    /// Success when `errors` is empty.
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            ValidationResult::Success
        } else {
            ValidationResult::Failure(errors)
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ValidationResult::Success => true,
            ValidationResult::Failure(errors) => errors.is_empty(),
        }
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        match self {
            ValidationResult::Success => Vec::new(),
            ValidationResult::Failure(errors) => errors,
        }
    }
}

/// One reason a resource was rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub validation_name: String,
    pub resource: ResourceRef,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl ValidationError {
    pub fn new(
        validation_name: impl Into<String>,
        resource: &Resource,
        message: impl Into<String>,
    ) -> Self {
        Self {
            validation_name: validation_name.into(),
            resource: resource.reference(),
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.validation_name, self.resource, self.message
        )
    }
}

/// Every validation error collected over a run.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Validation failed with {} error(s): {}", .errors.len(), join_errors(.errors))]
pub struct ValidationException {
    pub errors: Vec<ValidationError>,
}

impl ValidationException {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Runs all accepting validations, by ascending priority, over each resource.
///
/// Every applicable validation runs and all errors are collected; the run fails
/// if any were. Independent resources are validated in parallel.
pub struct ValidationChain {
    registry: Arc<ExtensionRegistry>,
}

impl ValidationChain {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }

    pub fn validate(&self, resources: &[Resource]) -> Result<(), ValidationException> {
        let mut errors = DuplicateResourceValidation.check(resources);

        let per_resource = parallel::map_ordered(resources, |r| self.validate_resource(r));
        errors.extend(per_resource.into_iter().flatten());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationException::new(errors))
        }
    }

    /// Errors for one resource; empty when valid or annotated to bypass.
    pub fn validate_resource(&self, resource: &Resource) -> Vec<ValidationError> {
        if resource.bypasses_validations() {
            debug!(resource = %resource.reference(), "Bypassing validations");
            return Vec::new();
        }

        let resource_type = resource.resource_type();
        let mut errors = Vec::new();
        for registered in self.registry.validations().lookup(&resource_type) {
            let result = registered
                .extension()
                .validate(resource, registered.config());
            errors.extend(result.into_errors());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceType, ANNOTATION_BYPASS_VALIDATIONS};
    use serde_json::json;
    use std::sync::Mutex;

    struct Recording {
        name: String,
        priority: i32,
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Extension for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    impl Validation for Recording {
        fn validate(&self, resource: &Resource, _config: &Configuration) -> ValidationResult {
            self.calls.lock().unwrap().push(self.name.clone());
            if self.fail {
                ValidationResult::failure(ValidationError::new(&self.name, resource, "rejected"))
            } else {
                ValidationResult::Success
            }
        }
    }

    fn topic(name: &str) -> Resource {
        Resource::new(
            &ResourceType::new("kafka.rekon.io", "v1", "Topic"),
            name,
            json!({}),
        )
    }

    fn chain(priorities: &[(i32, bool)]) -> (ValidationChain, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ExtensionRegistry::new();
        for (priority, fail) in priorities {
            registry
                .register_validation(Recording {
                    name: format!("v{}", priority),
                    priority: *priority,
                    calls: Arc::clone(&calls),
                    fail: *fail,
                })
                .unwrap();
        }
        (ValidationChain::new(Arc::new(registry)), calls)
    }

    #[test]
    fn test_runs_in_priority_order() {
        let (chain, calls) = chain(&[(3, false), (0, false), (2, false), (1, false)]);
        chain.validate(&[topic("orders")]).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["v0", "v1", "v2", "v3"]);
    }

    #[test]
    fn test_collects_all_errors_without_stopping() {
        let (chain, calls) = chain(&[(0, true), (1, false), (2, true)]);
        let err = chain.validate(&[topic("orders")]).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert!(err.to_string().starts_with("Validation failed with 2 error(s)"));
    }

    #[test]
    fn test_bypass_skips_chain() {
        let (chain, calls) = chain(&[(0, true)]);
        let resource = topic("orders").with_annotation(ANNOTATION_BYPASS_VALIDATIONS, "true");
        chain.validate(&[resource]).unwrap();
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicates_are_rejected_even_when_bypassed() {
        let (chain, _calls) = chain(&[]);
        let a = topic("orders").with_annotation(ANNOTATION_BYPASS_VALIDATIONS, "true");
        let err = chain.validate(&[a.clone(), a]).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].validation_name, "DuplicateResourceValidation");
    }

    #[test]
    fn test_result_helpers() {
        assert!(ValidationResult::from_errors(vec![]).is_success());
        let err = ValidationError::new("v", &topic("x"), "bad").with_detail("field", json!("spec"));
        let result = ValidationResult::from_errors(vec![err.clone()]);
        assert!(!result.is_success());
        assert_eq!(result.into_errors(), vec![err]);
    }
}
