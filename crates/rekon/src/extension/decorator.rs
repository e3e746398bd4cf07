//! Renames or re-prioritizes an extension without touching its implementation.

use async_trait::async_trait;
use std::sync::Arc;

use super::Extension;
use crate::config::{Configuration, PropertySpec};
use crate::controller::Controller;
use crate::error::{ConfigError, ControllerError, ReporterError};
use crate::executor::{ChangeHandler, PendingChange};
use crate::model::{ChangeResult, Operation, Resource, ResourceChange, ResourceType};
use crate::reporter::Reporter;
use crate::transform::Transformation;
use crate::validation::{Validation, ValidationResult};

/// Wraps an extension, overriding its name and/or priority and forwarding
/// everything else.
pub struct ExtensionDecorator<T: ?Sized> {
    inner: Arc<T>,
    name: Option<String>,
    priority: Option<i32>,
}

impl<T: ?Sized> ExtensionDecorator<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self {
            inner,
            name: None,
            priority: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn inner(&self) -> &Arc<T> {
        &self.inner
    }
}

impl<T: Extension + ?Sized> Extension for ExtensionDecorator<T> {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.inner.name())
    }

    fn priority(&self) -> i32 {
        self.priority.unwrap_or_else(|| self.inner.priority())
    }

    fn accepts(&self, resource_type: &ResourceType) -> bool {
        self.inner.accepts(resource_type)
    }

    fn properties(&self) -> Vec<PropertySpec> {
        self.inner.properties()
    }

    fn configure(&self, config: &Configuration) -> Result<(), ConfigError> {
        self.inner.configure(config)
    }
}

impl<T: Validation + ?Sized> Validation for ExtensionDecorator<T> {
    fn validate(&self, resource: &Resource, config: &Configuration) -> ValidationResult {
        self.inner.validate(resource, config)
    }
}

impl<T: Transformation + ?Sized> Transformation for ExtensionDecorator<T> {
    fn transform(
        &self,
        resource: Resource,
        batch: &[Resource],
        config: &Configuration,
    ) -> Option<Resource> {
        self.inner.transform(resource, batch, config)
    }
}

#[async_trait]
impl<T: Controller + ?Sized> Controller for ExtensionDecorator<T> {
    async fn fetch(
        &self,
        resource_type: &ResourceType,
        config: &Configuration,
    ) -> Result<Vec<Resource>, ControllerError> {
        self.inner.fetch(resource_type, config).await
    }
}

impl<T: Reporter + ?Sized> Reporter for ExtensionDecorator<T> {
    fn report(&self, results: &[ChangeResult], config: &Configuration) -> Result<(), ReporterError> {
        self.inner.report(results, config)
    }
}

impl<T: ChangeHandler + ?Sized> ChangeHandler for ExtensionDecorator<T> {
    fn supported_operations(&self) -> &[Operation] {
        self.inner.supported_operations()
    }

    fn handle_changes(&self, changes: Vec<ResourceChange>) -> Vec<PendingChange> {
        self.inner.handle_changes(changes)
    }

    fn describe(&self, change: &ResourceChange) -> String {
        self.inner.describe(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ExtensionRegistry;

    struct Base;

    impl Extension for Base {
        fn name(&self) -> &str {
            "base"
        }

        fn priority(&self) -> i32 {
            10
        }
    }

    impl Validation for Base {
        fn validate(&self, _resource: &Resource, _config: &Configuration) -> ValidationResult {
            ValidationResult::Success
        }
    }

    #[test]
    fn test_overrides_only_given_fields() {
        let base = Arc::new(Base);
        let renamed = ExtensionDecorator::new(Arc::clone(&base)).with_name("renamed");
        assert_eq!(renamed.name(), "renamed");
        assert_eq!(renamed.priority(), 10);

        let reprioritized = ExtensionDecorator::new(base).with_priority(-1);
        assert_eq!(reprioritized.name(), "base");
        assert_eq!(reprioritized.priority(), -1);
    }

    #[test]
    fn test_same_extension_registered_twice_under_new_name() {
        let base = Arc::new(Base);
        let mut registry = ExtensionRegistry::new();
        registry
            .register_validation(ExtensionDecorator::new(Arc::clone(&base)))
            .unwrap();
        registry
            .register_validation(
                ExtensionDecorator::new(base)
                    .with_name("base-early")
                    .with_priority(0),
            )
            .unwrap();

        let topic = ResourceType::new("kafka.rekon.io", "v1", "Topic");
        let names: Vec<&str> = registry
            .validations()
            .lookup(&topic)
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["base-early", "base"]);
    }
}
