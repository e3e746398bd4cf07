//! Per resource type diff policy.

use std::sync::Arc;

use crate::change::{KeyMapper, NameKeyMapper, SpecValueMapper, ValueMapper};
use crate::model::ResourceType;

/// A registered resource type and how its instances are keyed and compared.
#[derive(Clone)]
pub struct ResourceDescriptor {
    resource_type: ResourceType,
    description: String,
    key_mapper: Arc<dyn KeyMapper>,
    value_mapper: Arc<dyn ValueMapper>,
    value_field: String,
}

impl ResourceDescriptor {
    /// Keys by name and compares `spec`.
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            description: String::new(),
            key_mapper: Arc::new(NameKeyMapper),
            value_mapper: Arc::new(SpecValueMapper),
            value_field: "spec".to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_key_mapper(mut self, mapper: impl KeyMapper + 'static) -> Self {
        self.key_mapper = Arc::new(mapper);
        self
    }

    pub fn with_value_mapper(mut self, mapper: impl ValueMapper + 'static) -> Self {
        self.value_mapper = Arc::new(mapper);
        self
    }

    /// Name of the state change emitted when the mapped value is not an object.
    pub fn with_value_field(mut self, field: impl Into<String>) -> Self {
        self.value_field = field.into();
        self
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn key_mapper(&self) -> &Arc<dyn KeyMapper> {
        &self.key_mapper
    }

    pub fn value_mapper(&self) -> &Arc<dyn ValueMapper> {
        &self.value_mapper
    }

    pub fn value_field(&self) -> &str {
        &self.value_field
    }
}

impl std::fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("resource_type", &self.resource_type)
            .field("description", &self.description)
            .field("value_field", &self.value_field)
            .finish()
    }
}
