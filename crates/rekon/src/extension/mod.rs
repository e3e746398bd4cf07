//! Extension model: named, prioritized implementations registered per resource type.

pub mod decorator;
pub mod registry;
pub mod resource;

use serde::Serialize;

use crate::config::{Configuration, PropertySpec};
use crate::error::ConfigError;
use crate::model::ResourceType;

pub use decorator::ExtensionDecorator;
pub use registry::{ExtensionCatalog, ExtensionProvider, ExtensionRegistry, Registered};
pub use resource::ResourceDescriptor;

/// The kinds of pluggable implementations the registry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExtensionCategory {
    Validation,
    Transformation,
    Controller,
    Reporter,
    ChangeHandler,
}

impl std::fmt::Display for ExtensionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtensionCategory::Validation => write!(f, "Validation"),
            ExtensionCategory::Transformation => write!(f, "Transformation"),
            ExtensionCategory::Controller => write!(f, "Controller"),
            ExtensionCategory::Reporter => write!(f, "Reporter"),
            ExtensionCategory::ChangeHandler => write!(f, "ChangeHandler"),
        }
    }
}

/// Common surface of every extension.
///
/// Lower priorities run first; equal priorities keep registration order.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    /// Returns true when this extension handles resources of `resource_type`.
    fn accepts(&self, _resource_type: &ResourceType) -> bool {
        true
    }

    /// Configuration properties this extension declares.
    fn properties(&self) -> Vec<PropertySpec> {
        Vec::new()
    }

    /// Checks a registration's resolved configuration beyond property types,
    /// e.g. that a pattern compiles. Called once per registration.
    fn configure(&self, _config: &Configuration) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Describes a registered extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub category: ExtensionCategory,
    pub priority: i32,
    pub properties: Vec<PropertySpec>,
}

/// Which resource types an extension accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AcceptedTypes {
    #[default]
    Any,
    /// Matches on kind alone, across groups and versions.
    Kinds(Vec<String>),
    Types(Vec<ResourceType>),
}

impl AcceptedTypes {
    pub fn kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AcceptedTypes::Kinds(kinds.into_iter().map(Into::into).collect())
    }

    pub fn types<I: IntoIterator<Item = ResourceType>>(types: I) -> Self {
        AcceptedTypes::Types(types.into_iter().collect())
    }

    pub fn accepts(&self, resource_type: &ResourceType) -> bool {
        match self {
            AcceptedTypes::Any => true,
            AcceptedTypes::Kinds(kinds) => kinds.iter().any(|k| *k == resource_type.kind),
            AcceptedTypes::Types(types) => types.iter().any(|t| t == resource_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_types() {
        let topic_v1 = ResourceType::new("kafka.rekon.io", "v1", "Topic");
        let topic_v2 = ResourceType::new("kafka.rekon.io", "v2", "Topic");
        let acl = ResourceType::new("kafka.rekon.io", "v1", "Acl");

        assert!(AcceptedTypes::Any.accepts(&acl));

        let kinds = AcceptedTypes::kinds(["Topic"]);
        assert!(kinds.accepts(&topic_v1));
        assert!(kinds.accepts(&topic_v2));
        assert!(!kinds.accepts(&acl));

        let types = AcceptedTypes::types([topic_v1.clone()]);
        assert!(types.accepts(&topic_v1));
        assert!(!types.accepts(&topic_v2));
    }
}
