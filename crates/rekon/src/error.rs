use thiserror::Error;

use crate::validation::ValidationException;

/// Umbrella error for everything that aborts a reconciliation run.
#[derive(Error, Debug)]
pub enum RekonError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Validation(#[from] ValidationException),

    #[error("Change computation failed: {0}")]
    Change(#[from] ChangeError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),
}

impl RekonError {
    /// Process exit code for a run that aborted with this error.
    ///
    /// Validation failures are reported as data (2); wiring and configuration
    /// defects are 3; anything else that stopped the run is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            RekonError::Validation(_) => 2,
            RekonError::Config(_) | RekonError::Registry(_) | RekonError::Selector(_) => 3,
            RekonError::Change(_) | RekonError::Controller(_) => 1,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required property '{name}'")]
    MissingProperty { name: String },

    #[error("Property '{name}' must be of type {expected}, found {found}")]
    InvalidType {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Invalid value for property '{name}': {reason}")]
    InvalidValue { name: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Conflicting definition: {category} '{name}' is already registered")]
    ConflictingDefinition { category: String, name: String },

    #[error("No {category} extension accepts resource type '{resource_type}'")]
    NoSuchExtension {
        category: String,
        resource_type: String,
    },

    #[error(
        "Multiple {category} extensions accept resource type '{resource_type}': {}",
        .candidates.join(", ")
    )]
    NoUniqueExtension {
        category: String,
        resource_type: String,
        candidates: Vec<String>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Invalid selector expression '{expression}': {reason}")]
    Syntax { expression: String, reason: String },

    #[error("Invalid selector pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unknown selector matching strategy: {0}")]
    UnknownStrategy(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChangeError {
    #[error("Duplicate key '{key}' for resource type '{resource_type}' in {side} state")]
    DuplicateKey {
        resource_type: String,
        key: String,
        side: &'static str,
    },

    #[error("State change '{name}' has neither a before nor an after value")]
    EmptyStateChange { name: String },
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Failed to fetch actual state for '{resource_type}': {message}")]
    Fetch {
        resource_type: String,
        message: String,
    },

    #[error("Controller '{controller}' is unavailable: {reason}")]
    Unavailable { controller: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Reporter failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, RekonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let validation = RekonError::Validation(ValidationException::new(vec![]));
        assert_eq!(validation.exit_code(), 2);

        let registry = RekonError::Registry(RegistryError::NoSuchExtension {
            category: "Controller".to_string(),
            resource_type: "kafka.rekon.io/v1/Topic".to_string(),
        });
        assert_eq!(registry.exit_code(), 3);

        let controller = RekonError::Controller(ControllerError::Fetch {
            resource_type: "kafka.rekon.io/v1/Topic".to_string(),
            message: "broker unreachable".to_string(),
        });
        assert_eq!(controller.exit_code(), 1);
    }

    #[test]
    fn test_no_unique_extension_lists_candidates() {
        let err = RegistryError::NoUniqueExtension {
            category: "Controller".to_string(),
            resource_type: "v1/Topic".to_string(),
            candidates: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().ends_with("a, b"));
    }
}
