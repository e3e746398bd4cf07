use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Validation, ValidationError, ValidationResult};
use crate::config::{Configuration, PropertyKind, PropertySpec};
use crate::error::ConfigError;
use crate::extension::{AcceptedTypes, Extension};
use crate::model::{Resource, ResourceRef, ResourceType};

/// Rejects a batch that declares the same resource twice.
///
/// Not a registered extension: the chain always runs it over the whole batch,
/// including resources that bypass per-resource validations.
pub struct DuplicateResourceValidation;

impl DuplicateResourceValidation {
    pub const NAME: &'static str = "DuplicateResourceValidation";

    pub fn check(&self, resources: &[Resource]) -> Vec<ValidationError> {
        let mut seen: BTreeMap<ResourceRef, usize> = BTreeMap::new();
        for resource in resources {
            *seen.entry(resource.reference()).or_default() += 1;
        }

        let mut errors = Vec::new();
        let mut reported = std::collections::BTreeSet::new();
        for resource in resources {
            let reference = resource.reference();
            let count = seen.get(&reference).copied().unwrap_or(0);
            if count > 1 && reported.insert(reference) {
                errors.push(
                    ValidationError::new(
                        Self::NAME,
                        resource,
                        format!("Resource is declared {} times", count),
                    )
                    .with_detail("occurrences", json!(count)),
                );
            }
        }
        errors
    }
}

/// Validates resource specs against a JSON schema.
pub struct JsonSchemaValidation {
    name: String,
    accepted: AcceptedTypes,
    validator: jsonschema::Validator,
}

impl JsonSchemaValidation {
    /// Compiles `schema` up front so a broken schema fails at startup.
    pub fn new(
        name: impl Into<String>,
        accepted: AcceptedTypes,
        schema: &Value,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let validator =
            jsonschema::validator_for(schema).map_err(|e| ConfigError::InvalidValue {
                name: format!("{}.schema", name),
                reason: format!("Failed to compile JSON schema: {}", e),
            })?;
        Ok(Self {
            name,
            accepted,
            validator,
        })
    }

    pub fn for_type(resource_type: ResourceType, schema: &Value) -> Result<Self, ConfigError> {
        let name = format!("{}SchemaValidation", resource_type.kind);
        Self::new(name, AcceptedTypes::types(vec![resource_type]), schema)
    }
}

impl Extension for JsonSchemaValidation {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, resource_type: &ResourceType) -> bool {
        self.accepted.accepts(resource_type)
    }
}

impl Validation for JsonSchemaValidation {
    fn validate(&self, resource: &Resource, _config: &Configuration) -> ValidationResult {
        let errors = self
            .validator
            .iter_errors(&resource.spec)
            .map(|e| ValidationError::new(&self.name, resource, e.to_string()))
            .collect();
        ValidationResult::from_errors(errors)
    }
}

/// Requires resource names to match the configured `pattern` (anchored).
///
/// Patterns are compiled when the validation is registered; a pattern that
/// does not compile is a configuration error.
pub struct NamePatternValidation {
    accepted: AcceptedTypes,
    compiled: Mutex<BTreeMap<String, Regex>>,
}

impl NamePatternValidation {
    pub const NAME: &'static str = "NamePatternValidation";

    pub fn new(accepted: AcceptedTypes) -> Self {
        Self {
            accepted,
            compiled: Mutex::new(BTreeMap::new()),
        }
    }

    fn regex(&self, pattern: &str) -> Result<Regex, regex::Error> {
        let mut compiled = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(regex) = compiled.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        compiled.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl Extension for NamePatternValidation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accepts(&self, resource_type: &ResourceType) -> bool {
        self.accepted.accepts(resource_type)
    }

    fn properties(&self) -> Vec<PropertySpec> {
        vec![PropertySpec::new("pattern", PropertyKind::String)
            .required()
            .description("Regular expression every resource name must match")]
    }

    fn configure(&self, config: &Configuration) -> Result<(), ConfigError> {
        let pattern = config.get_str("pattern")?.unwrap_or(".*");
        self.regex(pattern)
            .map(|_| ())
            .map_err(|e| ConfigError::InvalidValue {
                name: "pattern".to_string(),
                reason: e.to_string(),
            })
    }
}

impl Validation for NamePatternValidation {
    fn validate(&self, resource: &Resource, config: &Configuration) -> ValidationResult {
        let pattern = config.get_str("pattern").ok().flatten().unwrap_or(".*");
        let regex = match self.regex(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                return ValidationResult::failure(
                    ValidationError::new(Self::NAME, resource, format!("Invalid pattern: {}", e))
                        .with_detail("pattern", json!(pattern)),
                )
            }
        };

        if regex.is_match(resource.name()) {
            ValidationResult::Success
        } else {
            ValidationResult::failure(
                ValidationError::new(
                    Self::NAME,
                    resource,
                    format!("Name '{}' does not match '{}'", resource.name(), pattern),
                )
                .with_detail("pattern", json!(pattern)),
            )
        }
    }
}
