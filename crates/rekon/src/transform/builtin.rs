use serde_json::{Map, Value};

use super::Transformation;
use crate::config::{Configuration, PropertyKind, PropertySpec};
use crate::extension::{AcceptedTypes, Extension};
use crate::model::{Resource, ResourceType, ANNOTATION_RECONCILED_AT};

/// Fills in spec fields from the configured `defaults` map.
///
/// Values declared on the resource always win; nested objects are merged.
pub struct SpecDefaultsTransformation {
    accepted: AcceptedTypes,
}

impl SpecDefaultsTransformation {
    pub const NAME: &'static str = "SpecDefaultsTransformation";

    pub fn new(accepted: AcceptedTypes) -> Self {
        Self { accepted }
    }
}

impl Extension for SpecDefaultsTransformation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        -100
    }

    fn accepts(&self, resource_type: &ResourceType) -> bool {
        self.accepted.accepts(resource_type)
    }

    fn properties(&self) -> Vec<PropertySpec> {
        vec![PropertySpec::new("defaults", PropertyKind::Map)
            .default_value(Value::Object(Map::new()))
            .description("Spec values applied where the resource declares none")]
    }
}

impl Transformation for SpecDefaultsTransformation {
    fn transform(
        &self,
        mut resource: Resource,
        _batch: &[Resource],
        config: &Configuration,
    ) -> Option<Resource> {
        if let Some(defaults) = config.get("defaults") {
            let declared = std::mem::take(&mut resource.spec);
            resource.spec = with_defaults(defaults, declared);
        }
        Some(resource)
    }
}

fn with_defaults(defaults: &Value, declared: Value) -> Value {
    match (defaults, declared) {
        (Value::Object(defaults), Value::Object(mut declared)) => {
            for (key, default) in defaults {
                let merged = match declared.remove(key) {
                    Some(value) => with_defaults(default, value),
                    None => default.clone(),
                };
                declared.insert(key.clone(), merged);
            }
            Value::Object(declared)
        }
        (defaults, Value::Null) => defaults.clone(),
        (_, declared) => declared,
    }
}

/// Adds the configured `labels` and `annotations` to every accepted resource.
///
/// Entries already on the resource are kept. With `stampReconciledAt` set, the
/// resource is also annotated with the current time.
pub struct EnrichMetadataTransformation {
    accepted: AcceptedTypes,
}

impl EnrichMetadataTransformation {
    pub const NAME: &'static str = "EnrichMetadataTransformation";

    pub fn new(accepted: AcceptedTypes) -> Self {
        Self { accepted }
    }
}

impl Extension for EnrichMetadataTransformation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accepts(&self, resource_type: &ResourceType) -> bool {
        self.accepted.accepts(resource_type)
    }

    fn properties(&self) -> Vec<PropertySpec> {
        vec![
            PropertySpec::new("labels", PropertyKind::Map),
            PropertySpec::new("annotations", PropertyKind::Map),
            PropertySpec::new("stampReconciledAt", PropertyKind::Bool)
                .default_value(Value::Bool(false)),
        ]
    }
}

impl Transformation for EnrichMetadataTransformation {
    fn transform(
        &self,
        mut resource: Resource,
        _batch: &[Resource],
        config: &Configuration,
    ) -> Option<Resource> {
        // Types were checked when the extension was registered.
        let labels = config.get_string_map("labels").unwrap_or_default();
        let annotations = config.get_string_map("annotations").unwrap_or_default();

        for (key, value) in labels {
            resource.metadata.labels.entry(key).or_insert(value);
        }
        for (key, value) in annotations {
            resource.metadata.annotations.entry(key).or_insert(value);
        }
        if config.get_bool_or("stampReconciledAt", false).unwrap_or(false) {
            resource.metadata.annotations.insert(
                ANNOTATION_RECONCILED_AT.to_string(),
                chrono::Utc::now().to_rfc3339(),
            );
        }
        Some(resource)
    }
}
