//! K8s-style resource types: identity, metadata and spec.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Soft-delete marker: the resource is removed from actual state even when
/// orphan deletion is disabled.
pub const ANNOTATION_DELETE: &str = "rekon.io/delete";

/// Skips the validation chain for the annotated resource.
pub const ANNOTATION_BYPASS_VALIDATIONS: &str = "rekon.io/bypass-validations";

/// Excludes the annotated resource from the run entirely.
pub const ANNOTATION_IGNORE: &str = "rekon.io/ignore";

/// Set by the metadata enrichment transformation.
pub const ANNOTATION_RECONCILED_AT: &str = "rekon.io/reconciled-at";

/// Identity of a resource type: `(group, version, kind)`.
///
/// The core group is the empty string, so `v1/ConfigMap` has no group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceType {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl ResourceType {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Builds a type from an `apiVersion` (`group/version` or bare `version`) and a kind.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), api_version.to_string()),
        };
        Self {
            group,
            version,
            kind: kind.into(),
        }
    }

    /// Returns the `apiVersion` string for this type.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(format!("Invalid resource type: {}", s));
        }
        match parts.as_slice() {
            [version, kind] => Ok(ResourceType::new("", *version, *kind)),
            [group, version, kind] => Ok(ResourceType::new(*group, *version, *kind)),
            _ => Err(format!("Invalid resource type: {}", s)),
        }
    }
}

/// Metadata for a resource, following K8s conventions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// The unique name of the resource within its type.
    pub name: String,

    /// Key-value labels for organizing and selecting resources.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Key-value annotations for storing additional metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Creates a new ObjectMeta with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// Adds a label to the metadata.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation to the metadata.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Returns true when the annotation is present and set to `true` (any case).
    pub fn annotation_flag(&self, key: &str) -> bool {
        self.annotations
            .get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

/// A generic resource: type identity, metadata and an opaque spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// `group/version`, or a bare version for the core group.
    pub api_version: String,

    /// The kind of resource.
    pub kind: String,

    /// Resource metadata.
    pub metadata: ObjectMeta,

    /// Desired or observed state, compared by the default value mapper.
    #[serde(default)]
    pub spec: Value,
}

impl Resource {
    /// Creates a new resource of the given type.
    pub fn new(resource_type: &ResourceType, name: impl Into<String>, spec: Value) -> Self {
        Self {
            api_version: resource_type.api_version(),
            kind: resource_type.kind.clone(),
            metadata: ObjectMeta::new(name),
            spec,
        }
    }

    /// Returns the name of the resource.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn resource_type(&self) -> ResourceType {
        ResourceType::from_api_version(&self.api_version, self.kind.clone())
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.resource_type(), self.name())
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// True when the resource carries the soft-delete marker.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.metadata.annotation_flag(ANNOTATION_DELETE)
    }

    pub fn bypasses_validations(&self) -> bool {
        self.metadata.annotation_flag(ANNOTATION_BYPASS_VALIDATIONS)
    }

    pub fn is_ignored(&self) -> bool {
        self.metadata.annotation_flag(ANNOTATION_IGNORE)
    }
}

/// Points at a resource by type and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub name: String,
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.name)
    }
}
