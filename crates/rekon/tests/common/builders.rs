//! Builder patterns for creating test resources.

#![allow(dead_code)]

use rekon::model::{Resource, ResourceType};
use serde_json::{json, Value};

pub const GROUP: &str = "kafka.rekon.io";

pub fn topic_type() -> ResourceType {
    ResourceType::new(GROUP, "v1", "Topic")
}

pub fn acl_type() -> ResourceType {
    ResourceType::new(GROUP, "v1", "Acl")
}

/// A topic whose spec is `{"partitions": n}`.
pub fn topic(name: &str, partitions: i64) -> Resource {
    ResourceBuilder::topic(name)
        .spec(json!({ "partitions": partitions }))
        .build()
}

/// Builder for `Resource` instances.
pub struct ResourceBuilder {
    resource_type: ResourceType,
    name: String,
    spec: Value,
    labels: Vec<(String, String)>,
    annotations: Vec<(String, String)>,
}

impl ResourceBuilder {
    pub fn new(resource_type: ResourceType, name: &str) -> Self {
        Self {
            resource_type,
            name: name.to_string(),
            spec: json!({}),
            labels: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn topic(name: &str) -> Self {
        Self::new(topic_type(), name)
    }

    pub fn acl(name: &str) -> Self {
        Self::new(acl_type(), name)
    }

    pub fn spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.push((key.to_string(), value.to_string()));
        self
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> Resource {
        let mut resource = Resource::new(&self.resource_type, self.name, self.spec);
        for (key, value) in self.labels {
            resource = resource.with_label(key, value);
        }
        for (key, value) in self.annotations {
            resource = resource.with_annotation(key, value);
        }
        resource
    }
}
