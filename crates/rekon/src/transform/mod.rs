//! Transformation chain: rewrites or drops desired resources before diffing.

pub mod builtin;

use std::sync::Arc;
use tracing::debug;

use crate::config::Configuration;
use crate::extension::{Extension, ExtensionRegistry};
use crate::model::Resource;
use crate::parallel;

pub use builtin::{EnrichMetadataTransformation, SpecDefaultsTransformation};

/// Rewrites one resource. Returning `None` drops it from the run.
///
/// `batch` is the full desired set as it entered the chain, for
/// transformations that need to look at sibling resources.
pub trait Transformation: Extension {
    fn transform(
        &self,
        resource: Resource,
        batch: &[Resource],
        config: &Configuration,
    ) -> Option<Resource>;
}

/// Applies accepting transformations by ascending priority, each one seeing
/// the previous one's output.
pub struct TransformationChain {
    registry: Arc<ExtensionRegistry>,
}

impl TransformationChain {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }

    /// Transforms every resource, keeping input order and dropping the ones a
    /// transformation removed.
    pub fn transform(&self, resources: &[Resource]) -> Vec<Resource> {
        parallel::map_ordered(resources, |r| self.transform_resource(r.clone(), resources))
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn transform_resource(&self, resource: Resource, batch: &[Resource]) -> Option<Resource> {
        let resource_type = resource.resource_type();
        let mut current = resource;
        for registered in self.registry.transformations().lookup(&resource_type) {
            let reference = current.reference();
            match registered
                .extension()
                .transform(current, batch, registered.config())
            {
                Some(next) => current = next,
                None => {
                    debug!(
                        resource = %reference,
                        transformation = registered.name(),
                        "Resource dropped by transformation"
                    );
                    return None;
                }
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceType;
    use serde_json::json;
    use std::sync::Mutex;

    struct Append {
        name: String,
        priority: i32,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Extension for Append {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    impl Transformation for Append {
        fn transform(
            &self,
            mut resource: Resource,
            _batch: &[Resource],
            _config: &Configuration,
        ) -> Option<Resource> {
            self.calls.lock().unwrap().push(self.name.clone());
            if let Some(trail) = resource.spec["trail"].as_array_mut() {
                trail.push(json!(self.name));
            }
            Some(resource)
        }
    }

    struct DropNamed(&'static str);

    impl Extension for DropNamed {
        fn name(&self) -> &str {
            "drop"
        }

        fn priority(&self) -> i32 {
            1
        }
    }

    impl Transformation for DropNamed {
        fn transform(
            &self,
            resource: Resource,
            _batch: &[Resource],
            _config: &Configuration,
        ) -> Option<Resource> {
            (resource.name() != self.0).then_some(resource)
        }
    }

    fn topic(name: &str) -> Resource {
        Resource::new(
            &ResourceType::new("kafka.rekon.io", "v1", "Topic"),
            name,
            json!({"trail": []}),
        )
    }

    #[test]
    fn test_applies_in_priority_order_and_short_circuits() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ExtensionRegistry::new();
        for (name, priority) in [("late", 5), ("early", 0)] {
            registry
                .register_transformation(Append {
                    name: name.to_string(),
                    priority,
                    calls: Arc::clone(&calls),
                })
                .unwrap();
        }
        registry.register_transformation(DropNamed("b")).unwrap();
        let chain = TransformationChain::new(Arc::new(registry));

        let out = chain.transform(&[topic("a"), topic("b"), topic("c")]);

        let names: Vec<&str> = out.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(out[0].spec["trail"], json!(["early", "late"]));
        // "b" never reaches the priority-5 transformation.
        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| *c == "early").count(), 3);
        assert_eq!(calls.iter().filter(|c| *c == "late").count(), 2);
    }

    #[test]
    fn test_registration_order_does_not_decide_application_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ExtensionRegistry::new();
        for priority in [3, 0, 2, 1] {
            registry
                .register_transformation(Append {
                    name: format!("t{}", priority),
                    priority,
                    calls: Arc::clone(&calls),
                })
                .unwrap();
        }
        let chain = TransformationChain::new(Arc::new(registry));

        let out = chain.transform(&[topic("a")]);

        assert_eq!(out[0].spec["trail"], json!(["t0", "t1", "t2", "t3"]));
        assert_eq!(*calls.lock().unwrap(), vec!["t0", "t1", "t2", "t3"]);
    }

    #[test]
    fn test_no_transformations_is_identity() {
        let chain = TransformationChain::new(Arc::new(ExtensionRegistry::new()));
        let input = vec![topic("a")];
        assert_eq!(chain.transform(&input), input);
    }
}
