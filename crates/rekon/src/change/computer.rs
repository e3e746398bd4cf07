//! The diff algorithm.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::mapper::{KeyMapper, NameKeyMapper, SpecValueMapper, ValueMapper};
use crate::error::ChangeError;
use crate::extension::ResourceDescriptor;
use crate::model::{Resource, ResourceChange};

/// Computes the changes converging actual state toward desired state.
///
/// Pure and synchronous. Resources are grouped by key; a desired resource
/// carrying the soft-delete marker counts as absent from the desired set, and
/// its actual counterpart is deleted whatever the orphan policy says.
#[derive(Clone)]
pub struct ChangeComputer {
    key_mapper: Arc<dyn KeyMapper>,
    value_mapper: Arc<dyn ValueMapper>,
    value_field: String,
    delete_orphans: bool,
}

impl ChangeComputer {
    /// Keys by name, compares `spec`.
    pub fn new(delete_orphans: bool) -> Self {
        Self {
            key_mapper: Arc::new(NameKeyMapper),
            value_mapper: Arc::new(SpecValueMapper),
            value_field: "spec".to_string(),
            delete_orphans,
        }
    }

    /// Uses the mappers registered for a resource type.
    pub fn for_resource(descriptor: &ResourceDescriptor, delete_orphans: bool) -> Self {
        Self {
            key_mapper: Arc::clone(descriptor.key_mapper()),
            value_mapper: Arc::clone(descriptor.value_mapper()),
            value_field: descriptor.value_field().to_string(),
            delete_orphans,
        }
    }

    pub fn with_key_mapper(mut self, mapper: impl KeyMapper + 'static) -> Self {
        self.key_mapper = Arc::new(mapper);
        self
    }

    pub fn with_value_mapper(mut self, mapper: impl ValueMapper + 'static) -> Self {
        self.value_mapper = Arc::new(mapper);
        self
    }

    pub fn with_value_field(mut self, field: impl Into<String>) -> Self {
        self.value_field = field.into();
        self
    }

    pub fn delete_orphans(&self) -> bool {
        self.delete_orphans
    }

    /// One change per key. Duplicate keys on either side are an error.
    pub fn compute(
        &self,
        actual: &[Resource],
        desired: &[Resource],
    ) -> Result<Vec<ResourceChange>, ChangeError> {
        let actual_by_key = self.index(actual, "actual")?;
        let desired_by_key = self.index(desired, "desired")?;

        let mut changes = Vec::with_capacity(actual_by_key.len().max(desired_by_key.len()));

        for (key, wanted) in &desired_by_key {
            let current = actual_by_key.get(key);

            if wanted.is_marked_for_deletion() {
                // Marker wins over the orphan policy.
                match current {
                    Some(current) => changes.push(self.delete(current, wanted)?),
                    None => log::trace!("'{}' marked for deletion but absent; skipping", key),
                }
                continue;
            }

            let after = self.value_mapper.value(wanted);
            let before = current.map(|c| self.value_mapper.value(c));
            changes.push(ResourceChange::between(
                wanted.resource_type(),
                wanted.metadata.clone(),
                &self.value_field,
                before.as_ref(),
                Some(&after),
            )?);
        }

        for (key, current) in &actual_by_key {
            if desired_by_key.contains_key(key) {
                continue;
            }
            if self.delete_orphans {
                changes.push(self.delete(current, current)?);
            } else {
                log::trace!("Orphan '{}' kept (deleteOrphans disabled)", key);
            }
        }

        Ok(changes)
    }

    fn delete(&self, current: &Resource, source: &Resource) -> Result<ResourceChange, ChangeError> {
        let before = self.value_mapper.value(current);
        ResourceChange::between(
            current.resource_type(),
            source.metadata.clone(),
            &self.value_field,
            Some(&before),
            None,
        )
    }

    fn index<'a>(
        &self,
        resources: &'a [Resource],
        side: &'static str,
    ) -> Result<BTreeMap<String, &'a Resource>, ChangeError> {
        let mut by_key = BTreeMap::new();
        for resource in resources {
            let key = self.key_mapper.key(resource);
            if by_key.contains_key(&key) {
                return Err(ChangeError::DuplicateKey {
                    resource_type: resource.resource_type().to_string(),
                    key,
                    side,
                });
            }
            by_key.insert(key, resource);
        }
        Ok(by_key)
    }
}

impl std::fmt::Debug for ChangeComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeComputer")
            .field("value_field", &self.value_field)
            .field("delete_orphans", &self.delete_orphans)
            .finish()
    }
}
