//! Catalog of resource types and the extensions willing to handle them.
//!
//! The registry is filled once at startup (registration is the only mutation
//! path) and then shared read-only, usually behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Extension, ExtensionCategory, ExtensionDescriptor, ResourceDescriptor};
use crate::config::Configuration;
use crate::controller::Controller;
use crate::error::{RegistryError, Result};
use crate::executor::ChangeHandler;
use crate::model::{Operation, ResourceType};
use crate::reporter::Reporter;
use crate::transform::Transformation;
use crate::validation::Validation;

/// Registers resource types and extensions at startup.
pub trait ExtensionProvider {
    fn name(&self) -> &str;

    fn register(&self, registry: &mut ExtensionRegistry) -> Result<()>;
}

/// An extension together with its descriptor and resolved configuration.
pub struct Registered<T: ?Sized> {
    extension: Arc<T>,
    descriptor: ExtensionDescriptor,
    config: Configuration,
}

impl<T: ?Sized> Registered<T> {
    pub fn extension(&self) -> &Arc<T> {
        &self.extension
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn priority(&self) -> i32 {
        self.descriptor.priority
    }

    /// Configuration resolved against the extension's declared properties.
    pub fn config(&self) -> &Configuration {
        &self.config
    }
}

impl<T: ?Sized> Clone for Registered<T> {
    fn clone(&self) -> Self {
        Self {
            extension: Arc::clone(&self.extension),
            descriptor: self.descriptor.clone(),
            config: self.config.clone(),
        }
    }
}

/// Extensions of one category, kept in registration order.
pub struct ExtensionCatalog<T: ?Sized> {
    category: ExtensionCategory,
    entries: Vec<Registered<T>>,
}

impl<T: Extension + ?Sized> ExtensionCatalog<T> {
    fn new(category: ExtensionCategory) -> Self {
        Self {
            category,
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, extension: Arc<T>, config: &Configuration) -> Result<()> {
        let name = extension.name().to_string();
        if self.entries.iter().any(|e| e.name() == name) {
            return Err(RegistryError::ConflictingDefinition {
                category: self.category.to_string(),
                name,
            }
            .into());
        }

        let properties = extension.properties();
        let config = config.resolve(&properties)?;
        extension.configure(&config)?;
        let descriptor = ExtensionDescriptor {
            name,
            category: self.category,
            priority: extension.priority(),
            properties,
        };

        log::debug!(
            "Registered {} '{}' (priority {})",
            self.category,
            descriptor.name,
            descriptor.priority
        );
        self.entries.push(Registered {
            extension,
            descriptor,
            config,
        });
        Ok(())
    }

    pub fn category(&self) -> ExtensionCategory {
        self.category
    }

    /// Extensions accepting `resource_type`, by ascending priority.
    pub fn lookup(&self, resource_type: &ResourceType) -> Vec<&Registered<T>> {
        let mut matches: Vec<&Registered<T>> = self
            .entries
            .iter()
            .filter(|e| e.extension.accepts(resource_type))
            .collect();
        // Stable: equal priorities keep registration order.
        matches.sort_by_key(|e| e.priority());
        matches
    }

    /// The single extension accepting `resource_type`, optionally picked by name.
    pub fn lookup_one(
        &self,
        resource_type: &ResourceType,
        name: Option<&str>,
    ) -> std::result::Result<&Registered<T>, RegistryError> {
        let mut candidates = self.lookup(resource_type);
        if let Some(name) = name {
            candidates.retain(|e| e.name() == name);
        }

        match candidates.len() {
            0 => Err(RegistryError::NoSuchExtension {
                category: self.category.to_string(),
                resource_type: resource_type.to_string(),
            }),
            1 => Ok(candidates[0]),
            _ => Err(RegistryError::NoUniqueExtension {
                category: self.category.to_string(),
                resource_type: resource_type.to_string(),
                candidates: candidates.iter().map(|e| e.name().to_string()).collect(),
            }),
        }
    }

    /// Every registered extension, by ascending priority.
    pub fn all(&self) -> Vec<&Registered<T>> {
        let mut all: Vec<&Registered<T>> = self.entries.iter().collect();
        all.sort_by_key(|e| e.priority());
        all
    }

    pub fn get(&self, name: &str) -> Option<&Registered<T>> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn descriptors(&self) -> impl Iterator<Item = &ExtensionDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }
}

pub struct ExtensionRegistry {
    resources: BTreeMap<ResourceType, ResourceDescriptor>,
    validations: ExtensionCatalog<dyn Validation>,
    transformations: ExtensionCatalog<dyn Transformation>,
    controllers: ExtensionCatalog<dyn Controller>,
    reporters: ExtensionCatalog<dyn Reporter>,
    handlers: ExtensionCatalog<dyn ChangeHandler>,
    providers: Vec<String>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            resources: BTreeMap::new(),
            validations: ExtensionCatalog::new(ExtensionCategory::Validation),
            transformations: ExtensionCatalog::new(ExtensionCategory::Transformation),
            controllers: ExtensionCatalog::new(ExtensionCategory::Controller),
            reporters: ExtensionCatalog::new(ExtensionCategory::Reporter),
            handlers: ExtensionCatalog::new(ExtensionCategory::ChangeHandler),
            providers: Vec::new(),
        }
    }

    /// Runs a provider's registrations. Each provider may be installed once.
    pub fn install(&mut self, provider: &dyn ExtensionProvider) -> Result<()> {
        let name = provider.name().to_string();
        if self.providers.contains(&name) {
            return Err(RegistryError::ConflictingDefinition {
                category: "ExtensionProvider".to_string(),
                name,
            }
            .into());
        }
        provider.register(self)?;
        log::info!("Installed extension provider '{}'", name);
        self.providers.push(name);
        Ok(())
    }

    /// Builder-style [`ExtensionRegistry::install`].
    pub fn with_provider(mut self, provider: &dyn ExtensionProvider) -> Result<Self> {
        self.install(provider)?;
        Ok(self)
    }

    pub fn register_resource(&mut self, descriptor: ResourceDescriptor) -> Result<()> {
        let resource_type = descriptor.resource_type().clone();
        if self.resources.contains_key(&resource_type) {
            return Err(RegistryError::ConflictingDefinition {
                category: "ResourceType".to_string(),
                name: resource_type.to_string(),
            }
            .into());
        }
        log::debug!("Registered resource type '{}'", resource_type);
        self.resources.insert(resource_type, descriptor);
        Ok(())
    }

    pub fn register_validation(&mut self, validation: impl Validation + 'static) -> Result<()> {
        self.register_validation_with(validation, &Configuration::empty())
    }

    pub fn register_validation_with(
        &mut self,
        validation: impl Validation + 'static,
        config: &Configuration,
    ) -> Result<()> {
        self.validations.insert(Arc::new(validation), config)
    }

    pub fn register_transformation(
        &mut self,
        transformation: impl Transformation + 'static,
    ) -> Result<()> {
        self.register_transformation_with(transformation, &Configuration::empty())
    }

    pub fn register_transformation_with(
        &mut self,
        transformation: impl Transformation + 'static,
        config: &Configuration,
    ) -> Result<()> {
        self.transformations.insert(Arc::new(transformation), config)
    }

    pub fn register_controller(&mut self, controller: impl Controller + 'static) -> Result<()> {
        self.register_controller_with(controller, &Configuration::empty())
    }

    pub fn register_controller_with(
        &mut self,
        controller: impl Controller + 'static,
        config: &Configuration,
    ) -> Result<()> {
        self.controllers.insert(Arc::new(controller), config)
    }

    pub fn register_reporter(&mut self, reporter: impl Reporter + 'static) -> Result<()> {
        self.register_reporter_with(reporter, &Configuration::empty())
    }

    pub fn register_reporter_with(
        &mut self,
        reporter: impl Reporter + 'static,
        config: &Configuration,
    ) -> Result<()> {
        self.reporters.insert(Arc::new(reporter), config)
    }

    pub fn register_handler(&mut self, handler: impl ChangeHandler + 'static) -> Result<()> {
        self.register_handler_with(handler, &Configuration::empty())
    }

    pub fn register_handler_with(
        &mut self,
        handler: impl ChangeHandler + 'static,
        config: &Configuration,
    ) -> Result<()> {
        self.handlers.insert(Arc::new(handler), config)
    }

    pub fn resource(&self, resource_type: &ResourceType) -> Option<&ResourceDescriptor> {
        self.resources.get(resource_type)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.resources.keys()
    }

    pub fn validations(&self) -> &ExtensionCatalog<dyn Validation> {
        &self.validations
    }

    pub fn transformations(&self) -> &ExtensionCatalog<dyn Transformation> {
        &self.transformations
    }

    pub fn controllers(&self) -> &ExtensionCatalog<dyn Controller> {
        &self.controllers
    }

    pub fn reporters(&self) -> &ExtensionCatalog<dyn Reporter> {
        &self.reporters
    }

    pub fn handlers(&self) -> &ExtensionCatalog<dyn ChangeHandler> {
        &self.handlers
    }

    /// Handlers accepting `resource_type` that declare support for `operation`.
    pub fn handlers_for(
        &self,
        resource_type: &ResourceType,
        operation: Operation,
    ) -> Vec<&Registered<dyn ChangeHandler>> {
        self.handlers
            .lookup(resource_type)
            .into_iter()
            .filter(|h| h.extension().supported_operations().contains(&operation))
            .collect()
    }

    /// Descriptors of every registered extension, grouped by category.
    pub fn descriptors(&self) -> Vec<ExtensionDescriptor> {
        self.validations
            .descriptors()
            .chain(self.transformations.descriptors())
            .chain(self.controllers.descriptors())
            .chain(self.reporters.descriptors())
            .chain(self.handlers.descriptors())
            .cloned()
            .collect()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
