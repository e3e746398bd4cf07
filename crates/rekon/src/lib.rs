//! Declarative resource reconciliation engine.
//!
//! Given a set of desired resources and a live snapshot of actual state, `rekon`
//! filters, validates and rewrites the desired set, computes the changes needed
//! to converge, applies them through pluggable handlers and reports outcomes.

pub mod change;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod extension;
pub mod model;
mod parallel;
pub mod reconciler;
pub mod reporter;
pub mod selector;
pub mod telemetry;
pub mod transform;
pub mod validation;

pub use change::{ChangeComputer, KeyMapper, ValueMapper};
pub use config::{Configuration, PropertyKind, PropertySpec, ReconciliationContext, ReconciliationMode};
pub use controller::Controller;
pub use error::{
    ChangeError, ConfigError, ControllerError, RegistryError, RekonError, ReporterError, Result,
    SelectorError,
};
pub use executor::{ChangeExecutor, ChangeHandler, PendingChange};
pub use extension::{
    AcceptedTypes, Extension, ExtensionCategory, ExtensionDecorator, ExtensionDescriptor,
    ExtensionProvider, ExtensionRegistry, ResourceDescriptor,
};
pub use model::{
    ChangeResult, ChangeStatus, ChangeSummary, ExecutionError, ObjectMeta, Operation, Resource,
    ResourceChange, ResourceRef, ResourceType, StateChange,
};
pub use reconciler::{ReconcileStage, ReconciliationOutcome, Reconciler};
pub use reporter::{Reporter, ReporterChain};
pub use selector::{AggregateSelector, ExpressionSelector, Selectable, Selector, SelectorMatchingStrategy};
pub use transform::{Transformation, TransformationChain};
pub use validation::{Validation, ValidationChain, ValidationError, ValidationException, ValidationResult};
