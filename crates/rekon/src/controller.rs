//! Read side of a managed system: fetches the actual state of a resource type.

use async_trait::async_trait;

use crate::config::Configuration;
use crate::error::ControllerError;
use crate::extension::Extension;
use crate::model::{Resource, ResourceType};

/// Fetches the resources that currently exist for a resource type.
///
/// Exactly one controller must accept each type taking part in a run; the
/// reconciler fetches all types concurrently.
#[async_trait]
pub trait Controller: Extension {
    async fn fetch(
        &self,
        resource_type: &ResourceType,
        config: &Configuration,
    ) -> Result<Vec<Resource>, ControllerError>;
}
