//! Per-run reconciliation options.

use serde_json::json;
use std::collections::BTreeMap;

use super::properties::{Configuration, PropertyKind, PropertySpec};
use crate::error::{ConfigError, Result};
use crate::model::{Operation, ResourceType};
use crate::selector::{AggregateSelector, SelectorMatchingStrategy};

/// Restricts which computed operations a run may execute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconciliationMode {
    /// Only create missing resources.
    Create,
    /// Create missing resources and update drifted ones.
    Update,
    /// Only delete resources.
    Delete,
    #[default]
    Full,
}

impl ReconciliationMode {
    /// `NONE` is always allowed so that unchanged resources are still reported.
    pub fn allows(&self, operation: Operation) -> bool {
        match (self, operation) {
            (_, Operation::None) => true,
            (ReconciliationMode::Full, _) => true,
            (ReconciliationMode::Create, Operation::Create) => true,
            (ReconciliationMode::Update, Operation::Create | Operation::Update) => true,
            (ReconciliationMode::Delete, Operation::Delete) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ReconciliationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconciliationMode::Create => write!(f, "CREATE"),
            ReconciliationMode::Update => write!(f, "UPDATE"),
            ReconciliationMode::Delete => write!(f, "DELETE"),
            ReconciliationMode::Full => write!(f, "FULL"),
        }
    }
}

impl std::str::FromStr for ReconciliationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(ReconciliationMode::Create),
            "update" => Ok(ReconciliationMode::Update),
            "delete" => Ok(ReconciliationMode::Delete),
            "full" => Ok(ReconciliationMode::Full),
            _ => Err(format!("Unknown reconciliation mode: {}", s)),
        }
    }
}

/// Options for one reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationContext {
    pub dry_run: bool,
    pub delete_orphans: bool,
    /// Per-kind overrides of `delete_orphans`.
    pub delete_orphans_by_kind: BTreeMap<String, bool>,
    pub mode: ReconciliationMode,
    pub selector: AggregateSelector,
    /// Upper bound on concurrently running handler calls; `None` is unbounded.
    pub max_concurrency: Option<usize>,
    /// Types reconciled even when the desired set holds none of them.
    pub resource_types: Vec<ResourceType>,
    /// Picks a controller by name when several accept a type.
    pub controller: Option<String>,
}

impl ReconciliationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties understood by [`ReconciliationContext::from_configuration`].
    pub fn properties() -> Vec<PropertySpec> {
        vec![
            PropertySpec::new("dryRun", PropertyKind::Bool)
                .default_value(json!(false))
                .description("Compute and report changes without applying them"),
            PropertySpec::new("deleteOrphans", PropertyKind::Bool)
                .default_value(json!(false))
                .description("Delete actual resources with no desired counterpart"),
            PropertySpec::new("deleteOrphansByKind", PropertyKind::Map),
            PropertySpec::new("selectors", PropertyKind::List),
            PropertySpec::new("selectorMatchingStrategy", PropertyKind::String)
                .default_value(json!("ALL")),
            PropertySpec::new("mode", PropertyKind::String).default_value(json!("FULL")),
            PropertySpec::new("executor.maxConcurrency", PropertyKind::Integer),
            PropertySpec::new("resourceTypes", PropertyKind::List),
            PropertySpec::new("controller", PropertyKind::String),
        ]
    }

    /// Reads the run options from a configuration tree.
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        let config = config.resolve(&Self::properties())?;

        let mode = config
            .get_str("mode")?
            .unwrap_or("FULL")
            .parse::<ReconciliationMode>()
            .map_err(|reason| ConfigError::InvalidValue {
                name: "mode".to_string(),
                reason,
            })?;

        let strategy = config
            .get_str("selectorMatchingStrategy")?
            .unwrap_or("ALL")
            .parse::<SelectorMatchingStrategy>()?;
        let selector = AggregateSelector::parse(&config.get_string_list("selectors")?, strategy)?;

        let max_concurrency = match config.get_i64("executor.maxConcurrency")? {
            None => None,
            Some(n) if n > 0 => Some(n as usize),
            Some(n) => {
                return Err(ConfigError::InvalidValue {
                    name: "executor.maxConcurrency".to_string(),
                    reason: format!("must be greater than 0, got {}", n),
                }
                .into())
            }
        };

        let mut delete_orphans_by_kind = BTreeMap::new();
        for (kind, value) in config.get_string_map("deleteOrphansByKind")? {
            let flag = value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                name: format!("deleteOrphansByKind.{}", kind),
                reason: format!("expected true or false, got '{}'", value),
            })?;
            delete_orphans_by_kind.insert(kind, flag);
        }

        let resource_types = config
            .get_string_list("resourceTypes")?
            .into_iter()
            .map(|s| {
                s.parse::<ResourceType>()
                    .map_err(|reason| ConfigError::InvalidValue {
                        name: "resourceTypes".to_string(),
                        reason,
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            dry_run: config.get_bool_or("dryRun", false)?,
            delete_orphans: config.get_bool_or("deleteOrphans", false)?,
            delete_orphans_by_kind,
            mode,
            selector,
            max_concurrency,
            resource_types,
            controller: config.get_str("controller")?.map(str::to_string),
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_delete_orphans(mut self, delete_orphans: bool) -> Self {
        self.delete_orphans = delete_orphans;
        self
    }

    pub fn with_mode(mut self, mode: ReconciliationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_selector(mut self, selector: AggregateSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max.max(1));
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_types.push(resource_type);
        self
    }

    /// Orphan policy for a type, honoring per-kind overrides.
    pub fn delete_orphans_for(&self, resource_type: &ResourceType) -> bool {
        self.delete_orphans_by_kind
            .get(&resource_type.kind)
            .copied()
            .unwrap_or(self.delete_orphans)
    }
}
