//! The reconciliation state machine.
//!
//! `LOAD → FILTER → VALIDATE → TRANSFORM → FETCH → COMPUTE → FILTER_CHANGES →
//! EXECUTE → REPORT → DONE`. Everything up to COMPUTE is all-or-nothing: an
//! error there aborts the run before any handler is called. From EXECUTE on,
//! failures are per change and the run always reaches DONE.

use futures_util::future;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::change::ChangeComputer;
use crate::config::ReconciliationContext;
use crate::error::Result;
use crate::executor::ChangeExecutor;
use crate::extension::ExtensionRegistry;
use crate::model::{ChangeResult, ChangeSummary, Resource, ResourceChange, ResourceRef, ResourceType};
use crate::reporter::ReporterChain;
use crate::selector::Selector;
use crate::transform::TransformationChain;
use crate::validation::ValidationChain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStage {
    Load,
    Filter,
    Validate,
    Transform,
    Fetch,
    Compute,
    FilterChanges,
    Execute,
    Report,
    Done,
}

impl std::fmt::Display for ReconcileStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReconcileStage::Load => "LOAD",
            ReconcileStage::Filter => "FILTER",
            ReconcileStage::Validate => "VALIDATE",
            ReconcileStage::Transform => "TRANSFORM",
            ReconcileStage::Fetch => "FETCH",
            ReconcileStage::Compute => "COMPUTE",
            ReconcileStage::FilterChanges => "FILTER_CHANGES",
            ReconcileStage::Execute => "EXECUTE",
            ReconcileStage::Report => "REPORT",
            ReconcileStage::Done => "DONE",
        };
        write!(f, "{}", name)
    }
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub run_id: String,
    pub dry_run: bool,
    /// One result per executed change, in change order.
    pub results: Vec<ChangeResult>,
    /// Stages the run went through, in order.
    pub stages: Vec<ReconcileStage>,
    pub reporter_failures: usize,
}

impl ReconciliationOutcome {
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary::from_results(&self.results)
    }

    pub fn is_success(&self) -> bool {
        !self.results.iter().any(ChangeResult::is_failed)
    }

    /// 0 when every change succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

pub struct Reconciler {
    registry: Arc<ExtensionRegistry>,
    validations: ValidationChain,
    transformations: TransformationChain,
    reporters: ReporterChain,
}

impl Reconciler {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self {
            validations: ValidationChain::new(Arc::clone(&registry)),
            transformations: TransformationChain::new(Arc::clone(&registry)),
            reporters: ReporterChain::new(Arc::clone(&registry)),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    /// Runs one reconciliation of `desired` against the live state.
    ///
    /// Validation and transformation run synchronously on scoped threads. On a
    /// multi-threaded runtime the calling worker hands its other tasks off
    /// while they run; on a current-thread runtime they block the runtime.
    pub async fn reconcile(
        &self,
        desired: Vec<Resource>,
        ctx: &ReconciliationContext,
    ) -> Result<ReconciliationOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "reconcile",
            run_id = %run_id,
            dry_run = ctx.dry_run,
            mode = %ctx.mode
        );
        self.run(run_id, desired, ctx).instrument(span).await
    }

    async fn run(
        &self,
        run_id: String,
        desired: Vec<Resource>,
        ctx: &ReconciliationContext,
    ) -> Result<ReconciliationOutcome> {
        let mut stages = vec![ReconcileStage::Load];
        info!("Reconciling {} desired resource(s)", desired.len());

        stages.push(ReconcileStage::Filter);
        let (desired, ignored) = {
            let _step = info_span!("filter").entered();
            self.filter(desired, ctx)
        };

        stages.push(ReconcileStage::Validate);
        {
            let _step = info_span!("validate").entered();
            self.validations.validate(&desired)?;
        }

        stages.push(ReconcileStage::Transform);
        let desired = {
            let _step = info_span!("transform").entered();
            self.transformations.transform(&desired)
        };

        stages.push(ReconcileStage::Fetch);
        let mut by_type: BTreeMap<ResourceType, Vec<Resource>> = ctx
            .resource_types
            .iter()
            .map(|rt| (rt.clone(), Vec::new()))
            .collect();
        for resource in desired {
            by_type
                .entry(resource.resource_type())
                .or_default()
                .push(resource);
        }
        let actual = self
            .fetch(by_type.keys(), ctx)
            .instrument(info_span!("fetch"))
            .await?;

        stages.push(ReconcileStage::Compute);
        let changes = {
            let _step = info_span!("compute").entered();
            self.compute(&by_type, actual, &ignored, ctx)?
        };

        stages.push(ReconcileStage::FilterChanges);
        let changes = self.filter_changes(changes, ctx);

        stages.push(ReconcileStage::Execute);
        let results = ChangeExecutor::new(Arc::clone(&self.registry))
            .with_max_concurrency(ctx.max_concurrency)
            .execute(changes, ctx.dry_run)
            .instrument(info_span!("execute"))
            .await;

        stages.push(ReconcileStage::Report);
        let reporter_failures = {
            let _step = info_span!("report").entered();
            self.reporters.report(&results)
        };
        if reporter_failures > 0 {
            warn!("{} reporter(s) failed", reporter_failures);
        }

        stages.push(ReconcileStage::Done);
        let outcome = ReconciliationOutcome {
            run_id,
            dry_run: ctx.dry_run,
            results,
            stages,
            reporter_failures,
        };
        info!("Reconciliation done: {}", outcome.summary());
        Ok(outcome)
    }

    /// Drops ignored and out-of-scope resources, remembering the ignored ones
    /// so their live counterparts are left alone too.
    fn filter(
        &self,
        desired: Vec<Resource>,
        ctx: &ReconciliationContext,
    ) -> (Vec<Resource>, BTreeSet<ResourceRef>) {
        let total = desired.len();
        let mut ignored = BTreeSet::new();
        let kept: Vec<Resource> = desired
            .into_iter()
            .filter(|r| {
                if r.is_ignored() {
                    ignored.insert(r.reference());
                    return false;
                }
                ctx.selector.matches(r)
            })
            .collect();
        debug!(
            "{} of {} resource(s) in scope ({} ignored)",
            kept.len(),
            total,
            ignored.len()
        );
        (kept, ignored)
    }

    /// Fetches every type concurrently. Controllers are resolved first so a
    /// wiring error surfaces before any external call.
    async fn fetch<'a>(
        &self,
        types: impl Iterator<Item = &'a ResourceType>,
        ctx: &ReconciliationContext,
    ) -> Result<BTreeMap<ResourceType, Vec<Resource>>> {
        let mut targets = Vec::new();
        for resource_type in types {
            let controller = self
                .registry
                .controllers()
                .lookup_one(resource_type, ctx.controller.as_deref())?;
            targets.push((resource_type, controller));
        }

        let fetched = future::join_all(targets.iter().map(|(rt, controller)| {
            debug!("Fetching {} via '{}'", rt, controller.name());
            controller.extension().fetch(rt, controller.config())
        }))
        .await;

        let mut actual = BTreeMap::new();
        for ((resource_type, _), resources) in targets.into_iter().zip(fetched) {
            let resources = resources?;
            debug!("Fetched {} {} resource(s)", resources.len(), resource_type);
            actual.insert(resource_type.clone(), resources);
        }
        Ok(actual)
    }

    fn compute(
        &self,
        desired: &BTreeMap<ResourceType, Vec<Resource>>,
        mut actual: BTreeMap<ResourceType, Vec<Resource>>,
        ignored: &BTreeSet<ResourceRef>,
        ctx: &ReconciliationContext,
    ) -> Result<Vec<ResourceChange>> {
        let mut changes = Vec::new();
        for (resource_type, wanted) in desired {
            let mut current = actual.remove(resource_type).unwrap_or_default();
            current.retain(|r| !r.is_ignored() && !ignored.contains(&r.reference()));

            let delete_orphans = ctx.delete_orphans_for(resource_type);
            let computer = match self.registry.resource(resource_type) {
                Some(descriptor) => ChangeComputer::for_resource(descriptor, delete_orphans),
                None => ChangeComputer::new(delete_orphans),
            };
            let computed = computer.compute(&current, wanted)?;
            debug!("{} change(s) computed for {}", computed.len(), resource_type);
            changes.extend(computed);
        }
        Ok(changes)
    }

    /// Re-applies the selector to each change and drops operations the mode
    /// does not allow.
    fn filter_changes(
        &self,
        changes: Vec<ResourceChange>,
        ctx: &ReconciliationContext,
    ) -> Vec<ResourceChange> {
        let total = changes.len();
        let kept: Vec<ResourceChange> = changes
            .into_iter()
            .filter(|c| ctx.selector.matches(c) && ctx.mode.allows(c.operation()))
            .collect();
        if kept.len() < total {
            debug!("{} change(s) filtered out", total - kept.len());
        }
        kept
    }
}
