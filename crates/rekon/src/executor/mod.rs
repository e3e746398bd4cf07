//! Applies computed changes through registered handlers.
//!
//! Changes are partitioned by resource type and operation, each partition is
//! handed to the first handler (by priority) supporting it, and the returned
//! futures are awaited together. A failing or panicking change never affects
//! its siblings.

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use log::{debug, error, warn};
use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::extension::{Extension, ExtensionRegistry};
use crate::model::{ChangeResult, ExecutionError, Operation, ResourceChange, ResourceType};

/// Error code for a change no registered handler supports.
pub const CODE_NO_HANDLER: &str = "NO_HANDLER";
/// Error code for a change the handler returned no pending result for.
pub const CODE_MISSING_RESULT: &str = "MISSING_RESULT";
/// Error code for a handler that panicked.
pub const CODE_PANIC: &str = "PANIC";

pub type ChangeFuture = BoxFuture<'static, Result<(), ExecutionError>>;

/// A change whose application has been scheduled but not yet awaited.
pub struct PendingChange {
    change: ResourceChange,
    future: ChangeFuture,
}

impl PendingChange {
    pub fn new<F>(change: ResourceChange, future: F) -> Self
    where
        F: Future<Output = Result<(), ExecutionError>> + Send + 'static,
    {
        Self {
            change,
            future: future.boxed(),
        }
    }

    /// A pending change that has already completed.
    pub fn ready(change: ResourceChange, result: Result<(), ExecutionError>) -> Self {
        Self::new(change, future::ready(result))
    }

    pub fn change(&self) -> &ResourceChange {
        &self.change
    }

    pub fn into_parts(self) -> (ResourceChange, ChangeFuture) {
        (self.change, self.future)
    }
}

impl std::fmt::Debug for PendingChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingChange")
            .field("change", &self.change.reference())
            .field("operation", &self.change.operation())
            .finish_non_exhaustive()
    }
}

/// Write side of a managed system.
pub trait ChangeHandler: Extension {
    fn supported_operations(&self) -> &[Operation];

    /// Schedules every change, returning one pending result per change.
    ///
    /// The returned futures should not block when created; the executor
    /// drives them concurrently.
    fn handle_changes(&self, changes: Vec<ResourceChange>) -> Vec<PendingChange>;

    fn describe(&self, change: &ResourceChange) -> String {
        describe_change(change)
    }
}

/// Default human-readable description of a change.
pub fn describe_change(change: &ResourceChange) -> String {
    format!(
        "{} {} '{}'",
        change.operation(),
        change.resource_type().kind,
        change.name()
    )
}

type Completed = BoxFuture<'static, (usize, ChangeResult)>;

pub struct ChangeExecutor {
    registry: Arc<ExtensionRegistry>,
    max_concurrency: Option<usize>,
}

impl ChangeExecutor {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self {
            registry,
            max_concurrency: None,
        }
    }

    /// Caps the number of changes awaited at once. `None` or zero is unbounded.
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency.filter(|n| *n > 0);
        self
    }

    /// Executes `changes`, returning one result per change in input order.
    ///
    /// In dry-run mode no handler is consulted at all: effective changes are
    /// reported as CHANGED and NONE changes as OK.
    pub async fn execute(&self, changes: Vec<ResourceChange>, dry_run: bool) -> Vec<ChangeResult> {
        let mut results: Vec<Option<ChangeResult>> = (0..changes.len()).map(|_| None).collect();
        let mut partitions: BTreeMap<(ResourceType, Operation), Vec<(usize, ResourceChange)>> =
            BTreeMap::new();

        for (index, change) in changes.into_iter().enumerate() {
            let description = describe_change(&change);
            if change.operation() == Operation::None {
                results[index] = Some(ChangeResult::ok(change).with_description(description));
            } else if dry_run {
                results[index] = Some(ChangeResult::changed(change).with_description(description));
            } else {
                partitions
                    .entry((change.resource_type().clone(), change.operation()))
                    .or_default()
                    .push((index, change));
            }
        }

        let mut tasks: Vec<Completed> = Vec::new();
        for ((resource_type, operation), entries) in partitions {
            self.dispatch(&resource_type, operation, entries, &mut results, &mut tasks);
        }

        debug!("Awaiting {} pending change(s)", tasks.len());
        let completed: Vec<(usize, ChangeResult)> = match self.max_concurrency {
            Some(limit) => stream::iter(tasks).buffer_unordered(limit).collect().await,
            None => future::join_all(tasks).await,
        };
        for (index, result) in completed {
            if let Some(error) = result.errors.first() {
                warn!("{} failed: {}", result.change.reference(), error);
            }
            results[index] = Some(result);
        }

        results.into_iter().flatten().collect()
    }

    fn dispatch(
        &self,
        resource_type: &ResourceType,
        operation: Operation,
        entries: Vec<(usize, ResourceChange)>,
        results: &mut [Option<ChangeResult>],
        tasks: &mut Vec<Completed>,
    ) {
        let Some(registered) = self
            .registry
            .handlers_for(resource_type, operation)
            .into_iter()
            .next()
        else {
            warn!(
                "No handler supports {} for {}; failing {} change(s)",
                operation,
                resource_type,
                entries.len()
            );
            for (index, change) in entries {
                let error = ExecutionError::new(format!(
                    "No handler supports {} for {}",
                    operation, resource_type
                ))
                .with_code(CODE_NO_HANDLER);
                results[index] = Some(ChangeResult::failed(change, error));
            }
            return;
        };

        let handler_name = registered.name().to_string();
        let handler = Arc::clone(registered.extension());
        debug!(
            "Dispatching {} {} change(s) for {} to '{}'",
            entries.len(),
            operation,
            resource_type,
            handler_name
        );

        let batch: Vec<ResourceChange> = entries.iter().map(|(_, c)| c.clone()).collect();
        let scheduled = panic::catch_unwind(AssertUnwindSafe(|| {
            let descriptions: Vec<String> = batch.iter().map(|c| handler.describe(c)).collect();
            (descriptions, handler.handle_changes(batch))
        }));
        let (descriptions, pending) = match scheduled {
            Ok(scheduled) => scheduled,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Handler '{}' panicked: {}", handler_name, message);
                for (index, change) in entries {
                    let error = ExecutionError::new(message.clone()).with_code(CODE_PANIC);
                    results[index] = Some(ChangeResult::failed(change, error));
                }
                return;
            }
        };

        let mut slots: Vec<Option<(usize, ResourceChange, String)>> = entries
            .into_iter()
            .zip(descriptions)
            .map(|((index, change), description)| Some((index, change, description)))
            .collect();

        for pending in pending {
            let (change, future) = pending.into_parts();
            let reference = change.reference();
            let slot = slots
                .iter_mut()
                .find(|s| matches!(s, Some((_, c, _)) if c.reference() == reference));
            match slot.and_then(Option::take) {
                Some((index, original, description)) => {
                    tasks.push(run_pending(index, original, description, future));
                }
                None => warn!(
                    "Handler '{}' returned a result for unknown change {}",
                    handler_name, reference
                ),
            }
        }

        for (index, change, description) in slots.into_iter().flatten() {
            let error = ExecutionError::new(format!(
                "Handler '{}' returned no result for this change",
                handler_name
            ))
            .with_code(CODE_MISSING_RESULT);
            results[index] = Some(ChangeResult::failed(change, error).with_description(description));
        }
    }
}

fn run_pending(
    index: usize,
    change: ResourceChange,
    description: String,
    future: ChangeFuture,
) -> Completed {
    async move {
        let result = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => ChangeResult::changed(change),
            Ok(Err(error)) => ChangeResult::failed(change, error),
            Err(payload) => ChangeResult::failed(
                change,
                ExecutionError::new(panic_message(payload.as_ref())).with_code(CODE_PANIC),
            ),
        };
        (index, result.with_description(description))
    }
    .boxed()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeStatus, ObjectMeta};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn topic_type() -> ResourceType {
        ResourceType::new("kafka.rekon.io", "v1", "Topic")
    }

    fn create(name: &str) -> ResourceChange {
        ResourceChange::between(
            topic_type(),
            ObjectMeta::new(name),
            "spec",
            None,
            Some(&json!({"partitions": 1})),
        )
        .unwrap()
    }

    fn unchanged(name: &str) -> ResourceChange {
        let spec = json!({"partitions": 1});
        ResourceChange::between(topic_type(), ObjectMeta::new(name), "spec", Some(&spec), Some(&spec))
            .unwrap()
    }

    /// Fails changes named "bad", panics on "boom", sleeps briefly otherwise.
    struct TopicHandler {
        calls: Arc<Mutex<Vec<String>>>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl TopicHandler {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Extension for TopicHandler {
        fn name(&self) -> &str {
            "topics"
        }
    }

    impl ChangeHandler for TopicHandler {
        fn supported_operations(&self) -> &[Operation] {
            &[Operation::Create, Operation::Update, Operation::Delete]
        }

        fn handle_changes(&self, changes: Vec<ResourceChange>) -> Vec<PendingChange> {
            changes
                .into_iter()
                .map(|change| {
                    self.calls.lock().unwrap().push(change.name().to_string());
                    let name = change.name().to_string();
                    let in_flight = Arc::clone(&self.in_flight);
                    let peak = Arc::clone(&self.peak);
                    PendingChange::new(change, async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        match name.as_str() {
                            "bad" => Err(ExecutionError::new("broker rejected").with_code("E42")),
                            "boom" => panic!("handler exploded"),
                            _ => Ok(()),
                        }
                    })
                })
                .collect()
        }
    }

    fn executor_with(handler: TopicHandler) -> ChangeExecutor {
        let mut registry = ExtensionRegistry::new();
        registry.register_handler(handler).unwrap();
        ChangeExecutor::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let executor = executor_with(TopicHandler::new());
        let results = executor
            .execute(vec![create("a"), create("bad"), create("c")], false)
            .await;

        let statuses: Vec<ChangeStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ChangeStatus::Changed, ChangeStatus::Failed, ChangeStatus::Changed]
        );
        assert_eq!(results[1].errors[0].code, "E42");
        assert_eq!(results[1].description.as_deref(), Some("CREATE Topic 'bad'"));
    }

    #[tokio::test]
    async fn test_panicking_future_is_captured() {
        let executor = executor_with(TopicHandler::new());
        let results = executor.execute(vec![create("boom"), create("ok")], false).await;
        assert_eq!(results[0].errors[0].code, CODE_PANIC);
        assert_eq!(results[0].errors[0].message, "handler exploded");
        assert_eq!(results[1].status, ChangeStatus::Changed);
    }

    #[tokio::test]
    async fn test_dry_run_never_calls_handlers() {
        let handler = TopicHandler::new();
        let calls = Arc::clone(&handler.calls);
        let executor = executor_with(handler);

        let results = executor
            .execute(vec![create("a"), unchanged("b"), create("c")], true)
            .await;

        assert!(calls.lock().unwrap().is_empty());
        let statuses: Vec<ChangeStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ChangeStatus::Changed, ChangeStatus::Ok, ChangeStatus::Changed]
        );
    }

    #[tokio::test]
    async fn test_none_changes_are_not_dispatched() {
        let handler = TopicHandler::new();
        let calls = Arc::clone(&handler.calls);
        let executor = executor_with(handler);

        let results = executor.execute(vec![unchanged("a"), create("b")], false).await;

        assert_eq!(*calls.lock().unwrap(), vec!["b"]);
        assert_eq!(results[0].status, ChangeStatus::Ok);
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let executor = ChangeExecutor::new(Arc::new(ExtensionRegistry::new()));
        let results = executor.execute(vec![create("a")], false).await;
        assert_eq!(results[0].errors[0].code, CODE_NO_HANDLER);
    }

    #[tokio::test]
    async fn test_bounded_concurrency() {
        let handler = TopicHandler::new();
        let peak = Arc::clone(&handler.peak);
        let executor = executor_with(handler).with_max_concurrency(Some(2));

        let changes: Vec<ResourceChange> = (0..8).map(|i| create(&format!("t{}", i))).collect();
        let results = executor.execute(changes, false).await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        let names: Vec<&str> = results.iter().map(|r| r.change.name()).collect();
        assert_eq!(names, vec!["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"]);
    }

    struct ForgetfulHandler;

    impl Extension for ForgetfulHandler {
        fn name(&self) -> &str {
            "forgetful"
        }
    }

    impl ChangeHandler for ForgetfulHandler {
        fn supported_operations(&self) -> &[Operation] {
            &[Operation::Create]
        }

        fn handle_changes(&self, changes: Vec<ResourceChange>) -> Vec<PendingChange> {
            changes
                .into_iter()
                .take(1)
                .map(|c| PendingChange::ready(c, Ok(())))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_missing_pending_result() {
        let mut registry = ExtensionRegistry::new();
        registry.register_handler(ForgetfulHandler).unwrap();
        let executor = ChangeExecutor::new(Arc::new(registry));

        let results = executor.execute(vec![create("a"), create("b")], false).await;

        assert_eq!(results[0].status, ChangeStatus::Changed);
        assert_eq!(results[1].errors[0].code, CODE_MISSING_RESULT);
    }
}
