//! Recording fakes for the extension traits.

#![allow(dead_code)]

use async_trait::async_trait;
use rekon::config::Configuration;
use rekon::error::{ControllerError, ReporterError};
use rekon::executor::{ChangeHandler, PendingChange};
use rekon::extension::{AcceptedTypes, Extension};
use rekon::model::{
    ChangeResult, ExecutionError, Operation, Resource, ResourceChange, ResourceType,
};
use rekon::validation::{Validation, ValidationError, ValidationResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Serves a fixed actual state and counts fetches.
pub struct StaticController {
    resources: Vec<Resource>,
    pub fetches: Arc<AtomicUsize>,
}

impl StaticController {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Extension for StaticController {
    fn name(&self) -> &str {
        "static"
    }
}

#[async_trait]
impl rekon::controller::Controller for StaticController {
    async fn fetch(
        &self,
        resource_type: &ResourceType,
        _config: &Configuration,
    ) -> Result<Vec<Resource>, ControllerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .resources
            .iter()
            .filter(|r| r.resource_type() == *resource_type)
            .cloned()
            .collect())
    }
}

/// A controller whose backend is down.
pub struct UnavailableController;

impl Extension for UnavailableController {
    fn name(&self) -> &str {
        "unavailable"
    }
}

#[async_trait]
impl rekon::controller::Controller for UnavailableController {
    async fn fetch(
        &self,
        resource_type: &ResourceType,
        _config: &Configuration,
    ) -> Result<Vec<Resource>, ControllerError> {
        Err(ControllerError::Fetch {
            resource_type: resource_type.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

pub type Calls = Arc<Mutex<Vec<(Operation, String)>>>;

/// Records every scheduled change. Changes whose name is listed in
/// `failing` complete with an error.
pub struct RecordingHandler {
    operations: Vec<Operation>,
    pub calls: Calls,
    failing: Vec<String>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self {
            operations: vec![Operation::Create, Operation::Update, Operation::Delete],
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Vec::new(),
        }
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn operations(mut self, operations: &[Operation]) -> Self {
        self.operations = operations.to_vec();
        self
    }
}

impl Extension for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }
}

impl ChangeHandler for RecordingHandler {
    fn supported_operations(&self) -> &[Operation] {
        &self.operations
    }

    fn handle_changes(&self, changes: Vec<ResourceChange>) -> Vec<PendingChange> {
        changes
            .into_iter()
            .map(|change| {
                self.calls
                    .lock()
                    .unwrap()
                    .push((change.operation(), change.name().to_string()));
                let fails = self.failing.iter().any(|n| n == change.name());
                PendingChange::new(change, async move {
                    tokio::task::yield_now().await;
                    if fails {
                        Err(ExecutionError::new("backend rejected change").with_code("REJECTED"))
                    } else {
                        Ok(())
                    }
                })
            })
            .collect()
    }
}

/// Counts invocations and rejects resources whose name is listed.
pub struct CountingValidation {
    pub calls: Arc<AtomicUsize>,
    rejected: Vec<String>,
    accepted: AcceptedTypes,
}

impl CountingValidation {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            rejected: Vec::new(),
            accepted: AcceptedTypes::Any,
        }
    }

    pub fn rejecting(mut self, name: &str) -> Self {
        self.rejected.push(name.to_string());
        self
    }
}

impl Extension for CountingValidation {
    fn name(&self) -> &str {
        "counting"
    }

    fn accepts(&self, resource_type: &ResourceType) -> bool {
        self.accepted.accepts(resource_type)
    }
}

impl Validation for CountingValidation {
    fn validate(&self, resource: &Resource, _config: &Configuration) -> ValidationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.iter().any(|n| n == resource.name()) {
            ValidationResult::failure(ValidationError::new("counting", resource, "rejected by test"))
        } else {
            ValidationResult::Success
        }
    }
}

/// Keeps a copy of every result set it receives.
pub struct RecordingReporter {
    pub received: Arc<Mutex<Vec<Vec<ChangeResult>>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Extension for RecordingReporter {
    fn name(&self) -> &str {
        "recording-reporter"
    }

    fn priority(&self) -> i32 {
        100
    }
}

impl rekon::reporter::Reporter for RecordingReporter {
    fn report(&self, results: &[ChangeResult], _config: &Configuration) -> Result<(), ReporterError> {
        self.received.lock().unwrap().push(results.to_vec());
        Ok(())
    }
}

pub struct BrokenReporter;

impl Extension for BrokenReporter {
    fn name(&self) -> &str {
        "broken-reporter"
    }
}

impl rekon::reporter::Reporter for BrokenReporter {
    fn report(&self, _results: &[ChangeResult], _config: &Configuration) -> Result<(), ReporterError> {
        Err(ReporterError::Failed("disk full".to_string()))
    }
}
