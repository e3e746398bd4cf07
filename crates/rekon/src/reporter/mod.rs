//! Reporter chain: best-effort delivery of execution results.

pub mod builtin;

use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::Configuration;
use crate::error::ReporterError;
use crate::extension::{Extension, ExtensionRegistry};
use crate::model::ChangeResult;

pub use builtin::{JsonLinesReporter, LoggingReporter};

/// Receives the full result set once execution has finished.
pub trait Reporter: Extension {
    fn report(&self, results: &[ChangeResult], config: &Configuration) -> Result<(), ReporterError>;
}

/// Hands results to every reporter, by ascending priority.
///
/// A reporter that errors or panics is logged and skipped; it never affects
/// its siblings or the outcome of the run.
pub struct ReporterChain {
    registry: Arc<ExtensionRegistry>,
}

impl ReporterChain {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the number of reporters that failed.
    pub fn report(&self, results: &[ChangeResult]) -> usize {
        let mut failures = 0;
        for registered in self.registry.reporters().all() {
            let reporter = registered.extension();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                reporter.report(results, registered.config())
            }));
            match outcome {
                Ok(Ok(())) => debug!("Reporter '{}' done", registered.name()),
                Ok(Err(e)) => {
                    error!("Reporter '{}' failed: {}", registered.name(), e);
                    failures += 1;
                }
                Err(_) => {
                    error!("Reporter '{}' panicked", registered.name());
                    failures += 1;
                }
            }
        }
        failures
    }
}
