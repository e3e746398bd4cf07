use log::{info, warn};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use super::Reporter;
use crate::config::Configuration;
use crate::error::ReporterError;
use crate::extension::Extension;
use crate::model::{ChangeResult, ChangeStatus, ChangeSummary};

/// Logs one line per effective change and a closing summary.
pub struct LoggingReporter;

impl LoggingReporter {
    pub const NAME: &'static str = "LoggingReporter";
}

impl Extension for LoggingReporter {
    fn name(&self) -> &str {
        Self::NAME
    }
}

impl Reporter for LoggingReporter {
    fn report(&self, results: &[ChangeResult], _config: &Configuration) -> Result<(), ReporterError> {
        for result in results {
            let label = result
                .description
                .clone()
                .unwrap_or_else(|| result.change.reference().to_string());
            match result.status {
                ChangeStatus::Failed => {
                    let errors: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
                    warn!("FAILED {}: {}", label, errors.join("; "));
                }
                ChangeStatus::Changed => info!("CHANGED {}", label),
                ChangeStatus::Ok => log::debug!("OK {}", label),
            }
        }
        info!("Reconciliation summary: {}", ChangeSummary::from_results(results));
        Ok(())
    }
}

/// Writes every result as one JSON object per line.
pub struct JsonLinesReporter {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesReporter {
    pub const NAME: &'static str = "JsonLinesReporter";

    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Appends to the file at `path`, creating it if needed.
    pub fn to_file(path: impl AsRef<Path>) -> Result<Self, ReporterError> {
        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl Extension for JsonLinesReporter {
    fn name(&self) -> &str {
        Self::NAME
    }
}

impl Reporter for JsonLinesReporter {
    fn report(&self, results: &[ChangeResult], _config: &Configuration) -> Result<(), ReporterError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ReporterError::Failed("writer lock poisoned".to_string()))?;
        for result in results {
            serde_json::to_writer(&mut *writer, result)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionError, ObjectMeta, ResourceChange, ResourceType};
    use serde_json::{json, Value};

    fn results() -> Vec<ChangeResult> {
        let rt = ResourceType::new("kafka.rekon.io", "v1", "Topic");
        let create = ResourceChange::between(
            rt.clone(),
            ObjectMeta::new("orders"),
            "spec",
            None,
            Some(&json!({"partitions": 3})),
        )
        .unwrap();
        let delete = ResourceChange::between(
            rt,
            ObjectMeta::new("legacy"),
            "spec",
            Some(&json!({"partitions": 1})),
            None,
        )
        .unwrap();
        vec![
            ChangeResult::changed(create),
            ChangeResult::failed(delete, ExecutionError::new("denied").with_code("AUTH")),
        ]
    }

    #[test]
    fn test_json_lines_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");

        let reporter = JsonLinesReporter::to_file(&path).unwrap();
        reporter.report(&results(), &Configuration::empty()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["status"], "CHANGED");
        assert_eq!(lines[0]["change"]["operation"], "CREATE");
        assert_eq!(lines[1]["status"], "FAILED");
        assert_eq!(lines[1]["errors"][0]["code"], "AUTH");
    }

    #[test]
    fn test_logging_reporter_never_fails() {
        assert!(LoggingReporter
            .report(&results(), &Configuration::empty())
            .is_ok());
    }
}
