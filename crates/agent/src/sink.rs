use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use overseer_core::errors::ReportSinkError;
use overseer_core::report::{ReportRecord, ReportSink};

/// Appends flagged events to a markdown-ish report file, one pretty-printed
/// JSON block per record separated by `---` rules. The file is opened per
/// append so concurrent probes and external tails never hold it open.
#[derive(Clone, Debug)]
pub struct FileReportSink {
    path: PathBuf,
}

impl FileReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ReportSink for FileReportSink {
    fn append(&self, record: &ReportRecord) -> Result<(), ReportSinkError> {
        let body = serde_json::to_string_pretty(record)
            .map_err(|err| ReportSinkError(err.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| ReportSinkError(format!("{}: {err}", self.path.display())))?;
        writeln!(file, "{body}\n\n---\n").map_err(|err| ReportSinkError(err.to_string()))
    }
}
