use std::path::PathBuf;

/// Host-side "record a failure" primitive. Implementations must not panic,
/// so every teardown check gets to run.
pub trait FailureReporter {
    fn record_failure(&mut self, message: String);
}

#[derive(Debug, Clone, Default)]
pub struct RecordedFailures {
    messages: Vec<String>,
}

impl RecordedFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn summary(&self) -> String {
        let mut summary = format!("{} failure(s) recorded", self.messages.len());
        for message in &self.messages {
            summary.push_str("\n  - ");
            summary.push_str(message);
        }
        summary
    }

    pub fn into_result(self) -> anyhow::Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        anyhow::bail!("{}", self.summary())
    }
}

impl FailureReporter for RecordedFailures {
    fn record_failure(&mut self, message: String) {
        self.messages.push(message);
    }
}

#[derive(Debug, Clone)]
pub struct TeardownReport {
    pub path: PathBuf,
    /// Entries found in the directory before it was removed.
    pub leftovers: Vec<String>,
    /// Nothing was left at `path` once tear-down finished, whether it
    /// removed the directory or found it already gone.
    pub absent: bool,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.leftovers.is_empty() && self.absent
    }
}
