use serde::{Deserialize, Serialize};

/// One item a batch could not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub item: String,
    pub reason: String,
}

/// Outcome of a batch operation. Batches report; they never abort on the first failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: Vec<FailedItem>,
}

impl BatchSummary {
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, item: impl Into<String>, reason: impl Into<String>) {
        self.attempted += 1;
        self.failed.push(FailedItem {
            item: item.into(),
            reason: reason.into(),
        });
    }

    pub fn failed_count(&self) -> u32 {
        self.failed.len() as u32
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Attempted: {}", self.attempted)?;
        writeln!(f, "Succeeded: {}", self.succeeded)?;
        writeln!(f, "Failed:    {}", self.failed_count())?;
        for failure in &self.failed {
            writeln!(f, "  {}: {}", failure.item, failure.reason)?;
        }
        Ok(())
    }
}
