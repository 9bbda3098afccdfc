//! Per-run results ledger

use crate::types::result::{aggregate_status, Layer, Status, TestResult};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("result for `{0}` already recorded in this run")]
    Duplicate(String),
}

/// Results of the current run, in completion order
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    results: Vec<TestResult>,
    total_tests: usize,
}

impl Ledger {
    pub fn new(total_tests: usize) -> Self {
        Self {
            results: Vec::with_capacity(total_tests),
            total_tests,
        }
    }

    /// Append a result, returning the new completed count
    pub fn record(&mut self, result: TestResult) -> Result<usize, LedgerError> {
        if self.find(&result.id).is_some() {
            return Err(LedgerError::Duplicate(result.id));
        }
        self.results.push(result);
        Ok(self.results.len())
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    pub fn completed(&self) -> usize {
        self.results.len()
    }

    pub fn total(&self) -> usize {
        self.total_tests
    }

    pub fn is_complete(&self) -> bool {
        self.completed() == self.total_tests
    }

    pub fn progress_percent(&self) -> u8 {
        if self.total_tests == 0 {
            return 100;
        }
        let pct = (self.completed() as f64 / self.total_tests as f64 * 100.0).round();
        pct.min(100.0) as u8
    }

    pub fn find(&self, id: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<Status> {
        self.find(id).map(|r| r.status)
    }

    pub fn layer_results(&self, layer: Layer) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(move |r| r.layer == layer)
    }

    pub fn layer_status(&self, layer: Layer) -> Status {
        aggregate_status(self.layer_results(layer))
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<TestResult> {
        self.results
    }
}
