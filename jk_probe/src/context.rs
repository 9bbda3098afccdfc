//! Per-run state
//!
//! A [`RunContext`] is created for every diagnostics run and passed by
//! mutable reference through the orchestrator and each probe. Nothing here is
//! process-global, so independent runs (and tests) never share results.

use crate::probes::Outcome;
use jk_core::types::credentials::{IceServer, TurnCredentials};
use jk_core::{Layer, Ledger, ScoreData, Status, TestDefinition, TestResult};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "layer", rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Layer(Layer),
    Complete,
    Cancelled,
}

/// Progress hooks for a run; every method defaults to doing nothing
#[allow(unused_variables)]
pub trait RunObserver: Send + Sync {
    fn on_run_started(&self, total: usize) {}

    fn on_layer_started(&self, layer: Layer) {}

    fn on_test_started(&self, layer: Layer, def: &TestDefinition) {}

    fn on_test_finished(&self, result: &TestResult, completed: usize, total: usize) {}

    fn on_layer_finished(&self, layer: Layer, status: Status) {}

    fn on_run_finished(&self, score: &ScoreData) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

pub struct RunContext {
    ledger: Ledger,
    credentials: Option<TurnCredentials>,
    /// Round-trip samples in milliseconds, written by the latency probe
    latency_samples: Vec<f64>,
    state: RunState,
    token: CancellationToken,
    observer: Arc<dyn RunObserver>,
}

impl RunContext {
    pub fn new(total_tests: usize) -> Self {
        Self {
            ledger: Ledger::new(total_tests),
            credentials: None,
            latency_samples: Vec::new(),
            state: RunState::Idle,
            token: CancellationToken::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Append the outcome of one probe to the ledger.
    ///
    /// Returns the recorded result, or `None` when the test already has one.
    pub fn record(&mut self, layer: Layer, def: &TestDefinition, outcome: Outcome) -> Option<TestResult> {
        let result = TestResult::new(layer, def, outcome.status, outcome.detail);

        match self.ledger.record(result.clone()) {
            Ok(completed) => {
                tracing::info!(
                    test_id = %result.id,
                    layer = layer.number(),
                    status = %result.status,
                    detail = %result.detail,
                    "test finished"
                );
                self.observer.on_test_finished(&result, completed, self.ledger.total());
                Some(result)
            }
            Err(e) => {
                tracing::warn!(test_id = %def.id, "dropping result: {}", e);
                None
            }
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn observer(&self) -> &Arc<dyn RunObserver> {
        &self.observer
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn set_state(&mut self, state: RunState) {
        tracing::debug!(?state, "run state");
        self.state = state;
    }

    pub fn credentials(&self) -> Option<&TurnCredentials> {
        self.credentials.as_ref()
    }

    pub fn set_credentials(&mut self, credentials: TurnCredentials) {
        self.credentials = Some(credentials);
    }

    /// True only for credentials minted by Prosody during this run
    pub fn has_real_credentials(&self) -> bool {
        self.credentials.as_ref().is_some_and(TurnCredentials::has_real_credentials)
    }

    /// TURN server whose URL contains `fragment`, when real credentials exist
    pub fn credential_server(&self, fragment: &str) -> Option<&IceServer> {
        self.credentials
            .as_ref()
            .filter(|c| c.has_real_credentials())
            .and_then(|c| c.find_server(fragment))
    }

    /// Status already recorded for `id` in this run
    pub fn prior_status(&self, id: &str) -> Option<Status> {
        self.ledger.status_of(id)
    }

    pub fn latency_samples(&self) -> &[f64] {
        &self.latency_samples
    }

    pub fn set_latency_samples(&mut self, samples: Vec<f64>) {
        self.latency_samples = samples;
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn into_results(self) -> Vec<TestResult> {
        self.ledger.into_results()
    }
}
