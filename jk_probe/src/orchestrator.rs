//! Layer orchestrator
//!
//! Runs the catalog one probe at a time, layer by layer:
//! `idle → layer 1 → credential fetch → layer 2 … layer 5 → complete`.
//! Nothing runs concurrently; a probe starts only after the previous one
//! has recorded its result.

use crate::context::{RunContext, RunState};
use crate::probes::Prober;
use crate::race::{race, RaceOutcome};
use jk_core::types::report::{ResultStats, SaveResultRequest, SavedResult};
use jk_core::{
    calculate_score_with, get_recommendations, Layer, Recommendation, RecommendationTable, ScoreData,
    ScoringPolicy, TestCatalog, TestResult,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Everything a finished (or cancelled) run produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub results: Vec<TestResult>,
    pub score: ScoreData,
    pub recommendations: Vec<Recommendation>,
    pub completed: usize,
    pub total: usize,
    pub state: RunState,
}

impl RunReport {
    /// Assemble a report from a ledger, e.g. one loaded from disk
    pub fn from_results(
        results: Vec<TestResult>,
        total: usize,
        state: RunState,
        table: &RecommendationTable,
        policy: &ScoringPolicy,
    ) -> Self {
        let score = calculate_score_with(&results, policy);
        let recommendations = get_recommendations(&results, table);
        Self {
            completed: results.len(),
            total,
            results,
            score,
            recommendations,
            state,
        }
    }

    pub fn save_request(&self, organization: Option<String>) -> SaveResultRequest {
        SaveResultRequest {
            organization,
            total_score: self.score.total_score,
            rating: self.score.rating,
            results: self.results.clone(),
        }
    }
}

pub struct Orchestrator {
    catalog: TestCatalog,
    prober: Arc<Prober>,
    recommendations: RecommendationTable,
    policy: ScoringPolicy,
}

impl Orchestrator {
    pub fn new(catalog: TestCatalog, prober: Prober) -> Self {
        Self {
            catalog,
            prober: Arc::new(prober),
            recommendations: RecommendationTable::standard(),
            policy: ScoringPolicy::default(),
        }
    }

    pub fn with_recommendations(mut self, table: RecommendationTable) -> Self {
        self.recommendations = table;
        self
    }

    pub fn with_policy(mut self, policy: ScoringPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn catalog(&self) -> &TestCatalog {
        &self.catalog
    }

    /// Fresh context sized for this catalog
    pub fn new_context(&self) -> RunContext {
        RunContext::new(self.catalog.total_tests())
    }

    pub async fn run(&self, ctx: &mut RunContext) -> RunReport {
        let total = self.catalog.total_tests();
        tracing::info!(total, "diagnostics run started");
        ctx.observer().on_run_started(total);

        let mut credentials_fetched = false;

        'layers: for layer_defs in &self.catalog.layers {
            let layer = layer_defs.layer;

            if !credentials_fetched && layer >= Layer::NETWORK {
                self.fetch_credentials(ctx).await;
                credentials_fetched = true;
            }

            ctx.set_state(RunState::Layer(layer));
            ctx.observer().on_layer_started(layer);

            for def in &layer_defs.tests {
                if ctx.is_cancelled() {
                    break 'layers;
                }

                ctx.observer().on_test_started(layer, def);
                let span = tracing::info_span!("probe", test_id = %def.id, layer = layer.number());
                let outcome = self.prober.run(&def.id, ctx).instrument(span).await;

                // A probe cut short by cancellation has nothing to report
                if ctx.is_cancelled() {
                    break 'layers;
                }
                ctx.record(layer, def, outcome);
            }

            let status = ctx.ledger().layer_status(layer);
            tracing::info!(layer = layer.number(), status = %status, "layer finished");
            ctx.observer().on_layer_finished(layer, status);
        }

        let state = if ctx.is_cancelled() {
            tracing::warn!(completed = ctx.ledger().completed(), "diagnostics run cancelled");
            RunState::Cancelled
        } else {
            RunState::Complete
        };
        ctx.set_state(state);

        let report = RunReport::from_results(
            ctx.ledger().results().to_vec(),
            total,
            state,
            &self.recommendations,
            &self.policy,
        );

        tracing::info!(
            score = report.score.total_score,
            rating = %report.score.rating,
            critical_fail = report.score.has_critical_fail,
            "diagnostics run finished"
        );
        ctx.observer().on_run_finished(&report.score);
        report
    }

    /// Cache TURN credentials on the context; failure leaves them unset
    async fn fetch_credentials(&self, ctx: &mut RunContext) {
        let api = self.prober.api().clone();
        let timeout = self.prober.config().timeouts.api;

        match race(ctx.token(), timeout, api.turn_credentials()).await {
            RaceOutcome::Completed(Ok(credentials)) => {
                tracing::info!(
                    source = ?credentials.credential_source,
                    servers = credentials.ice_servers.len(),
                    jitsi_domain = %credentials.jitsi_domain,
                    "TURN credentials fetched"
                );
                ctx.set_credentials(credentials);
            }
            RaceOutcome::Completed(Err(e)) => {
                tracing::warn!("TURN credential fetch failed: {}", e);
            }
            RaceOutcome::TimedOut => {
                tracing::warn!("TURN credential fetch timed out");
            }
            RaceOutcome::Cancelled => {}
        }
    }

    /// Save the report and fetch the comparison stats in the background.
    ///
    /// Never fails: errors are logged and yield `None`.
    pub fn persist(
        &self,
        report: &RunReport,
        organization: Option<String>,
    ) -> JoinHandle<Option<(SavedResult, Option<ResultStats>)>> {
        let api = self.prober.api().clone();
        let timeout = self.prober.config().timeouts.api;
        let request = report.save_request(organization);

        tokio::spawn(async move {
            let saved = match tokio::time::timeout(timeout, api.save_results(&request)).await {
                Ok(Ok(saved)) => saved,
                Ok(Err(e)) => {
                    tracing::warn!("saving results failed: {}", e);
                    return None;
                }
                Err(_) => {
                    tracing::warn!("saving results timed out");
                    return None;
                }
            };
            tracing::info!(id = %saved.id, "results saved");

            let stats = match tokio::time::timeout(timeout, api.stats()).await {
                Ok(Ok(stats)) => Some(stats),
                Ok(Err(e)) => {
                    tracing::debug!("stats unavailable: {}", e);
                    None
                }
                Err(_) => None,
            };

            Some((saved, stats))
        })
    }
}
