use crate::render;
use crate::BackendArgs;
use anyhow::{Context, Result};
use colored::Colorize;
use jk_core::types::report::StoredResult;
use jk_core::{RecommendationTable, ScoringPolicy, TestCatalog, TestResult};
use jk_probe::{DiagnosticsApi, HttpApi, RunReport, RunState};
use serde::Deserialize;
use std::process::ExitCode;

/// Accepted shapes of a results file
#[derive(Deserialize)]
#[serde(untagged)]
enum ResultsFile {
    Stored(StoredResult),
    Report { results: Vec<TestResult> },
    Ledger(Vec<TestResult>),
}

impl ResultsFile {
    fn into_results(self) -> Vec<TestResult> {
        match self {
            ResultsFile::Stored(stored) => stored.results_json,
            ResultsFile::Report { results } | ResultsFile::Ledger(results) => results,
        }
    }
}

pub fn parse_results(content: &str) -> Result<Vec<TestResult>> {
    let file: ResultsFile = serde_json::from_str(content)
        .context("expected a list of test results, a run report or a stored result")?;
    Ok(file.into_results())
}

fn rescore(results: Vec<TestResult>) -> RunReport {
    let total = TestCatalog::standard().total_tests();
    RunReport::from_results(
        results,
        total,
        RunState::Complete,
        &RecommendationTable::standard(),
        &ScoringPolicy::default(),
    )
}

fn output(report: &RunReport, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        render::print_report(report);
    }
    Ok(render::exit_code(report.score.rating))
}

pub fn score(file: &str, json: bool) -> Result<ExitCode> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file))?;
    let report = rescore(parse_results(&content)?);
    output(&report, json)
}

pub async fn show(id: &str, backend: &BackendArgs, json: bool) -> Result<ExitCode> {
    let config = super::load_config(backend, None)?;
    let api = HttpApi::new(&config.api_base)?;

    let stored = api.fetch_result(id).await.with_context(|| format!("fetching result {}", id))?;

    if !json {
        println!("{} {}", "Result".bold(), stored.id.cyan());
        if let Some(org) = &stored.organization {
            println!("Organization: {}", org.yellow());
        }
        println!("Tested: {}", render::format_timestamp(&stored.timestamp));
        tracing::debug!(stored_score = stored.total_score, "rescoring stored result");
    }

    output(&rescore(stored.results_json), json)
}

pub async fn stats(backend: &BackendArgs) -> Result<()> {
    let config = super::load_config(backend, None)?;
    let api = HttpApi::new(&config.api_base)?;

    let stats = api.stats().await.context("fetching statistics")?;
    render::print_stats(&stats);
    Ok(())
}
