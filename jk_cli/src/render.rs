//! Terminal rendering of runs and reports

use colored::{ColoredString, Colorize};
use jk_core::types::report::{ResultStats, SavedResult};
use jk_core::{Layer, Rating, Recommendation, ScoreData, Severity, Status, TestDefinition, TestResult};
use jk_probe::{RunObserver, RunReport, RunState};
use std::process::ExitCode;
use tabled::settings::Style;
use tabled::{Table, Tabled};

pub fn status_symbol(status: Status) -> ColoredString {
    match status {
        Status::Pass => "✓".green(),
        Status::Warn => "!".yellow(),
        Status::Fail => "✗".red(),
    }
}

fn status_word(status: Status) -> ColoredString {
    match status {
        Status::Pass => "pass".green(),
        Status::Warn => "warn".yellow(),
        Status::Fail => "fail".red(),
    }
}

fn rating_color(rating: Rating, text: &str) -> ColoredString {
    match rating {
        Rating::Green => text.green().bold(),
        Rating::Yellow => text.yellow().bold(),
        Rating::Red => text.red().bold(),
    }
}

/// 0 for green, 1 for yellow, 2 for red
pub fn exit_status(rating: Rating) -> u8 {
    match rating {
        Rating::Green => 0,
        Rating::Yellow => 1,
        Rating::Red => 2,
    }
}

pub fn exit_code(rating: Rating) -> ExitCode {
    ExitCode::from(exit_status(rating))
}

/// Live progress on stderr
pub struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn on_run_started(&self, total: usize) {
        eprintln!("{} ({} tests)", "Running connectivity diagnostics".bold(), total);
    }

    fn on_layer_started(&self, layer: Layer) {
        eprintln!();
        eprintln!("{}", layer.to_string().bold().cyan());
    }

    fn on_test_started(&self, _layer: Layer, def: &TestDefinition) {
        tracing::debug!(test_id = %def.id, "starting {}", def.name);
    }

    fn on_test_finished(&self, result: &TestResult, completed: usize, total: usize) {
        let percent = if total == 0 { 100 } else { completed * 100 / total };
        let detail = if result.detail.is_empty() {
            String::new()
        } else {
            format!(" ({})", result.detail)
        };
        eprintln!(
            "  {} {}{}   {}",
            status_symbol(result.status),
            result.name,
            detail.dimmed(),
            format!("{} of {} tests done ({}%)", completed, total, percent).dimmed()
        );
    }

    fn on_layer_finished(&self, layer: Layer, status: Status) {
        tracing::debug!(layer = layer.number(), status = %status, "layer done");
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "")]
    symbol: String,
    #[tabled(rename = "Test")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&TestResult> for ResultRow {
    fn from(result: &TestResult) -> Self {
        Self {
            symbol: status_symbol(result.status).to_string(),
            name: result.name.clone(),
            category: result.category.to_string(),
            status: status_word(result.status).to_string(),
            detail: result.detail.clone(),
        }
    }
}

/// Score "circle" with verdict and description
pub fn print_score(score: &ScoreData) {
    let number = format!("{:^5}", score.total_score);
    println!("  ╭───────╮");
    println!("  │ {} │   {}", rating_color(score.rating, &number), rating_color(score.rating, &score.verdict));
    println!("  ╰───────╯   {}", score.description);
    if score.has_critical_fail {
        println!("              {}", "A critical test failed, the score is capped.".red());
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "critical".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".blue(),
    }
}

pub fn print_recommendations(recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        return;
    }
    println!();
    println!("{}", "Recommendations".bold());
    for rec in recommendations {
        println!("  [{}] {}: {}", severity_label(rec.severity), rec.test_name.bold(), rec.message);
    }
}

pub fn print_layers(results: &[TestResult], score: &ScoreData) {
    for layer in Layer::ALL {
        let rows: Vec<ResultRow> = results.iter().filter(|r| r.layer == layer).map(ResultRow::from).collect();
        if rows.is_empty() {
            continue;
        }

        let layer_score = score
            .layer_details
            .get(&layer.number())
            .map(|s| format!(" ({:.0}/100)", s))
            .unwrap_or_default();
        println!();
        println!("{}{}", layer.to_string().bold(), layer_score.dimmed());

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }
}

pub fn print_report(report: &RunReport) {
    println!();
    if report.state == RunState::Cancelled {
        println!(
            "{} {} of {} tests completed, the score covers only those.",
            "Run cancelled.".yellow().bold(),
            report.completed,
            report.total
        );
    }
    print_score(&report.score);
    print_recommendations(&report.recommendations);
    print_layers(&report.results, &report.score);
}

/// RFC 3339 timestamps in local-ish form, raw text when unparseable
pub fn format_timestamp(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC%:z").to_string())
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S")
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        })
        .unwrap_or_else(|_| timestamp.to_string())
}

pub fn print_saved(saved: &SavedResult, stats: Option<&ResultStats>) {
    println!();
    println!(
        "{} {} ({})",
        "✓ Results saved:".green(),
        saved.id.cyan(),
        format_timestamp(&saved.timestamp)
    );
    if let Some(stats) = stats {
        print_stats(stats);
    }
}

pub fn print_stats(stats: &ResultStats) {
    println!(
        "{} {} runs, average score {}",
        "All organizations:".bold(),
        stats.total_runs.to_string().yellow(),
        format!("{:.0}", stats.average_score).yellow()
    );
}
