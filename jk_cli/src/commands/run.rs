use crate::render::{self, ConsoleObserver};
use crate::BackendArgs;
use anyhow::Result;
use colored::Colorize;
use jk_core::TestCatalog;
use jk_probe::{Capabilities, NoopObserver, Orchestrator, Prober, RunObserver, RunState};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long the finished report waits for the background save
const SAVE_WAIT: Duration = Duration::from_secs(15);

pub async fn run(backend: &BackendArgs, org: Option<String>, json: bool, no_save: bool) -> Result<ExitCode> {
    let config = super::load_config(backend, org)?;
    let organization = config.organization.clone();

    if !json {
        println!("{}", "Jitsi connectivity diagnostics".bold().green());
        println!("{}", "=".repeat(50));
        println!("Backend: {}", config.api_base.cyan());
        match &config.jitsi_domain {
            Some(domain) => println!("Jitsi domain: {}", domain.cyan()),
            None => println!("Jitsi domain: {} {}", config.domain().cyan(), "(or as reported by the backend)".dimmed()),
        }
        println!();
    }

    let caps = Capabilities::native(&config)?;
    let orchestrator = Orchestrator::new(TestCatalog::standard(), Prober::new(caps, config));

    let token = CancellationToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Cancelling...".yellow());
                token.cancel();
            }
        })
    };

    let observer: Arc<dyn RunObserver> = if json {
        Arc::new(NoopObserver)
    } else {
        Arc::new(ConsoleObserver)
    };
    let mut ctx = orchestrator.new_context().with_token(token).with_observer(observer);

    let report = orchestrator.run(&mut ctx).await;
    ctrl_c.abort();

    let save = if no_save || report.state == RunState::Cancelled {
        None
    } else {
        Some(orchestrator.persist(&report, organization))
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::print_report(&report);
    }

    if let Some(handle) = save {
        match tokio::time::timeout(SAVE_WAIT, handle).await {
            Ok(Ok(Some((saved, stats)))) => {
                if !json {
                    render::print_saved(&saved, stats.as_ref());
                }
            }
            Ok(Ok(None)) => eprintln!("{}", "Results could not be saved".yellow()),
            Ok(Err(e)) => tracing::warn!("save task failed: {}", e),
            Err(_) => eprintln!("{}", "Saving results is taking too long, skipped".yellow()),
        }
    }

    Ok(render::exit_code(report.score.rating))
}
