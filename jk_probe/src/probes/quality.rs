//! Layer 5: throughput, latency and jitter against the diagnostics backend

use super::Outcome;
use crate::api::DiagnosticsApi;
use crate::context::RunContext;
use crate::race::{race, RaceOutcome};
use jk_core::Status;
use std::time::Duration;
use tokio::time::Instant;

pub const PING_COUNT: usize = 5;

pub fn bandwidth_status(mbps: f64) -> Status {
    if mbps >= 2.0 {
        Status::Pass
    } else if mbps >= 0.5 {
        Status::Warn
    } else {
        Status::Fail
    }
}

pub fn latency_status(ms: f64) -> Status {
    if ms < 100.0 {
        Status::Pass
    } else if ms < 300.0 {
        Status::Warn
    } else {
        Status::Fail
    }
}

pub fn jitter_status(ms: f64) -> Status {
    if ms < 30.0 {
        Status::Pass
    } else if ms < 100.0 {
        Status::Warn
    } else {
        Status::Fail
    }
}

/// Megabits per second for `bytes` received in `elapsed`
pub fn throughput_mbps(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.max(Duration::from_millis(1)).as_secs_f64();
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

/// Mean absolute difference of consecutive samples, `None` below two samples
pub fn mean_jitter(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let total: f64 = samples.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    Some(total / (samples.len() - 1) as f64)
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

pub async fn bandwidth(api: &dyn DiagnosticsApi, ctx: &RunContext, timeout: Duration) -> Outcome {
    let start = Instant::now();

    match race(ctx.token(), timeout, api.download_payload()).await {
        RaceOutcome::Completed(Ok(bytes)) => {
            let mbps = throughput_mbps(bytes, start.elapsed());
            tracing::debug!(bytes, mbps, "bandwidth measured");
            Outcome::new(bandwidth_status(mbps), format!("{:.1} Mbps", mbps))
        }
        RaceOutcome::Completed(Err(e)) => Outcome::fail(e.to_string()),
        RaceOutcome::TimedOut => Outcome::timeout(Status::Fail),
        RaceOutcome::Cancelled => Outcome::cancelled(),
    }
}

/// Sequential pings; samples are kept on the context for the jitter probe
pub async fn latency(api: &dyn DiagnosticsApi, ctx: &mut RunContext, timeout: Duration) -> Outcome {
    let mut samples = Vec::with_capacity(PING_COUNT);

    let pings = async {
        for _ in 0..PING_COUNT {
            let start = Instant::now();
            api.ping().await?;
            samples.push(millis(start.elapsed()));
        }
        Ok::<(), crate::api::ApiError>(())
    };

    let outcome = match race(ctx.token(), timeout, pings).await {
        RaceOutcome::Completed(Ok(())) => None,
        RaceOutcome::Completed(Err(e)) => Some(Outcome::fail(e.to_string())),
        RaceOutcome::TimedOut => Some(Outcome::timeout(Status::Fail)),
        RaceOutcome::Cancelled => Some(Outcome::cancelled()),
    };

    ctx.set_latency_samples(samples.clone());
    if let Some(outcome) = outcome {
        return outcome;
    }

    let average = samples.iter().sum::<f64>() / samples.len() as f64;
    Outcome::new(latency_status(average), format!("{} ms", average.round()))
}

pub fn jitter(ctx: &RunContext) -> Outcome {
    match mean_jitter(ctx.latency_samples()) {
        Some(ms) => Outcome::new(jitter_status(ms), format!("{} ms", ms.round())),
        None => Outcome::fail("Missing latency data"),
    }
}
