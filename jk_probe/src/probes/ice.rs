//! ICE candidate probe shared by the STUN, TURN and gathering tests

use super::Outcome;
use crate::race::{race, RaceOutcome};
use crate::rtc::{IceConfig, PeerEvent, PeerFactory, PeerSession};
use jk_core::types::candidate::{CandidateCounts, CandidateType};
use jk_core::Status;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Candidate type a probe waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Srflx,
    Relay,
    /// Any host, srflx or relay candidate
    Any,
}

impl Expect {
    fn matches(self, candidate_type: CandidateType) -> bool {
        match self {
            Expect::Srflx => candidate_type == CandidateType::Srflx,
            Expect::Relay => candidate_type == CandidateType::Relay,
            Expect::Any => candidate_type != CandidateType::Other,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Expect::Srflx => "srflx",
            Expect::Relay => "relay",
            Expect::Any => "usable",
        }
    }
}

fn pass_detail(candidate_type: CandidateType) -> String {
    match candidate_type {
        CandidateType::Srflx => "Server-reflexive candidate".to_string(),
        CandidateType::Relay => "Relay candidate".to_string(),
        other => format!("{} candidate", other.label()),
    }
}

/// Data channel plus local offer; forces the peer to start gathering
async fn start_gathering(session: &PeerSession) -> Result<(), Outcome> {
    session
        .handle
        .create_data_channel("probe")
        .await
        .map_err(|e| Outcome::fail(e.to_string()))?;
    session
        .handle
        .create_offer()
        .await
        .map_err(|e| Outcome::fail(e.to_string()))?;
    Ok(())
}

/// Wait for the first candidate of the expected type.
///
/// Resolves `pass` on a match, `timeout_status` with "Timeout" when the timer
/// wins, and `timeout_status` with a "No … candidate" detail when gathering
/// finishes without a match.
pub async fn ice_probe(
    factory: &dyn PeerFactory,
    token: &CancellationToken,
    ice: IceConfig,
    expect: Expect,
    timeout: Duration,
    timeout_status: Status,
) -> Outcome {
    let mut session = match factory.create(&ice).await {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!(error = %e, "peer construction failed");
            return Outcome::fail("Could not create peer connection");
        }
    };

    let outcome = race(token, timeout, async {
        if let Err(outcome) = start_gathering(&session).await {
            return outcome;
        }

        while let Some(event) = session.events.recv().await {
            match event {
                PeerEvent::Candidate(local) => {
                    let candidate_type = local.candidate.candidate_type;
                    tracing::trace!(%candidate_type, "local candidate");
                    if expect.matches(candidate_type) {
                        return Outcome::pass(pass_detail(candidate_type));
                    }
                }
                PeerEvent::GatheringComplete => break,
                _ => {}
            }
        }

        // Same verdict as the timer path; the detail names the missing type
        Outcome::new(timeout_status, format!("No {} candidate", expect.label()))
    })
    .await;

    session.close().await;
    Outcome::from_race(outcome, timeout_status)
}

/// Collect candidates until gathering completes or `timeout` elapses.
///
/// Hitting the timeout is not an error; the counts gathered so far are kept.
pub async fn gather(
    factory: &dyn PeerFactory,
    token: &CancellationToken,
    ice: IceConfig,
    timeout: Duration,
) -> Result<CandidateCounts, Outcome> {
    let mut session = factory
        .create(&ice)
        .await
        .map_err(|_| Outcome::fail("Could not create peer connection"))?;

    let mut counts = CandidateCounts::default();
    let outcome = race(token, timeout, async {
        start_gathering(&session).await?;
        while let Some(event) = session.events.recv().await {
            match event {
                PeerEvent::Candidate(local) => counts.add(local.candidate.candidate_type),
                PeerEvent::GatheringComplete => break,
                _ => {}
            }
        }
        Ok::<(), Outcome>(())
    })
    .await;

    session.close().await;
    match outcome {
        RaceOutcome::Completed(Err(outcome)) => Err(outcome),
        RaceOutcome::Completed(Ok(())) | RaceOutcome::TimedOut => Ok(counts),
        RaceOutcome::Cancelled => Err(Outcome::cancelled()),
    }
}
