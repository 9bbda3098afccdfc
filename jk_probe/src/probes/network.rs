//! Layer 2: STUN, TURN and candidate gathering

use super::ice::{gather, ice_probe, Expect};
use super::Outcome;
use crate::config::DiagConfig;
use crate::context::RunContext;
use crate::rtc::{IceConfig, PeerFactory};
use jk_core::types::credentials::IceServer;
use jk_core::Status;
use std::time::Duration;

/// srflx candidate through a single STUN server
pub async fn stun(peers: &dyn PeerFactory, ctx: &RunContext, url: &str, timeout: Duration) -> Outcome {
    ice_probe(peers, ctx.token(), IceConfig::stun(url), Expect::Srflx, timeout, Status::Fail).await
}

/// One of the TURN listeners exposed by the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnVariant {
    /// Matched against the credential server URLs
    pub url_fragment: &'static str,
    /// Used in the fallback detail ("… not verifiable")
    pub what: &'static str,
    pub timeout_status: Status,
}

impl TurnVariant {
    pub const UDP_3478: TurnVariant = TurnVariant {
        url_fragment: ":3478?transport=udp",
        what: "UDP port",
        timeout_status: Status::Fail,
    };
    pub const TLS_5349: TurnVariant = TurnVariant {
        url_fragment: ":5349",
        what: "TLS port",
        timeout_status: Status::Fail,
    };
    pub const TCP_4443: TurnVariant = TurnVariant {
        url_fragment: ":4443",
        what: "TCP port",
        timeout_status: Status::Warn,
    };
    pub const SNI_443: TurnVariant = TurnVariant {
        url_fragment: ":443?transport=tcp",
        what: "SNI routing",
        timeout_status: Status::Warn,
    };

    pub fn for_id(id: &str) -> Option<Self> {
        match id {
            "turn-udp-3478" => Some(Self::UDP_3478),
            "turn-tls-5349" => Some(Self::TLS_5349),
            "turn-tcp-4443" => Some(Self::TCP_4443),
            "turn-443-sni" => Some(Self::SNI_443),
            _ => None,
        }
    }
}

/// Relay candidate through one credentialed TURN server, or the STUN fallback
pub async fn turn(peers: &dyn PeerFactory, ctx: &RunContext, variant: TurnVariant, timeout: Duration) -> Outcome {
    if let Some(server) = ctx.credential_server(variant.url_fragment) {
        let ice = IceConfig::relay_only(server.clone());
        return ice_probe(peers, ctx.token(), ice, Expect::Relay, timeout, variant.timeout_status).await;
    }

    tracing::debug!(fragment = variant.url_fragment, "no TURN credentials, using STUN result");
    stun_fallback(ctx, variant)
}

/// Without credentials a relay allocation cannot be attempted; infer from STUN
fn stun_fallback(ctx: &RunContext, variant: TurnVariant) -> Outcome {
    match ctx.prior_status("stun") {
        Some(Status::Pass) => Outcome::warn(format!("No TURN credentials, {} not verifiable", variant.what)),
        _ => Outcome::fail("TURN server unreachable"),
    }
}

/// Gather with the credential servers (or the configured STUN servers) and
/// judge by the best candidate type seen
pub async fn ice_candidates(peers: &dyn PeerFactory, ctx: &RunContext, config: &DiagConfig) -> Outcome {
    let servers = match ctx.credentials() {
        Some(creds) if !creds.ice_servers.is_empty() => creds.ice_servers.clone(),
        _ => vec![IceServer::stun(config.stun_url()), IceServer::stun(config.external_stun_url.clone())],
    };

    let counts = match gather(peers, ctx.token(), IceConfig::new(servers), config.timeouts.gathering).await {
        Ok(counts) => counts,
        Err(outcome) => return outcome,
    };

    if counts.relay > 0 || counts.srflx > 0 {
        Outcome::pass(counts.detail())
    } else if counts.host > 0 {
        Outcome::warn(format!("Only host: {}", counts.detail()))
    } else {
        Outcome::fail("No candidates")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtc::testing::{candidate, ScriptedPeers, HOST, RELAY, SRFLX};
    use crate::rtc::{IceTransportPolicy, PeerEvent};
    use jk_core::types::credentials::{CredentialSource, TurnCredentials};
    use jk_core::{Category, Layer, TestDefinition};

    fn prosody() -> TurnCredentials {
        TurnCredentials {
            ice_servers: vec![
                IceServer::stun("stun:meet.example.org:3478"),
                IceServer::turn("turn:meet.example.org:3478?transport=udp", "u", "p"),
            ],
            jitsi_domain: "meet.example.org".to_string(),
            credential_source: CredentialSource::Prosody,
        }
    }

    fn with_stun(status: Status) -> RunContext {
        let mut ctx = RunContext::new(10);
        let def = TestDefinition::new("stun", "STUN", Category::Critical);
        ctx.record(Layer::NETWORK, &def, Outcome::new(status, ""));
        ctx
    }

    #[test]
    fn test_variant_lookup() {
        assert_eq!(TurnVariant::for_id("turn-tcp-4443"), Some(TurnVariant::TCP_4443));
        assert_eq!(TurnVariant::for_id("stun"), None);
    }

    #[tokio::test]
    async fn test_turn_falls_back_to_stun_result() {
        let peers = ScriptedPeers::default();
        let ctx = with_stun(Status::Pass);
        let outcome = turn(&peers, &ctx, TurnVariant::TLS_5349, Duration::from_secs(10)).await;
        assert_eq!(outcome, Outcome::warn("No TURN credentials, TLS port not verifiable"));

        let ctx = with_stun(Status::Fail);
        let outcome = turn(&peers, &ctx, TurnVariant::TLS_5349, Duration::from_secs(10)).await;
        assert_eq!(outcome, Outcome::fail("TURN server unreachable"));

        // No peer was ever constructed for the fallback
        assert!(peers.configs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_turn_with_credentials_is_relay_only() {
        let peers = ScriptedPeers::offering(vec![candidate(HOST), candidate(RELAY)]);
        let mut ctx = with_stun(Status::Pass);
        ctx.set_credentials(prosody());

        let outcome = turn(&peers, &ctx, TurnVariant::UDP_3478, Duration::from_secs(10)).await;
        assert_eq!(outcome, Outcome::pass("Relay candidate"));

        let configs = peers.configs.lock().unwrap();
        assert_eq!(configs[0].policy, IceTransportPolicy::Relay);
        assert_eq!(configs[0].urls(), vec!["turn:meet.example.org:3478?transport=udp"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_turn_variant_times_out_as_warning() {
        let mut creds = prosody();
        creds
            .ice_servers
            .push(IceServer::turn("turn:meet.example.org:4443?transport=tcp", "u", "p"));
        let peers = ScriptedPeers::offering(vec![candidate(HOST)]);
        let mut ctx = RunContext::new(10);
        ctx.set_credentials(creds);

        let outcome = turn(&peers, &ctx, TurnVariant::TCP_4443, Duration::from_secs(10)).await;
        assert_eq!(outcome, Outcome::warn("Timeout"));
    }

    #[tokio::test]
    async fn test_ice_candidates_verdicts() {
        let config = DiagConfig::default();
        let ctx = RunContext::new(1);

        let peers = ScriptedPeers::offering(vec![candidate(HOST), candidate(SRFLX), PeerEvent::GatheringComplete]);
        let outcome = ice_candidates(&peers, &ctx, &config).await;
        assert_eq!(outcome, Outcome::pass("host:1 srflx:1 relay:0"));

        let peers = ScriptedPeers::offering(vec![candidate(HOST), PeerEvent::GatheringComplete]);
        let outcome = ice_candidates(&peers, &ctx, &config).await;
        assert_eq!(outcome, Outcome::warn("Only host: host:1 srflx:0 relay:0"));

        let peers = ScriptedPeers::offering(vec![PeerEvent::GatheringComplete]);
        let outcome = ice_candidates(&peers, &ctx, &config).await;
        assert_eq!(outcome, Outcome::fail("No candidates"));
    }

    #[tokio::test]
    async fn test_ice_candidates_uses_credential_servers() {
        let config = DiagConfig::default();
        let mut ctx = RunContext::new(1);
        ctx.set_credentials(prosody());

        let peers = ScriptedPeers::offering(vec![candidate(RELAY), PeerEvent::GatheringComplete]);
        ice_candidates(&peers, &ctx, &config).await;
        let configs = peers.configs.lock().unwrap();
        assert_eq!(configs[0].servers, prosody().ice_servers);
        assert_eq!(configs[0].policy, IceTransportPolicy::All);
    }
}
