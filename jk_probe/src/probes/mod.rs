//! Probe library
//!
//! Every test id in the catalog maps to one probe. Probes never fail: every
//! error path ends in an [`Outcome`] that the orchestrator records.

pub mod device;
pub mod ice;
pub mod network;
pub mod quality;
pub mod service;
pub mod session;

use crate::api::{DiagnosticsApi, HttpApi};
use crate::config::DiagConfig;
use crate::context::RunContext;
use crate::media::{MediaDevices, NativeMediaDevices};
use crate::race::RaceOutcome;
use crate::rtc::{NativePeerFactory, PeerFactory};
use crate::signaling::{SignalingConnector, WsConnector};
use jk_core::Status;
use std::sync::Arc;

/// Status and human-readable detail produced by one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,
    pub detail: String,
}

impl Outcome {
    pub fn new(status: Status, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn pass(detail: impl Into<String>) -> Self {
        Self::new(Status::Pass, detail)
    }

    pub fn warn(detail: impl Into<String>) -> Self {
        Self::new(Status::Warn, detail)
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self::new(Status::Fail, detail)
    }

    pub(crate) fn cancelled() -> Self {
        Self::fail("Cancelled")
    }

    pub(crate) fn timeout(status: Status) -> Self {
        Self::new(status, "Timeout")
    }

    /// Map a raced probe body onto an outcome, with `on_timeout` for the timer path
    pub(crate) fn from_race(outcome: RaceOutcome<Outcome>, on_timeout: Status) -> Self {
        match outcome {
            RaceOutcome::Completed(outcome) => outcome,
            RaceOutcome::TimedOut => Self::timeout(on_timeout),
            RaceOutcome::Cancelled => Self::cancelled(),
        }
    }
}

/// Environment the probes run against
#[derive(Clone)]
pub struct Capabilities {
    pub peers: Arc<dyn PeerFactory>,
    pub media: Arc<dyn MediaDevices>,
    pub signaling: Arc<dyn SignalingConnector>,
    pub api: Arc<dyn DiagnosticsApi>,
}

impl Capabilities {
    /// webrtc-rs peers, device nodes, WebSocket signaling and the HTTP
    /// backend at `config.api_base`
    pub fn native(config: &DiagConfig) -> anyhow::Result<Self> {
        Ok(Self {
            peers: Arc::new(NativePeerFactory::new()?),
            media: Arc::new(NativeMediaDevices::new()),
            signaling: Arc::new(WsConnector),
            api: Arc::new(HttpApi::new(&config.api_base)?),
        })
    }
}

/// Dispatches test ids to probes
pub struct Prober {
    caps: Capabilities,
    config: DiagConfig,
}

impl Prober {
    pub fn new(caps: Capabilities, config: DiagConfig) -> Self {
        Self { caps, config }
    }

    pub fn config(&self) -> &DiagConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<dyn DiagnosticsApi> {
        &self.caps.api
    }

    pub async fn run(&self, id: &str, ctx: &mut RunContext) -> Outcome {
        let caps = &self.caps;
        let resolved = self.config.resolve(ctx.credentials());
        let config = resolved.as_ref();

        tracing::debug!(test_id = id, "running probe");

        match id {
            "webrtc-support" => device::webrtc_support(caps.peers.as_ref()).await,
            "camera-mic" => device::camera_mic(caps.media.as_ref()).await,
            "device-enum" => device::device_enum(caps.media.as_ref()).await,

            "stun" => network::stun(caps.peers.as_ref(), ctx, &config.stun_url(), config.timeouts.ice).await,
            "turn-tls-443-ext" => {
                network::stun(caps.peers.as_ref(), ctx, &config.external_stun_url, config.timeouts.ice).await
            }
            "udp-10000" => {
                network::stun(caps.peers.as_ref(), ctx, &config.jvb_stun_url(), config.timeouts.ice).await
            }
            "ice-candidates" => network::ice_candidates(caps.peers.as_ref(), ctx, config).await,

            "peer-connection" => session::peer_connection(caps, ctx, config).await,
            "data-channel" => session::data_channel(caps, ctx, config).await,

            "jitsi-https" => service::jitsi_https(caps.api.as_ref(), ctx, config).await,
            "jitsi-websocket" => service::jitsi_websocket(caps.signaling.as_ref(), ctx, config).await,

            "bandwidth" => quality::bandwidth(caps.api.as_ref(), ctx, config.timeouts.quality).await,
            "latency" => quality::latency(caps.api.as_ref(), ctx, config.timeouts.quality).await,
            "jitter" => quality::jitter(ctx),

            _ => match network::TurnVariant::for_id(id) {
                Some(variant) => network::turn(caps.peers.as_ref(), ctx, variant, config.timeouts.relay).await,
                None => {
                    tracing::warn!(test_id = id, "no probe registered");
                    Outcome::fail("No probe registered")
                }
            },
        }
    }
}
