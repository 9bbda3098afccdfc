//! Probes, capabilities and the layer orchestrator.
//!
//! `jk_core` describes what a diagnostics run is; this crate performs one.
//! Every network or device dependency sits behind a trait in [`rtc`],
//! [`media`], [`signaling`] or [`api`] so that runs can be driven against
//! fakes.

pub mod api;
pub mod config;
pub mod context;
pub mod logging;
pub mod media;
pub mod orchestrator;
pub mod probes;
pub mod race;
pub mod rtc;
pub mod signaling;
pub mod stun_server;
pub mod udp;

pub use api::{ApiError, DiagnosticsApi, HttpApi};
pub use config::{ConfigError, DiagConfig, DiagConfigBuilder, Timeouts};
pub use context::{NoopObserver, RunContext, RunObserver, RunState};
pub use media::{MediaDevice, MediaDevices, MediaError, MediaKind, NativeMediaDevices};
pub use orchestrator::{Orchestrator, RunReport};
pub use probes::{Capabilities, Outcome, Prober};
pub use race::{race, RaceOutcome};
pub use rtc::{IceConfig, IceTransportPolicy, NativePeerFactory, PeerEvent, PeerFactory, PeerHandle, PeerSession, RtcError};
pub use signaling::{SignalingConnector, SignalingError, SignalingLink, WsConnector};
pub use stun_server::StunServer;
