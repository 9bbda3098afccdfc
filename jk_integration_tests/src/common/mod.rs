// Common test utilities for integration tests
#![allow(dead_code)]

pub mod fake_api;
pub mod fake_network;
pub mod fake_signaling;
pub mod observer;

pub use fake_api::FakeApi;
pub use fake_network::{FakeMedia, FakeNetwork};
pub use fake_signaling::{EchoPeer, FakeSignaling};
pub use observer::{CancelAt, RecordingObserver};

use jk_core::types::credentials::{CredentialSource, IceServer, TurnCredentials};
use jk_core::TestCatalog;
use jk_probe::{Capabilities, DiagConfig, Orchestrator, Prober};
use std::sync::Arc;

pub const DOMAIN: &str = "meet.example.org";

/// Configuration pointing at [`DOMAIN`] with the default timeouts
pub fn test_config() -> DiagConfig {
    DiagConfig::builder()
        .api_base(format!("https://{}/api", DOMAIN))
        .jitsi_domain(DOMAIN)
        .build()
}

/// Credentials as issued by Prosody, one TURN server per listener
pub fn prosody_credentials() -> TurnCredentials {
    TurnCredentials {
        ice_servers: vec![
            IceServer::stun(format!("stun:{}:3478", DOMAIN)),
            IceServer::turn(format!("turn:{}:3478?transport=udp", DOMAIN), "user", "secret"),
            IceServer::turn(format!("turns:{}:5349?transport=tcp", DOMAIN), "user", "secret"),
            IceServer::turn(format!("turn:{}:4443?transport=tcp", DOMAIN), "user", "secret"),
            IceServer::turn(format!("turns:turn.{}:443?transport=tcp", DOMAIN), "user", "secret"),
        ],
        jitsi_domain: DOMAIN.to_string(),
        credential_source: CredentialSource::Prosody,
    }
}

/// What a backend without a TURN secret hands out
pub fn stun_only_credentials() -> TurnCredentials {
    TurnCredentials {
        ice_servers: vec![IceServer::stun(format!("stun:{}:3478", DOMAIN))],
        jitsi_domain: DOMAIN.to_string(),
        credential_source: CredentialSource::None,
    }
}

/// The fakes a scenario is assembled from; everything reachable by default
pub struct Environment {
    pub network: Arc<FakeNetwork>,
    pub media: Arc<FakeMedia>,
    pub signaling: Arc<FakeSignaling>,
    pub api: Arc<FakeApi>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            network: Arc::new(FakeNetwork::default()),
            media: Arc::new(FakeMedia::default()),
            signaling: Arc::new(FakeSignaling::default()),
            api: Arc::new(FakeApi::new(Some(prosody_credentials()))),
        }
    }
}

impl Environment {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            peers: self.network.clone(),
            media: self.media.clone(),
            signaling: self.signaling.clone(),
            api: self.api.clone(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(TestCatalog::standard())
    }

    pub fn orchestrator_with(&self, catalog: TestCatalog) -> Orchestrator {
        Orchestrator::new(catalog, Prober::new(self.capabilities(), test_config()))
    }

    /// Standard catalog against `config` instead of [`test_config`]
    pub fn orchestrator_for(&self, config: DiagConfig) -> Orchestrator {
        Orchestrator::new(TestCatalog::standard(), Prober::new(self.capabilities(), config))
    }
}
