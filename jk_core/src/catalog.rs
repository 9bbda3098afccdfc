//! Test catalog
//!
//! The set of tests a run executes, grouped by layer. The catalog is a plain
//! value so alternative catalogs can be supplied by callers and tests.

use crate::types::result::{Category, Layer, TestDefinition};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate test id `{0}`")]
    DuplicateId(String),

    #[error("layer {0} appears out of order")]
    LayerOutOfOrder(u8),

    #[error("catalog contains no tests")]
    Empty,
}

/// Ordered tests of a single layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDefinitions {
    pub layer: Layer,
    pub tests: Vec<TestDefinition>,
}

impl LayerDefinitions {
    pub fn new(layer: Layer, tests: Vec<TestDefinition>) -> Self {
        Self { layer, tests }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCatalog {
    pub layers: Vec<LayerDefinitions>,
}

impl TestCatalog {
    pub fn new(layers: Vec<LayerDefinitions>) -> Result<Self, CatalogError> {
        let catalog = Self { layers };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The 18-test catalog for a Jitsi deployment
    pub fn standard() -> Self {
        use Category::*;
        let def = TestDefinition::new;

        Self {
            layers: vec![
                LayerDefinitions::new(
                    Layer::DEVICES,
                    vec![
                        def("webrtc-support", "WebRTC support", Critical),
                        def("camera-mic", "Camera & microphone", Important),
                        def("device-enum", "Device enumeration", Nice),
                    ],
                ),
                LayerDefinitions::new(
                    Layer::NETWORK,
                    vec![
                        def("stun", "STUN (UDP 3478)", Critical),
                        def("turn-udp-3478", "TURN UDP 3478", Important),
                        def("turn-tls-5349", "TURN TLS 5349", Nice),
                        def("turn-tcp-4443", "TURN TCP 4443", Nice),
                        def("turn-443-sni", "TURN 443 (SNI)", Important),
                        def("turn-tls-443-ext", "TURN TLS 443 (external)", Nice),
                        def("udp-10000", "UDP 10000 (media)", Important),
                    ],
                ),
                LayerDefinitions::new(
                    Layer::SESSION,
                    vec![
                        def("ice-candidates", "ICE candidates", Critical),
                        def("peer-connection", "Peer connection", Critical),
                        def("data-channel", "Data channel", Important),
                    ],
                ),
                LayerDefinitions::new(
                    Layer::SERVICE,
                    vec![
                        def("jitsi-https", "Jitsi HTTPS", Critical),
                        def("jitsi-websocket", "Jitsi WebSocket", Important),
                    ],
                ),
                LayerDefinitions::new(
                    Layer::QUALITY,
                    vec![
                        def("bandwidth", "Bandwidth", Nice),
                        def("latency", "Latency", Nice),
                        def("jitter", "Jitter", Nice),
                    ],
                ),
            ],
        }
    }

    pub fn total_tests(&self) -> usize {
        self.layers.iter().map(|l| l.tests.len()).sum()
    }

    pub fn layer(&self, layer: Layer) -> Option<&LayerDefinitions> {
        self.layers.iter().find(|l| l.layer == layer)
    }

    pub fn find(&self, id: &str) -> Option<(Layer, &TestDefinition)> {
        self.layers
            .iter()
            .find_map(|l| l.tests.iter().find(|t| t.id == id).map(|t| (l.layer, t)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Layer, &TestDefinition)> {
        self.layers
            .iter()
            .flat_map(|l| l.tests.iter().map(move |t| (l.layer, t)))
    }

    /// Ids must be unique and layers strictly ascending
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.total_tests() == 0 {
            return Err(CatalogError::Empty);
        }

        let mut previous: Option<Layer> = None;
        for l in &self.layers {
            if previous.map_or(false, |p| l.layer <= p) {
                return Err(CatalogError::LayerOutOfOrder(l.layer.number()));
            }
            previous = Some(l.layer);
        }

        let mut seen = std::collections::HashSet::new();
        for (_, test) in self.iter() {
            if !seen.insert(test.id.as_str()) {
                return Err(CatalogError::DuplicateId(test.id.clone()));
            }
        }

        Ok(())
    }
}

impl Default for TestCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
