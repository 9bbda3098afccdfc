use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Outcome of a single diagnostic test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Warn,
    Fail,
}

impl Status {
    /// Contribution of this outcome to a layer score
    pub fn score(self) -> f64 {
        match self {
            Status::Pass => 1.0,
            Status::Warn => 0.5,
            Status::Fail => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Warn => "warn",
            Status::Fail => "fail",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a test matters for meeting readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Critical,
    Important,
    Nice,
}

impl Category {
    /// Weight of a test of this category inside its layer
    pub fn weight(self) -> f64 {
        match self {
            Category::Critical => 2.0,
            Category::Important => 1.5,
            Category::Nice => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Critical => "critical",
            Category::Important => "important",
            Category::Nice => "nice",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the five test phases, always in `1..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Layer(u8);

impl Layer {
    pub const DEVICES: Layer = Layer(1);
    pub const NETWORK: Layer = Layer(2);
    pub const SESSION: Layer = Layer(3);
    pub const SERVICE: Layer = Layer(4);
    pub const QUALITY: Layer = Layer(5);

    /// All layers in execution order
    pub const ALL: [Layer; 5] = [
        Layer::DEVICES,
        Layer::NETWORK,
        Layer::SESSION,
        Layer::SERVICE,
        Layer::QUALITY,
    ];

    pub fn new(n: u8) -> Option<Self> {
        (1..=5).contains(&n).then_some(Layer(n))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn title(self) -> &'static str {
        match self.0 {
            1 => "Browser & devices",
            2 => "Network transport",
            3 => "WebRTC session",
            4 => "Service-specific",
            _ => "Quality",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layer {}: {}", self.0, self.title())
    }
}

impl Serialize for Layer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let n = u8::deserialize(deserializer)?;
        Layer::new(n).ok_or_else(|| serde::de::Error::custom(format!("layer {} out of range 1-5", n)))
    }
}

/// Static description of a test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: String,
    pub name: String,
    pub category: Category,
}

impl TestDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
        }
    }
}

/// Recorded outcome of one test in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub layer: Layer,
    pub category: Category,
    pub status: Status,
    #[serde(default)]
    pub detail: String,
}

impl TestResult {
    pub fn new(layer: Layer, def: &TestDefinition, status: Status, detail: impl Into<String>) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            layer,
            category: def.category,
            status,
            detail: detail.into(),
        }
    }

    pub fn is_critical_fail(&self) -> bool {
        self.category == Category::Critical && self.status == Status::Fail
    }
}

/// Aggregate status of a group of results: fail beats warn beats pass.
pub fn aggregate_status<'a, I>(results: I) -> Status
where
    I: IntoIterator<Item = &'a TestResult>,
{
    let mut status = Status::Pass;
    for r in results {
        match r.status {
            Status::Fail => return Status::Fail,
            Status::Warn => status = Status::Warn,
            Status::Pass => {}
        }
    }
    status
}
