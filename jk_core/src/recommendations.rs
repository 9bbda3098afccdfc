//! Remediation advice for non-passing tests

use crate::types::result::{Category, Status, TestResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn for_result(result: &TestResult) -> Self {
        if result.category == Category::Critical {
            Severity::Critical
        } else if result.status == Status::Fail {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub test_id: String,
    pub test_name: String,
    pub severity: Severity,
    pub message: String,
}

/// Advice for one test, per non-passing status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn: Option<String>,
}

impl Advice {
    fn for_status(&self, status: Status) -> Option<&str> {
        match status {
            Status::Fail => self.fail.as_deref(),
            Status::Warn => self.warn.as_deref(),
            Status::Pass => None,
        }
    }
}

/// Test id -> advice lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendationTable {
    entries: HashMap<String, Advice>,
}

impl RecommendationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, fail: Option<&str>, warn: Option<&str>) -> Self {
        self.entries.insert(
            id.to_string(),
            Advice {
                fail: fail.map(str::to_string),
                warn: warn.map(str::to_string),
            },
        );
        self
    }

    pub fn get(&self, id: &str) -> Option<&Advice> {
        self.entries.get(id)
    }

    pub fn message(&self, id: &str, status: Status) -> Option<&str> {
        self.get(id).and_then(|advice| advice.for_status(status))
    }

    /// Advice for every test of the standard catalog
    pub fn standard() -> Self {
        Self::new()
            .with(
                "webrtc-support",
                Some("WebRTC is not available in this environment. Use a current Chrome, Firefox or Edge."),
                None,
            )
            .with(
                "camera-mic",
                Some("Camera or microphone could not be opened. Check that the devices are connected and not used by another application."),
                Some("Camera or microphone needs permission. Grant access when prompted."),
            )
            .with(
                "device-enum",
                Some("No audio or video devices were found. Check that a camera and microphone are connected."),
                None,
            )
            .with(
                "stun",
                Some("STUN traffic is blocked. Ask IT to open outbound UDP 3478 to the Jitsi server."),
                None,
            )
            .with(
                "turn-udp-3478",
                Some("TURN over UDP is blocked. Open outbound UDP 3478 to the Jitsi server."),
                Some("TURN over UDP 3478 could not be verified. The TURN server is reachable via STUN."),
            )
            .with(
                "turn-tls-5349",
                Some("TURN server unreachable. Ask IT to open outbound UDP 3478 to the Jitsi server."),
                Some("TURN TLS port 5349 could not be verified. The TURN server is reachable via STUN."),
            )
            .with(
                "turn-tcp-4443",
                Some("TURN server unreachable. Ask IT to open outbound traffic to the Jitsi server."),
                Some("TURN TCP port 4443 could not be verified. The TURN server is reachable via STUN."),
            )
            .with(
                "turn-443-sni",
                Some("TURN server unreachable. Ask IT to open outbound traffic to the Jitsi server."),
                Some("TURN via port 443 (SNI routing) could not be verified. The TURN server is reachable via STUN."),
            )
            .with(
                "turn-tls-443-ext",
                Some("External STUN via port 443 is blocked. Ask IT to allow traffic to meet-jit-si-turnrelay.jitsi.net:443."),
                None,
            )
            .with(
                "udp-10000",
                Some("Media port UDP 10000 is blocked. Video quality will suffer. Open outbound UDP 10000 to the Jitsi server."),
                Some("UDP 10000 appears restricted. Video quality may suffer."),
            )
            .with(
                "ice-candidates",
                Some("No ICE candidates could be gathered. Both STUN and TURN are blocked."),
                None,
            )
            .with(
                "peer-connection",
                Some("The WebRTC connection failed completely. Both UDP and TURN are blocked. See the whitelist guide."),
                Some("The WebRTC connection worked partially. Some fallback paths may be in use."),
            )
            .with(
                "data-channel",
                Some("The data channel could not be opened. The WebRTC connection is unstable."),
                None,
            )
            .with(
                "jitsi-websocket",
                Some("WebSocket signaling is blocked. A proxy is probably terminating WebSocket upgrades. Whitelist the Jitsi server."),
                Some("The WebSocket handshake failed while HTTPS works. Check that the proxy allows WebSocket upgrades."),
            )
            .with(
                "jitsi-https",
                Some("HTTPS access to the Jitsi server is blocked. Check that port 443 is open to the Jitsi server."),
                None,
            )
            .with(
                "bandwidth",
                Some("Bandwidth is too low for video (<0.5 Mbps). Check the network connection."),
                Some("Bandwidth is low (<2 Mbps). Video quality may be limited."),
            )
            .with(
                "latency",
                Some("Latency is very high (>300 ms). Real-time communication will work poorly."),
                Some("Latency is high (>100 ms). Calls may feel delayed."),
            )
            .with(
                "jitter",
                Some("Latency varies heavily (jitter above 100 ms) or could not be measured. Audio and video will be choppy."),
                Some("Latency varies (jitter). Audio and video may be choppy."),
            )
    }
}

/// Recommendations for every non-passing result, critical first
pub fn get_recommendations(results: &[TestResult], table: &RecommendationTable) -> Vec<Recommendation> {
    let mut recs: Vec<Recommendation> = results
        .iter()
        .filter(|r| r.status != Status::Pass)
        .filter_map(|r| {
            table.message(&r.id, r.status).map(|msg| Recommendation {
                test_id: r.id.clone(),
                test_name: r.name.clone(),
                severity: Severity::for_result(r),
                message: msg.to_string(),
            })
        })
        .collect();

    // sort_by_key is stable, so ledger order is kept within a severity
    recs.sort_by_key(|r| r.severity);
    recs
}
