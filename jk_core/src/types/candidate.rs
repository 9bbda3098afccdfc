//! ICE candidate descriptors
//!
//! Candidates arrive as SDP attribute strings
//! (`candidate:1 1 udp 2122260223 192.168.1.4 54321 typ host`). They are
//! parsed once at the boundary so that probes classify on [`CandidateType`]
//! instead of matching substrings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ICE candidate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateType {
    /// Host candidate (local interface address)
    Host,
    /// Server reflexive (STUN-discovered public address)
    Srflx,
    /// Relay (TURN allocation)
    Relay,
    /// Peer reflexive or anything else
    Other,
}

impl CandidateType {
    pub fn label(self) -> &'static str {
        match self {
            CandidateType::Host => "host",
            CandidateType::Srflx => "srflx",
            CandidateType::Relay => "relay",
            CandidateType::Other => "other",
        }
    }

    fn from_typ(typ: &str) -> Self {
        match typ {
            "host" => CandidateType::Host,
            "srflx" => CandidateType::Srflx,
            "relay" => CandidateType::Relay,
            _ => CandidateType::Other,
        }
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CandidateParseError {
    #[error("empty candidate descriptor")]
    Empty,

    #[error("missing field `{0}` in candidate descriptor")]
    MissingField(&'static str),

    #[error("invalid {field} `{value}` in candidate descriptor")]
    InvalidField { field: &'static str, value: String },
}

/// Parsed ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub foundation: String,
    /// Component ID (1 = RTP, 2 = RTCP)
    pub component: u16,
    pub protocol: String,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    pub candidate_type: CandidateType,
    /// Related address (for srflx/relay)
    pub related_address: Option<String>,
    pub related_port: Option<u16>,
}

impl Candidate {
    /// Parse an SDP candidate attribute, with or without the `a=` and
    /// `candidate:` prefixes.
    pub fn parse(descriptor: &str) -> Result<Self, CandidateParseError> {
        let trimmed = descriptor.trim();
        let trimmed = trimmed.strip_prefix("a=").unwrap_or(trimmed);
        let trimmed = trimmed.strip_prefix("candidate:").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(CandidateParseError::Empty);
        }

        let mut parts = trimmed.split_whitespace();
        let foundation = parts
            .next()
            .ok_or(CandidateParseError::MissingField("foundation"))?
            .to_string();
        let component = parse_field(parts.next(), "component")?;
        let protocol = parts
            .next()
            .ok_or(CandidateParseError::MissingField("protocol"))?
            .to_ascii_lowercase();
        let priority = parse_field(parts.next(), "priority")?;
        let address = parts
            .next()
            .ok_or(CandidateParseError::MissingField("address"))?
            .to_string();
        let port = parse_field(parts.next(), "port")?;

        let mut candidate_type = None;
        let mut related_address = None;
        let mut related_port = None;

        // Remaining tokens are key/value pairs (typ, raddr, rport, generation, ...)
        while let Some(key) = parts.next() {
            let value = parts.next();
            match (key, value) {
                ("typ", Some(v)) => candidate_type = Some(CandidateType::from_typ(v)),
                ("raddr", Some(v)) => related_address = Some(v.to_string()),
                ("rport", v) => related_port = Some(parse_field(v, "rport")?),
                _ => {}
            }
        }

        Ok(Self {
            foundation,
            component,
            protocol,
            priority,
            address,
            port,
            candidate_type: candidate_type.ok_or(CandidateParseError::MissingField("typ"))?,
            related_address,
            related_port,
        })
    }

    /// Convert back to SDP candidate attribute form
    pub fn to_sdp(&self) -> String {
        let mut sdp = format!(
            "candidate:{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.protocol,
            self.priority,
            self.address,
            self.port,
            match self.candidate_type {
                CandidateType::Other => "prflx",
                other => other.label(),
            }
        );

        if let (Some(addr), Some(port)) = (&self.related_address, self.related_port) {
            sdp.push_str(&format!(" raddr {} rport {}", addr, port));
        }

        sdp
    }
}

impl FromStr for Candidate {
    type Err = CandidateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Candidate::parse(s)
    }
}

fn parse_field<T: FromStr>(token: Option<&str>, field: &'static str) -> Result<T, CandidateParseError> {
    let value = token.ok_or(CandidateParseError::MissingField(field))?;
    value.parse().map_err(|_| CandidateParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Per-type tally of a gathering run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCounts {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

impl CandidateCounts {
    pub fn add(&mut self, candidate_type: CandidateType) {
        match candidate_type {
            CandidateType::Host => self.host += 1,
            CandidateType::Srflx => self.srflx += 1,
            CandidateType::Relay => self.relay += 1,
            CandidateType::Other => {}
        }
    }

    pub fn total(&self) -> usize {
        self.host + self.srflx + self.relay
    }

    pub fn detail(&self) -> String {
        format!("host:{} srflx:{} relay:{}", self.host, self.srflx, self.relay)
    }
}
