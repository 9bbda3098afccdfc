//! Signaling frames
//!
//! JSON frames exchanged with the echo peer over the signaling socket.

use serde::{Deserialize, Serialize};

/// How the echo peer answered an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerMode {
    /// A real peer connection is negotiated and will echo data channel messages
    Werift,
    /// The relay cannot run a media peer and returned a synthetic answer
    SignalingOnly,
    #[serde(other)]
    Unknown,
}

/// Browser-style ICE candidate init dictionary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInit {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl CandidateInit {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }
}

/// Signaling message exchanged with the echo peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingFrame {
    #[serde(rename_all = "camelCase")]
    Offer { sdp: String, session_id: String },

    Answer {
        sdp: String,
        #[serde(default)]
        mode: Option<AnswerMode>,
    },

    IceCandidate { candidate: CandidateInit },

    Ping { timestamp: u64 },

    Pong { timestamp: u64 },

    Error { message: String },

    WebrtcError { message: String },
}

impl SignalingFrame {
    pub fn offer(sdp: impl Into<String>, session_id: impl Into<String>) -> Self {
        SignalingFrame::Offer {
            sdp: sdp.into(),
            session_id: session_id.into(),
        }
    }

    /// Error text carried by `error` / `webrtc-error` frames
    pub fn error_message(&self) -> Option<&str> {
        match self {
            SignalingFrame::Error { message } | SignalingFrame::WebrtcError { message } => Some(message),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
