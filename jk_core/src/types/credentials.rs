//! TURN credential payload served by the diagnostics backend

use serde::{Deserialize, Serialize};

/// Where the backend obtained the ICE server list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// Time-limited TURN credentials issued by the XMPP server
    Prosody,
    /// STUN-only fallback, no usable TURN credentials
    #[default]
    #[serde(other)]
    None,
}

/// `urls` may be a single string or a list, as in `RTCIceServer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IceUrls {
    One(String),
    Many(Vec<String>),
}

impl IceUrls {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let urls: &[String] = match self {
            IceUrls::One(url) => std::slice::from_ref(url),
            IceUrls::Many(urls) => urls,
        };
        urls.iter().map(String::as_str)
    }
}

impl From<&str> for IceUrls {
    fn from(url: &str) -> Self {
        IceUrls::One(url.to_string())
    }
}

/// STUN/TURN server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: IceUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: IceUrls::One(url.into()),
            username: None,
            credential: None,
        }
    }

    pub fn turn(url: impl Into<String>, username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            urls: IceUrls::One(url.into()),
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    pub fn contains_url(&self, fragment: &str) -> bool {
        self.urls.iter().any(|url| url.contains(fragment))
    }
}

/// Response of `GET /turn-credentials`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnCredentials {
    pub ice_servers: Vec<IceServer>,
    #[serde(default)]
    pub jitsi_domain: String,
    #[serde(default)]
    pub credential_source: CredentialSource,
}

impl TurnCredentials {
    /// True only when the backend handed out real, time-limited TURN credentials
    pub fn has_real_credentials(&self) -> bool {
        self.credential_source == CredentialSource::Prosody
    }

    /// First server with a username whose url contains `fragment`
    pub fn find_server(&self, fragment: &str) -> Option<&IceServer> {
        self.ice_servers
            .iter()
            .find(|s| s.username.is_some() && s.contains_url(fragment))
    }
}
