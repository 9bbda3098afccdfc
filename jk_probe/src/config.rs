use jk_core::types::credentials::TurnCredentials;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Probe timeouts, stored as milliseconds in YAML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// STUN-type ICE probes
    #[serde(rename = "ice_ms", with = "duration_ms")]
    pub ice: Duration,
    /// Relay-only TURN probes
    #[serde(rename = "relay_ms", with = "duration_ms")]
    pub relay: Duration,
    /// Full candidate gathering
    #[serde(rename = "gathering_ms", with = "duration_ms")]
    pub gathering: Duration,
    /// Peer connection and data channel sessions
    #[serde(rename = "session_ms", with = "duration_ms")]
    pub session: Duration,
    #[serde(rename = "https_ms", with = "duration_ms")]
    pub https: Duration,
    #[serde(rename = "websocket_ms", with = "duration_ms")]
    pub websocket: Duration,
    /// Bandwidth download and the latency ping series
    #[serde(rename = "quality_ms", with = "duration_ms")]
    pub quality: Duration,
    /// Calls to the diagnostics backend (credentials, results)
    #[serde(rename = "api_ms", with = "duration_ms")]
    pub api: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ice: Duration::from_secs(8),
            relay: Duration::from_secs(10),
            gathering: Duration::from_secs(12),
            session: Duration::from_secs(15),
            https: Duration::from_secs(8),
            websocket: Duration::from_secs(8),
            quality: Duration::from_secs(30),
            api: Duration::from_secs(10),
        }
    }
}

impl Timeouts {
    fn named(&self) -> [(&'static str, Duration); 8] {
        [
            ("ice", self.ice),
            ("relay", self.relay),
            ("gathering", self.gathering),
            ("session", self.session),
            ("https", self.https),
            ("websocket", self.websocket),
            ("quality", self.quality),
            ("api", self.api),
        ]
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Diagnostics configuration
///
/// URLs left unset are derived from `api_base` and the Jitsi domain. An
/// unset domain is taken from the credential response, or failing that
/// from the `api_base` host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagConfig {
    /// Diagnostics backend, e.g. `https://diag.example.org/api`
    pub api_base: String,
    /// Echo-peer signaling socket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signaling_url: Option<String>,
    /// Jitsi Meet deployment under test
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitsi_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stun_url: Option<String>,
    /// Third-party STUN on 443, used to tell a local block from a server fault
    pub external_stun_url: String,
    /// STUN responder on the media port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jvb_stun_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmpp_websocket_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub timeouts: Timeouts,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            api_base: "https://meet.example.org/api".to_string(),
            signaling_url: None,
            jitsi_domain: None,
            stun_url: None,
            external_stun_url: "stun:meet-jit-si-turnrelay.jitsi.net:443".to_string(),
            jvb_stun_url: None,
            xmpp_websocket_url: None,
            organization: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl DiagConfig {
    pub fn builder() -> DiagConfigBuilder {
        DiagConfigBuilder::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DiagConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All problems found, empty when the configuration is usable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        match Url::parse(&self.api_base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => problems.push(format!("api_base must be http(s), got `{}`", url.scheme())),
            Err(e) => problems.push(format!("api_base `{}` is not a URL: {}", self.api_base, e)),
        }

        if let Some(domain) = &self.jitsi_domain {
            if let Err(problem) = check_domain(domain) {
                problems.push(problem);
            }
        }

        if let Some(url) = &self.signaling_url {
            check_scheme(&mut problems, "signaling_url", url, &["ws", "wss"]);
        }
        if let Some(url) = &self.xmpp_websocket_url {
            check_scheme(&mut problems, "xmpp_websocket_url", url, &["ws", "wss"]);
        }
        for (name, url) in [
            ("stun_url", self.stun_url.as_deref()),
            ("jvb_stun_url", self.jvb_stun_url.as_deref()),
            ("external_stun_url", Some(self.external_stun_url.as_str())),
        ] {
            if let Some(url) = url {
                if !url.starts_with("stun:") && !url.starts_with("stuns:") {
                    problems.push(format!("{} `{}` must start with stun:", name, url));
                }
            }
        }

        for (name, value) in self.timeouts.named() {
            if value.is_zero() {
                problems.push(format!("timeouts.{} must be greater than zero", name));
            }
        }

        problems
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    fn api_host(&self) -> Option<String> {
        Url::parse(&self.api_base)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Configured domain, else the `api_base` host
    pub fn domain(&self) -> String {
        self.jitsi_domain
            .clone()
            .or_else(|| self.api_host())
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// This configuration with the backend's `jitsiDomain` filled in when
    /// none was configured. An explicit domain always wins.
    pub fn resolve(&self, credentials: Option<&TurnCredentials>) -> Cow<'_, DiagConfig> {
        let discovered = match (&self.jitsi_domain, credentials) {
            (None, Some(creds)) => creds.jitsi_domain.trim(),
            _ => return Cow::Borrowed(self),
        };
        if check_domain(discovered).is_err() {
            return Cow::Borrowed(self);
        }
        let mut config = self.clone();
        config.jitsi_domain = Some(discovered.to_string());
        Cow::Owned(config)
    }

    /// Base URL joined with an endpoint path such as `/turn-credentials`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }

    /// `wss://<api host>/ws`, keeping any path prefix in front of `/api`
    pub fn signaling_url(&self) -> String {
        if let Some(url) = &self.signaling_url {
            return url.clone();
        }
        match Url::parse(&self.api_base) {
            Ok(mut url) => {
                let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
                let prefix = url.path().trim_end_matches('/').trim_end_matches("/api").to_string();
                url.set_path(&format!("{}/ws", prefix));
                url.set_query(None);
                // http(s) -> ws(s) is always accepted for special schemes
                let _ = url.set_scheme(scheme);
                url.to_string()
            }
            Err(_) => format!("wss://{}/ws", self.domain()),
        }
    }

    pub fn stun_url(&self) -> String {
        self.stun_url
            .clone()
            .unwrap_or_else(|| format!("stun:{}:3478", self.domain()))
    }

    pub fn jvb_stun_url(&self) -> String {
        self.jvb_stun_url
            .clone()
            .unwrap_or_else(|| format!("stun:{}:10000", self.api_host().unwrap_or_else(|| self.domain())))
    }

    pub fn xmpp_websocket_url(&self) -> String {
        self.xmpp_websocket_url
            .clone()
            .unwrap_or_else(|| format!("wss://{}/xmpp-websocket", self.domain()))
    }

    pub fn jitsi_https_url(&self) -> String {
        format!("https://{}/", self.domain())
    }
}

fn check_domain(domain: &str) -> Result<(), String> {
    if domain.trim().is_empty() {
        Err("jitsi_domain must not be empty".to_string())
    } else if domain.contains('/') || domain.contains(char::is_whitespace) {
        Err(format!("jitsi_domain `{}` must be a bare host name", domain))
    } else {
        Ok(())
    }
}

fn check_scheme(problems: &mut Vec<String>, name: &str, url: &str, schemes: &[&str]) {
    match Url::parse(url) {
        Ok(u) if schemes.contains(&u.scheme()) => {}
        Ok(u) => problems.push(format!("{} must use {}, got `{}`", name, schemes.join("/"), u.scheme())),
        Err(e) => problems.push(format!("{} `{}` is not a URL: {}", name, url, e)),
    }
}

/// Builder for DiagConfig
#[derive(Debug, Default)]
pub struct DiagConfigBuilder {
    api_base: Option<String>,
    signaling_url: Option<String>,
    jitsi_domain: Option<String>,
    stun_url: Option<String>,
    external_stun_url: Option<String>,
    jvb_stun_url: Option<String>,
    xmpp_websocket_url: Option<String>,
    organization: Option<String>,
    timeouts: Option<Timeouts>,
}

impl DiagConfigBuilder {
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    pub fn signaling_url(mut self, url: impl Into<String>) -> Self {
        self.signaling_url = Some(url.into());
        self
    }

    pub fn jitsi_domain(mut self, domain: impl Into<String>) -> Self {
        self.jitsi_domain = Some(domain.into());
        self
    }

    pub fn stun_url(mut self, url: impl Into<String>) -> Self {
        self.stun_url = Some(url.into());
        self
    }

    pub fn external_stun_url(mut self, url: impl Into<String>) -> Self {
        self.external_stun_url = Some(url.into());
        self
    }

    pub fn jvb_stun_url(mut self, url: impl Into<String>) -> Self {
        self.jvb_stun_url = Some(url.into());
        self
    }

    pub fn xmpp_websocket_url(mut self, url: impl Into<String>) -> Self {
        self.xmpp_websocket_url = Some(url.into());
        self
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn build(self) -> DiagConfig {
        let default = DiagConfig::default();
        DiagConfig {
            api_base: self.api_base.unwrap_or(default.api_base),
            signaling_url: self.signaling_url.or(default.signaling_url),
            jitsi_domain: self.jitsi_domain.or(default.jitsi_domain),
            stun_url: self.stun_url.or(default.stun_url),
            external_stun_url: self.external_stun_url.unwrap_or(default.external_stun_url),
            jvb_stun_url: self.jvb_stun_url.or(default.jvb_stun_url),
            xmpp_websocket_url: self.xmpp_websocket_url.or(default.xmpp_websocket_url),
            organization: self.organization.or(default.organization),
            timeouts: self.timeouts.unwrap_or(default.timeouts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeouts.ice, Duration::from_secs(8));
        assert_eq!(config.timeouts.session, Duration::from_secs(15));
    }

    #[test]
    fn test_derived_urls() {
        let config = DiagConfig::builder()
            .api_base("https://diag.example.org/jitsi-test/api")
            .jitsi_domain("meet.example.org")
            .build();

        assert_eq!(config.signaling_url(), "wss://diag.example.org/jitsi-test/ws");
        assert_eq!(config.jvb_stun_url(), "stun:diag.example.org:10000");
        assert_eq!(config.stun_url(), "stun:meet.example.org:3478");
        assert_eq!(config.xmpp_websocket_url(), "wss://meet.example.org/xmpp-websocket");
        assert_eq!(config.jitsi_https_url(), "https://meet.example.org/");
        assert_eq!(config.api_url("/turn-credentials"), "https://diag.example.org/jitsi-test/api/turn-credentials");
    }

    #[test]
    fn test_plain_http_signaling() {
        let config = DiagConfig::builder().api_base("http://127.0.0.1:3000/api/").build();
        assert_eq!(config.signaling_url(), "ws://127.0.0.1:3000/ws");
    }

    #[test]
    fn test_explicit_urls_win() {
        let config = DiagConfig::builder()
            .signaling_url("ws://localhost:9000/echo")
            .jvb_stun_url("stun:media.example.org:10000")
            .build();
        assert_eq!(config.signaling_url(), "ws://localhost:9000/echo");
        assert_eq!(config.jvb_stun_url(), "stun:media.example.org:10000");
    }

    #[test]
    fn test_validation_collects_problems() {
        let mut config = DiagConfig::builder()
            .api_base("ftp://example.org")
            .jitsi_domain("https://meet.example.org/")
            .signaling_url("https://example.org/ws")
            .external_stun_url("turn:x:443")
            .build();
        config.timeouts.https = Duration::ZERO;

        let problems = config.problems();
        assert_eq!(problems.len(), 5, "{:?}", problems);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jk.yaml");

        let mut config = DiagConfig::builder().organization("Kommunen").build();
        config.timeouts.relay = Duration::from_millis(2500);
        config.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("relay_ms: 2500"));

        let loaded = DiagConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: DiagConfig = serde_yaml::from_str("jitsi_domain: meet.test\ntimeouts:\n  ice_ms: 500\n").unwrap();
        assert_eq!(config.jitsi_domain.as_deref(), Some("meet.test"));
        assert_eq!(config.timeouts.ice, Duration::from_millis(500));
        assert_eq!(config.timeouts.relay, Duration::from_secs(10));
        assert_eq!(config.api_base, DiagConfig::default().api_base);
    }

    fn credentials(domain: &str) -> TurnCredentials {
        TurnCredentials {
            ice_servers: Vec::new(),
            jitsi_domain: domain.to_string(),
            credential_source: Default::default(),
        }
    }

    #[test]
    fn test_domain_defaults_to_api_host() {
        let config = DiagConfig::builder().api_base("https://video.kommun.se/api").build();
        assert_eq!(config.jitsi_domain, None);
        assert_eq!(config.domain(), "video.kommun.se");
        assert_eq!(config.stun_url(), "stun:video.kommun.se:3478");
        assert_eq!(config.jitsi_https_url(), "https://video.kommun.se/");
    }

    #[test]
    fn test_resolve_adopts_backend_domain() {
        let config = DiagConfig::builder().api_base("https://diag.kommun.se/api").build();
        let creds = credentials("meet.kommun.se");

        let resolved = config.resolve(Some(&creds));
        assert_eq!(resolved.jitsi_domain.as_deref(), Some("meet.kommun.se"));
        assert_eq!(resolved.stun_url(), "stun:meet.kommun.se:3478");
        assert_eq!(resolved.xmpp_websocket_url(), "wss://meet.kommun.se/xmpp-websocket");
        // The echo peer and media port stay on the diagnostics host
        assert_eq!(resolved.signaling_url(), "wss://diag.kommun.se/ws");
        assert_eq!(resolved.jvb_stun_url(), "stun:diag.kommun.se:10000");

        assert!(matches!(config.resolve(None), Cow::Borrowed(_)));
        assert!(matches!(config.resolve(Some(&credentials(""))), Cow::Borrowed(_)));
        assert!(matches!(config.resolve(Some(&credentials("https://x/"))), Cow::Borrowed(_)));
    }

    #[test]
    fn test_explicit_domain_beats_backend() {
        let config = DiagConfig::builder().jitsi_domain("meet.example.org").build();
        let resolved = config.resolve(Some(&credentials("other.example.org")));
        assert_eq!(resolved.domain(), "meet.example.org");
    }

    #[test]
    fn test_missing_file() {
        let err = DiagConfig::load("/nonexistent/jk.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
