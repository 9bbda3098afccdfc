pub mod catalog;
pub mod config;
pub mod results;
pub mod run;
pub mod stun;

use crate::BackendArgs;
use anyhow::{Context, Result};
use jk_probe::DiagConfig;

/// Command-line flags over the config file over the defaults
pub fn load_config(backend: &BackendArgs, organization: Option<String>) -> Result<DiagConfig> {
    let mut config = match &backend.config {
        Some(path) => DiagConfig::load(path).with_context(|| format!("loading {}", path))?,
        None => DiagConfig::default(),
    };

    if let Some(api_base) = &backend.api_base {
        config.api_base = api_base.clone();
    }
    if let Some(domain) = &backend.jitsi_domain {
        config.jitsi_domain = Some(domain.clone());
    }
    if organization.is_some() {
        config.organization = organization;
    }

    config.validate()?;
    Ok(config)
}
