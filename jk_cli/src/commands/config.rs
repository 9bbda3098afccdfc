use anyhow::Result;
use colored::Colorize;
use jk_probe::{ConfigError, DiagConfig};

pub fn generate(output: &str) -> Result<()> {
    println!("{}", "Generating default configuration...".bold());

    DiagConfig::default().save(output)?;

    println!("{} {}", "✓ Configuration saved to:".green(), output.cyan());
    Ok(())
}

pub fn validate(file: &str) -> Result<()> {
    println!("{} {}", "Validating configuration:".bold(), file.cyan());

    match DiagConfig::load(file) {
        Ok(_) => {
            println!("{} Configuration is valid", "✓".green());
            Ok(())
        }
        Err(ConfigError::Invalid(problems)) => {
            for problem in &problems {
                println!("{} {}", "✗".red(), problem);
            }
            anyhow::bail!("Configuration validation failed");
        }
        Err(e) => Err(e.into()),
    }
}

pub fn show(file: Option<&str>) -> Result<()> {
    let config = match file {
        Some(path) => DiagConfig::load(path)?,
        None => DiagConfig::default(),
    };

    println!("{}", "Current Configuration".bold().green());
    println!("{}", "=".repeat(50));

    println!("API base: {}", config.api_base.cyan());
    match &config.jitsi_domain {
        Some(domain) => println!("Jitsi domain: {}", domain.cyan()),
        None => println!("Jitsi domain: {} {}", config.domain().cyan(), "(unless the backend reports one)".dimmed()),
    }
    println!("Organization: {}", config.organization.as_deref().unwrap_or("-").yellow());
    println!("Signaling: {}", config.signaling_url().cyan());
    println!("STUN: {}", config.stun_url().cyan());
    println!("External STUN: {}", config.external_stun_url.cyan());
    println!("JVB STUN: {}", config.jvb_stun_url().cyan());
    println!("XMPP WebSocket: {}", config.xmpp_websocket_url().cyan());

    let t = &config.timeouts;
    println!("{}", "Timeouts".bold());
    for (name, value) in [
        ("ICE", t.ice),
        ("Relay", t.relay),
        ("Gathering", t.gathering),
        ("Session", t.session),
        ("HTTPS", t.https),
        ("WebSocket", t.websocket),
        ("Quality", t.quality),
        ("API", t.api),
    ] {
        println!("  {}: {} ms", name, value.as_millis().to_string().yellow());
    }

    Ok(())
}
