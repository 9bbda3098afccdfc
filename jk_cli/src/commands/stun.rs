use anyhow::Result;
use colored::Colorize;
use jk_probe::StunServer;

pub async fn run(bind: &str) -> Result<()> {
    let mut server = StunServer::new(bind).await?;
    let addr = server.local_addr()?;

    println!("{} {}", "STUN responder listening on".bold(), addr.to_string().cyan());
    server.start();

    println!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    println!("Shutting down...");
    server.stop();

    Ok(())
}
