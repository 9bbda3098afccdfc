use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::process::ExitCode;

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "jitsi-kollen")]
#[command(about = "Connectivity diagnostics for Jitsi Meet deployments", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Where to find the diagnostics backend
#[derive(Args, Clone, Default)]
pub struct BackendArgs {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Diagnostics API base URL, e.g. https://meet.example.org/api
    #[arg(long, env = "JK_API_BASE")]
    api_base: Option<String>,

    /// Jitsi Meet host under test, by default the one the backend reports
    #[arg(long, env = "JK_JITSI_DOMAIN")]
    jitsi_domain: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all five test layers against the deployment
    Run {
        #[command(flatten)]
        backend: BackendArgs,

        /// Organization name stored with the results
        #[arg(long, env = "JK_ORG")]
        org: Option<String>,

        /// Print the report as JSON instead of tables
        #[arg(long)]
        json: bool,

        /// Do not upload the results
        #[arg(long)]
        no_save: bool,
    },

    /// Score a saved results file
    Score {
        /// JSON file with a result list, a run report or a stored result
        file: String,

        #[arg(long)]
        json: bool,
    },

    /// Fetch and display a stored result
    Show {
        /// Result id returned when the run was saved
        id: String,

        #[command(flatten)]
        backend: BackendArgs,

        #[arg(long)]
        json: bool,
    },

    /// Show aggregate statistics of all stored runs
    Stats {
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// List the tests of every layer
    Catalog,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Answer STUN binding requests (the media port endpoint)
    StunResponder {
        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:10000")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default configuration
    Generate {
        /// Output file
        #[arg(short, long, default_value = "jitsi-kollen.yaml")]
        output: String,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        file: String,
    },

    /// Show the effective configuration, including derived URLs
    Show {
        /// Config file, defaults are shown without one
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = jk_probe::logging::level_for_verbosity(cli.verbose);
    match cli.log_format {
        LogFormat::Pretty => jk_probe::logging::init_dev_logging(level),
        LogFormat::Json => jk_probe::logging::init_prod_logging(level),
    }

    match cli.command {
        Commands::Run {
            backend,
            org,
            json,
            no_save,
        } => {
            return commands::run::run(&backend, org, json, no_save).await;
        }
        Commands::Score { file, json } => {
            return commands::results::score(&file, json);
        }
        Commands::Show { id, backend, json } => {
            return commands::results::show(&id, &backend, json).await;
        }
        Commands::Stats { backend } => {
            commands::results::stats(&backend).await?;
        }
        Commands::Catalog => {
            commands::catalog::list();
        }
        Commands::Config { action } => match action {
            ConfigAction::Generate { output } => {
                commands::config::generate(&output)?;
            }
            ConfigAction::Validate { file } => {
                commands::config::validate(&file)?;
            }
            ConfigAction::Show { file } => {
                commands::config::show(file.as_deref())?;
            }
        },
        Commands::StunResponder { bind } => {
            commands::stun::run(&bind).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
