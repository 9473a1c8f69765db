use anyhow::Context;
use clap::{Parser, Subcommand};
use grantwalk::directory::InMemoryDirectory;
use grantwalk::types::Principal;
use grantwalk::{AnyUnblockedGrantPolicy, Config};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grantwalk")]
#[command(about = "Answer permission queries against a group hierarchy")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(long)]
    pub config: Option<String>,

    /// Directory file (TOML) with groups, definitions and permission records
    #[arg(long)]
    pub directory: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether a principal holds a permission
    Check {
        /// Principal as kind.key, e.g. person.alice or group.staff
        #[arg(long)]
        principal: String,
        /// Permission owner fname
        #[arg(long)]
        owner: String,
        /// Activity fname
        #[arg(long)]
        activity: String,
        /// Target key
        #[arg(long)]
        target: Option<String>,
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load the configuration and directory and print what the directory holds
    Validate,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    principal: &'a str,
    owner: &'a str,
    activity: &'a str,
    target: Option<&'a str>,
    granted: bool,
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config {}", path))?,
        None => Config::default(),
    };
    init_logging(&config);

    let directory = Arc::new(
        InMemoryDirectory::from_file(&cli.directory)
            .with_context(|| format!("loading directory {}", cli.directory))?,
    );
    debug!(directory = %cli.directory, "Directory loaded");

    let policy = AnyUnblockedGrantPolicy::from_config(&config, directory.clone(), directory.clone());

    match cli.command {
        Commands::Check {
            principal,
            owner,
            activity,
            target,
            json,
        } => {
            let parsed: Principal = principal
                .parse()
                .with_context(|| format!("parsing principal {}", principal))?;
            let granted =
                policy.check_by_name(&*directory, &parsed, &owner, &activity, target.as_deref());

            if json {
                let output = CheckOutput {
                    principal: &principal,
                    owner: &owner,
                    activity: &activity,
                    target: target.as_deref(),
                    granted,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", if granted { "GRANT" } else { "DENY" });
            }
        }
        Commands::Validate => {
            let summary = directory.summary();
            info!(?summary, "Configuration and directory are valid");
            println!("owners:      {}", summary.owners);
            println!("activities:  {}", summary.activities);
            println!("targets:     {}", summary.targets);
            println!("memberships: {}", summary.memberships);
            println!("permissions: {}", summary.permissions);
        }
    }

    Ok(())
}
