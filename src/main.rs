//! Ganesha Pilot - command-line entry point

mod cli;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use cli::{Cli, Commands};
use ganesha_pilot::{AgentLoop, PilotConfig, WindowLocator, XdotoolWindowSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q
    let default_level = if cli.verbose {
        "ganesha_pilot=debug"
    } else if cli.quiet {
        "ganesha_pilot=warn"
    } else {
        "ganesha_pilot=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = PilotConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Run {
            target,
            max_events,
            dry_run,
        } => {
            if let Some(target) = target {
                config.agent.target = target;
            }
            if let Some(n) = max_events {
                config.agent.max_events = n;
            }
            if dry_run {
                config.dispatcher.dry_run = true;
            }
            config.validate().context("invalid configuration")?;

            let agent = AgentLoop::from_config(&config)?;
            let summary = agent.run(&config.agent.target, config.agent.max_events).await;
            println!("{}", summary);
        }
        Commands::Locate { target } => {
            let target = target.unwrap_or_else(|| config.agent.target.clone());
            let locator = WindowLocator::new(Box::new(XdotoolWindowSource::new()));
            match locator.locate(&target).await? {
                Some(window) => println!(
                    "{} ({}) at {}",
                    window.title, window.owner_name, window.bounds
                ),
                None => println!("'{}' not found in the foreground", target),
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
