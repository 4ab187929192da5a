// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use sitedeploy::{DeployDefinition, Deployer};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "sitedeploy [options] [<command>]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Deployment definition to use instead of the built-in layout.
    #[arg(short, long, value_name = "path", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let definition = load_definition(self.config.as_ref())?;
        match self.command.unwrap_or(Command::Deploy) {
            Command::Deploy => run_deploy(&definition),
            Command::Check => run_check(&definition),
            Command::ShowConfig => run_show_config(&definition),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Install service unit and nginx site, then reload both (default).
    Deploy,

    /// Run preconditions and show resolved paths without changing anything.
    Check,

    /// Print the effective deployment definition.
    ShowConfig,
}

fn main() {
    let layer = fmt::layer().compact().with_target(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(layer).with(filter).init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_definition(path: Option<&PathBuf>) -> Result<DeployDefinition> {
    let Some(path) = path else {
        return Ok(DeployDefinition::default());
    };

    let data = read_to_string(path)
        .with_context(|| format!("failed to read deployment definition {:?}", path.display()))?;
    let definition: DeployDefinition = data
        .parse()
        .with_context(|| format!("invalid deployment definition {:?}", path.display()))?;

    Ok(definition)
}

fn run_deploy(definition: &DeployDefinition) -> Result<()> {
    let deployer = Deployer::system(definition);
    deployer.deploy()?;
    info!("deployment complete");

    Ok(())
}

fn run_check(definition: &DeployDefinition) -> Result<()> {
    let deployer = Deployer::system(definition);
    for line in deployer.paths().to_string().lines() {
        info!("{line}");
    }

    let preflight = deployer.check()?;
    if preflight.privileged {
        info!("all preconditions met");
    } else {
        warn!("sources are in place, but deployment must run as root");
    }

    Ok(())
}

fn run_show_config(definition: &DeployDefinition) -> Result<()> {
    print!("{definition}");
    Ok(())
}
