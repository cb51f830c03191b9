mod agents;
mod cli;
mod error;
mod registry;
mod repository;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use repository::ResolverConfig;
use std::process;
use std::time::Duration;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        utils::verbose::enable();
    }

    let config = ResolverConfig {
        std_version: cli.std_version,
        timeout: Duration::from_secs(cli.timeout),
        ..ResolverConfig::default()
    };

    let result = match cli.command {
        Commands::Check { manifest, modules } => {
            workflow::execute_check(&manifest, &modules, config)
        }
        Commands::Update { args } => {
            let (manifest, modules) = cli::split_update_args(&args);
            workflow::execute_update(&manifest, &modules, config)
        }
        Commands::Info { manifest, module } => {
            workflow::execute_info(&manifest, module.as_deref(), config)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
