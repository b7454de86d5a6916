#![doc = include_str!("../README.md")]

mod cli;
mod commands;

use clap::Parser;

use cli::{Cli, Commands};
use commands::helpers::{init_tracing, log_file_path, resolve_config};

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Verify {
            network,
            dataset,
            run,
            report_out,
        } => {
            let config = resolve_config(&run)?;
            let log_file = log_file_path(&cli.log_dir, &config.log_name, cli.no_log_file);
            init_tracing(log_file.as_deref())?;
            commands::verify::run_verify_command(&network, &dataset, &config, report_out)?;
        }
        Commands::Simulate { network, dataset, run } => {
            let config = resolve_config(&run)?;
            init_tracing(None)?;
            commands::simulate::run_simulate_command(&network, &dataset, &config)?;
        }
    }

    Ok(())
}
