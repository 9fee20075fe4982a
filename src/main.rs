mod agents;
mod cli;
mod config;
mod error;
mod files;
mod inventory;
mod oracle;
mod python;
#[cfg(test)]
mod testing;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        unsafe {
            std::env::set_var(config::VERBOSE_VAR, "1");
        }
    }

    let result = match cli.command {
        Commands::Collect { manifest, output } => workflow::execute_collect(&manifest, &output),
        Commands::Act { input, output } => workflow::execute_act(&input, &output),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
