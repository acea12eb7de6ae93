//! Slipway CLI - build and verify a package from a recipe

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use slipway::util::diagnostic::emit;
use slipway::RecipeError;

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli, color) {
        match e.downcast_ref::<RecipeError>() {
            Some(err) => emit(&err.to_diagnostic(), color),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, color: bool) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("slipway=debug")
    } else {
        EnvFilter::new("slipway=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.verbose, color),
        Commands::Plan(args) => commands::plan::execute(args),
        Commands::Verify(args) => commands::verify::execute(args, cli.verbose, color),
        Commands::Deps(args) => commands::deps::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
