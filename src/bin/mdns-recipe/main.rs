//! mdns-recipe CLI - build and package mDNSResponder

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use mdns_recipe::RecipeError;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        if let Some(help) = e
            .downcast_ref::<RecipeError>()
            .and_then(|re| miette::Diagnostic::help(re))
        {
            eprintln!("help: {}", help);
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("mdns_recipe=debug")
        } else if cli.quiet {
            EnvFilter::new("mdns_recipe=warn")
        } else {
            EnvFilter::new("mdns_recipe=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let quiet = cli.quiet;

    // Execute command
    match cli.command {
        Commands::Create(args) => commands::create::execute(args, quiet),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Source(args) => commands::source::execute(args, quiet),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Versions(args) => commands::versions::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
