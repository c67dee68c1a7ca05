//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    if cli.no_color {
        colored::control::set_override(false);
    }

    let ctx = commands::Context {
        config: cli.config,
        output_format: cli.output.unwrap_or_default(),
    };

    match cli.command {
        Commands::Run => commands::run::execute(ctx).await,
        Commands::Check => commands::check::execute(ctx).await,
        Commands::Eval(args) => commands::eval::execute(&ctx, &args),
        Commands::Validate => commands::validate::execute(&ctx),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let directive = if verbose { "dnswatch=debug" } else { "dnswatch=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
