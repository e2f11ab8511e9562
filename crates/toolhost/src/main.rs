mod cli;
mod config;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use config::Config;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = toolhost_logging::init_logging(toolhost_logging::LogConfig {
        app_name: "toolhost",
        verbose: cli.verbose,
        quiet_console: false,
    }) {
        eprintln!("warning: failed to initialise logging: {e:?}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:?}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init(args) => cli::init::run(args, &cli.config).await,
        Commands::Serve(args) => {
            let config = Config::load(&cli.config)?;
            cli::serve::run(args, config).await
        }
        Commands::Run(args) => {
            let config = Config::load(&cli.config)?;
            cli::run::run(args, &config).await
        }
        Commands::Discover(args) => {
            let config = Config::load(&cli.config)?;
            cli::discover::run(args, &config).await
        }
        Commands::Status(args) => {
            let config = Config::load(&cli.config)?;
            cli::status::run(args, &config).await
        }
    }
}
