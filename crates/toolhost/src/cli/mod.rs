pub mod discover;
pub mod init;
pub mod run;
pub mod serve;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "toolhost", about = "Sandboxed RPC runtime for LLM-authored scripts")]
pub struct Cli {
    /// Path to the project config file.
    #[arg(short = 'c', long, global = true, default_value = "toolhost.toml")]
    pub config: PathBuf,

    /// Enable verbose (debug) logging to stderr.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a project: config file, example tool file, data directory.
    Init(init::InitArgs),
    /// Start the server: worker supervisor, MCP bridge, duplex endpoint.
    Serve(serve::ServeArgs),
    /// Submit an inline script to a running server and print its output.
    Run(run::RunArgs),
    /// Print the namespace catalogue or types document.
    Discover(discover::DiscoverArgs),
    /// Print supervisor/worker health.
    Status(status::StatusArgs),
}
