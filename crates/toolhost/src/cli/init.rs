use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to scaffold into (created if missing).
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

const EXAMPLE_TOOL: &str = r#"/**
 * Adds two numbers.
 */
export function add(args: { a: number; b: number }): number {
  return args.a + args.b;
}
"#;

pub async fn run(args: InitArgs, config_path: &PathBuf) -> Result<()> {
    std::fs::create_dir_all(&args.path)
        .with_context(|| format!("failed to create project directory {}", args.path.display()))?;

    let tools_dir = args.path.join("tools");
    std::fs::create_dir_all(&tools_dir)
        .with_context(|| format!("failed to create tool directory {}", tools_dir.display()))?;
    std::fs::write(tools_dir.join("example.ts"), EXAMPLE_TOOL)
        .context("failed to write example tool file")?;

    let data_dir = args.path.join("data");
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let config_file = args.path.join(config_path);
    if config_file.exists() {
        anyhow::bail!("config file already exists: {}", config_file.display());
    }
    std::fs::write(&config_file, config::starter_toml())
        .with_context(|| format!("failed to write config file {}", config_file.display()))?;

    println!("Initialised toolhost project at {}", args.path.display());
    println!("  tools:  {}", tools_dir.display());
    println!("  data:   {}", data_dir.display());
    println!("  config: {}", config_file.display());
    Ok(())
}
