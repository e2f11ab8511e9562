use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use toolhost_extract::extract_source;
use toolhost_index::ToolIndex;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// What to print.
    #[arg(value_enum, default_value_t = DiscoverKind::Catalogue)]
    pub kind: DiscoverKind,

    /// Scan the tool directories directly instead of asking a running
    /// server (no network round trip, but reflects disk state only).
    #[arg(long)]
    pub cold: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DiscoverKind {
    Catalogue,
    Types,
}

pub async fn run(args: DiscoverArgs, config: &Config) -> Result<()> {
    if args.cold {
        return run_cold(args, config);
    }

    let base = format!("http://127.0.0.1:{}", config.port);
    let path = match args.kind {
        DiscoverKind::Catalogue => "/namespaces",
        DiscoverKind::Types => "/types",
    };
    let url = format!("{base}{path}");
    let body = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach toolhost server at {url}"))?
        .text()
        .await
        .context("failed to read server response")?;
    println!("{body}");
    Ok(())
}

fn run_cold(args: DiscoverArgs, config: &Config) -> Result<()> {
    let mut index = ToolIndex::new(config.user_tool_dir(), config.tool_dir.clone());
    index.reconcile().context("failed to scan tool directories")?;

    let mut extractions = Vec::new();
    for file in index.files().values() {
        let source = std::fs::read_to_string(&file.path)
            .with_context(|| format!("failed to read tool file {}", file.path.display()))?;
        match extract_source(&file.name, &source) {
            Ok(result) => {
                for w in &result.warnings {
                    eprintln!("warning: {}:{}: {}", file.name, w.line, w.message);
                }
                extractions.push(result);
            }
            Err(err) => eprintln!("warning: failed to extract {}: {err}", file.name),
        }
    }

    let namespaces = toolhost_synth::local_namespaces(&extractions);
    let output = match args.kind {
        DiscoverKind::Catalogue => toolhost_synth::build_catalogue(&namespaces),
        DiscoverKind::Types => toolhost_synth::build_types_document(&namespaces),
    };
    println!("{output}");
    Ok(())
}
