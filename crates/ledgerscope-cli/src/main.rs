#![deny(unsafe_code)]

//! ledgerscope CLI: discover and index plain-text ledgers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ledgerscope_config::AppConfig;
use ledgerscope_core::{Diagnostic, FileDiscoverer, KnowledgeIndex, LedgerLoader, LoadOutcome};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// ledgerscope: a knowledge index for plain-text accounting journals.
#[derive(Parser)]
#[command(name = "ledgerscope", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "ledgerscope.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the ledger files found under a directory.
    Files {
        /// Directory to scan.
        root: PathBuf,
    },

    /// Build the knowledge index for a file or directory.
    Index {
        /// Ledger file, or directory to scan.
        path: PathBuf,

        /// Print the full index as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Loaded before tracing so the configured level can seed the filter.
    let config = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config, cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();
    debug!(path = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Files { root } => cmd_files(&config, &root).await?,
        Commands::Index { path, json } => cmd_index(&config, &path, json).await?,
        Commands::Config { show } => cmd_config(&config, &cli.config, show)?,
    }

    Ok(())
}

async fn cmd_files(config: &AppConfig, root: &Path) -> Result<()> {
    let discoverer = FileDiscoverer::new(&config.discovery);
    let walk_root = root.to_path_buf();
    let discovery = tokio::task::spawn_blocking(move || discoverer.discover(&walk_root))
        .await
        .context("discovery task failed")?;

    for file in &discovery.files {
        println!("{}", file.display());
    }
    print_diagnostics(&discovery.diagnostics);
    info!(count = discovery.files.len(), "Discovery complete");
    Ok(())
}

async fn cmd_index(config: &AppConfig, path: &Path, json: bool) -> Result<()> {
    let loader = LedgerLoader::new(config);
    let outcome = if path.is_dir() {
        loader.load_workspace(path).await
    } else {
        loader.load_file(path).await
    };

    print_diagnostics(&outcome.diagnostics);
    if outcome.is_empty() && !outcome.diagnostics.is_empty() {
        bail!("nothing could be indexed under '{}'", path.display());
    }

    if json {
        println!("{}", outcome.index.to_json_pretty()?);
    } else {
        print!("{}", render_summary(&outcome));
    }
    Ok(())
}

fn cmd_config(config: &AppConfig, config_path: &Path, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render configuration")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path)
            .await
            .with_context(|| format!("invalid configuration '{}'", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}

/// `-v` and `-vv` override the configured level.
fn filter_directive(config: &AppConfig, verbose: u8) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
    }
}

fn render_summary(outcome: &LoadOutcome) -> String {
    let index: &KnowledgeIndex = &outcome.index;
    let summary = index.summary();
    let mut out = String::new();
    out.push_str(&format!("files:            {}\n", outcome.indexed_paths().len()));
    out.push_str(&format!("accounts:         {}\n", summary.accounts));
    out.push_str(&format!("  defined:        {}\n", summary.defined_accounts));
    out.push_str(&format!("  undefined:      {}\n", summary.undefined_accounts));
    out.push_str(&format!("payees:           {}\n", summary.payees));
    out.push_str(&format!("tags:             {}\n", summary.tags));
    out.push_str(&format!("commodities:      {}\n", summary.commodities));
    out.push_str(&format!("templates:        {}\n", summary.templates));
    out.push_str(&format!("alignment column: {}\n", summary.amount_alignment_column));
    if let Some(date) = index.last_date() {
        out.push_str(&format!("last date:        {date}\n"));
    }
    let undefined = index.undefined_accounts();
    if !undefined.is_empty() {
        out.push_str("undefined accounts:\n");
        for account in undefined {
            out.push_str(&format!("  {account}\n"));
        }
    }
    out
}
