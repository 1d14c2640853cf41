//! `fieldseal` CLI tool for key management.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use fieldseal_key_file::KeyPair;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log directives used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "fieldseal")]
#[command(about = "fieldseal key management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the process key pair used by the user-keyed strategy
    Generate {
        /// Directory receiving public.key and private.key
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { output } => generate(&output),
    }
}

fn generate(output: &std::path::Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("cannot create output directory {}", output.display()))?;

    let pair = KeyPair::generate();

    println!("Saving public key...");
    let public = pair.write_public(output).context("failed to save public key")?;
    println!("  {}", public.display());

    println!("Saving private key...");
    let private = pair.write_private(output).context("failed to save private key")?;
    println!("  {}", private.display());

    tracing::info!(public = %public.display(), private = %private.display(), "key pair generated");
    Ok(())
}
