//! # Catalog Sync CLI (`catalog`)
//!
//! ## Usage
//!
//! ```bash
//! catalog --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog scrape` | Fetch the remote listing and merge it into the catalog |
//! | `catalog reconcile` | Rename asset files and point records at them |
//! | `catalog repair` | Collapse line breaks in record names |
//! | `catalog check` | Report records still on a placeholder image |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr so
//! command summaries on stdout stay parseable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use catalog_sync::progress::ProgressMode;
use catalog_sync::{check, config, reconcile, repair, scrape};

/// Catalog Sync: scrape a product listing and reconcile product images.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/catalog.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Scrape a product listing into a local catalog and reconcile product images",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch listing pages and merge the records into the catalog.
    ///
    /// Existing records keep their position and image; names, prices,
    /// categories and urls are refreshed; new products are appended.
    /// A transport failure stops pagination but keeps what was gathered.
    Scrape {
        /// Override `source.max_pages`.
        #[arg(long)]
        max_pages: Option<u32>,

        /// Skip the delay between page fetches.
        #[arg(long)]
        no_delay: bool,

        /// Scrape and report, but do not write the catalog.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr: auto, human, json or off.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Apply the rename mapping to the asset directory and the catalog.
    ///
    /// Safe to re-run: already canonical files are skipped and removed
    /// extras are ignored.
    Reconcile {
        /// Mapping file; overrides `assets.mapping`.
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Map each file named by a record's `image` path to that record.
        #[arg(long, conflicts_with = "mapping")]
        from_images: bool,

        /// Show what would change without touching files or the catalog.
        #[arg(long)]
        dry_run: bool,
    },

    /// Collapse line breaks in record names.
    Repair {
        /// Report changed ids without writing the catalog.
        #[arg(long)]
        dry_run: bool,
    },

    /// Count records whose image is still a placeholder.
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Scrape {
            max_pages,
            no_delay,
            dry_run,
            progress,
        } => {
            let mode = ProgressMode::from_flag(&progress)?;
            scrape::run_scrape(&cfg, max_pages, no_delay, dry_run, mode)?;
        }
        Commands::Reconcile {
            mapping,
            from_images,
            dry_run,
        } => {
            reconcile::run_reconcile(&cfg, mapping.as_deref(), from_images, dry_run)?;
        }
        Commands::Repair { dry_run } => {
            repair::run_repair(&cfg, dry_run)?;
        }
        Commands::Check => {
            check::run_check(&cfg)?;
        }
    }

    Ok(())
}
