//! Read-only catalog diagnostics.
//!
//! Counts records still carrying a placeholder image and, when an asset
//! directory is available, records whose image names a canonical file that
//! is not there. Nothing is modified.

use anyhow::Result;

use crate::assets::{AssetDir, LocalAssetDir};
use crate::config::Config;
use crate::models::{Catalog, ImageRef};
use crate::store::CatalogStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub total: usize,
    /// Ids whose image is not a canonical asset reference.
    pub placeholders: Vec<u64>,
    /// Ids whose canonical asset file does not exist.
    pub dangling: Vec<u64>,
    /// Ids whose image names the canonical file of another id.
    pub mismatched: Vec<u64>,
    /// False when no asset directory was consulted.
    pub checked_files: bool,
}

impl ConsistencyReport {
    /// `"<placeholders> / <total>"`.
    pub fn summary(&self) -> String {
        format!("{} / {}", self.placeholders.len(), self.total)
    }

    pub fn is_clean(&self) -> bool {
        self.placeholders.is_empty() && self.dangling.is_empty() && self.mismatched.is_empty()
    }
}

/// Classify every record's image. Pass `dir` to also verify that canonical
/// references resolve to existing files.
pub fn check_catalog(
    catalog: &Catalog,
    image_prefix: &str,
    dir: Option<&dyn AssetDir>,
) -> ConsistencyReport {
    let mut report = ConsistencyReport {
        total: catalog.len(),
        checked_files: dir.is_some(),
        ..Default::default()
    };

    for record in &catalog.products {
        match record.image_ref(image_prefix) {
            ImageRef::Placeholder => report.placeholders.push(record.id),
            ImageRef::Asset(name) => {
                if name.id != record.id {
                    report.mismatched.push(record.id);
                }
                if let Some(dir) = dir {
                    if !dir.exists(&name.file_name()) {
                        report.dangling.push(record.id);
                    }
                }
            }
        }
    }

    report
}

pub fn print_report(report: &ConsistencyReport) {
    println!("check");
    println!("  records: {}", report.total);
    println!("  placeholders: {}", report.summary());
    if report.checked_files {
        println!("  dangling: {}", report.dangling.len());
        for id in &report.dangling {
            println!("    - {}", id);
        }
    }
    println!("  mismatched: {}", report.mismatched.len());
    for id in &report.mismatched {
        println!("    - {}", id);
    }
}

/// Run the `catalog check` command.
pub fn run_check(config: &Config) -> Result<()> {
    let catalog = CatalogStore::new(&config.catalog.path).load()?;
    catalog.index()?;

    let local = if config.assets.dir.is_dir() {
        Some(LocalAssetDir::new(&config.assets.dir, &config.assets.include_globs)?)
    } else {
        tracing::warn!(dir = %config.assets.dir.display(), "asset directory not found, skipping file checks");
        None
    };

    let report = check_catalog(
        &catalog,
        &config.assets.image_prefix,
        local.as_ref().map(|d| d as &dyn AssetDir),
    );
    print_report(&report);
    println!("ok");

    Ok(())
}
