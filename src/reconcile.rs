//! Asset reconciliation.
//!
//! Aligns the asset directory and the catalog's `image` references:
//!
//! 1. For each mapping entry, the source file is renamed to its canonical
//!    name `product_<id>.<ext>`. If the canonical file already exists it is
//!    authoritative and the source is removed instead.
//! 2. The record for that id gets `image = <prefix>product_<id>.<ext>`
//!    whenever the canonical file exists after step 1.
//! 3. Extras listed by the mapping are removed, then (optionally) any
//!    non-canonical file byte-identical to a canonical one.
//!
//! Every step is idempotent, so a run interrupted between file operations
//! and the catalog save can simply be repeated. Files that no entry names
//! are reported and left alone.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::assets::memory::MemoryAssetDir;
use crate::assets::{AssetDir, LocalAssetDir};
use crate::check::{check_catalog, print_report};
use crate::config::Config;
use crate::error::{AssetError, CatalogError};
use crate::mapping::{AssetMapping, ImagePathMapping, MappingEntry, RenameMapping};
use crate::models::{asset_image_path, CanonicalName, Catalog};
use crate::store::CatalogStore;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// What happened to one mapping entry's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Source renamed to the canonical name.
    Renamed,
    /// Canonical file already existed; the stale source was removed.
    Deduplicated,
    /// Source already gone (or already canonical) and the canonical file present.
    AlreadyCanonical,
    /// Neither the source nor the canonical file exists.
    Missing,
    /// The source is the canonical file of another product; left in place.
    Conflict,
}

impl EntryOutcome {
    /// The canonical file exists after this outcome.
    pub fn resolves(self) -> bool {
        !matches!(self, EntryOutcome::Missing | EntryOutcome::Conflict)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub source: String,
    pub product_id: u64,
    pub canonical: String,
    pub outcome: EntryOutcome,
    /// The id exists in the catalog.
    pub known_product: bool,
    /// The record's `image` was changed by this run.
    pub image_updated: bool,
}

/// Summary of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub entries: Vec<EntryReport>,
    pub extras_removed: Vec<String>,
    /// Canonical files named in the extras list, left in place.
    pub extras_refused: Vec<String>,
    pub identical_removed: Vec<String>,
    /// Non-canonical files no entry named; untouched.
    pub unmapped: Vec<String>,
}

impl ReconcileReport {
    pub fn count(&self, outcome: EntryOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries
            .iter()
            .filter(|e| e.outcome == EntryOutcome::Missing)
    }

    pub fn unknown_products(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries
            .iter()
            .filter(|e| e.outcome.resolves() && !e.known_product)
    }

    pub fn images_updated(&self) -> usize {
        self.entries.iter().filter(|e| e.image_updated).count()
    }

    /// True when the run changed nothing on disk or in the catalog.
    pub fn is_noop(&self) -> bool {
        self.images_updated() == 0
            && self.count(EntryOutcome::Renamed) == 0
            && self.count(EntryOutcome::Deduplicated) == 0
            && self.extras_removed.is_empty()
            && self.identical_removed.is_empty()
    }
}

/// Applies a mapping to an asset directory and a catalog.
pub struct Reconciler<'a> {
    dir: &'a dyn AssetDir,
    image_prefix: String,
    prune_identical: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(dir: &'a dyn AssetDir, image_prefix: impl Into<String>) -> Self {
        Self {
            dir,
            image_prefix: image_prefix.into(),
            prune_identical: false,
        }
    }

    /// Also remove non-canonical files whose bytes equal a canonical file.
    pub fn prune_identical(mut self, enabled: bool) -> Self {
        self.prune_identical = enabled;
        self
    }

    /// Reconcile `catalog` and the directory against `mapping`.
    ///
    /// The catalog is indexed before any file is touched, so a catalog with
    /// duplicate ids fails without side effects.
    pub fn reconcile(
        &self,
        catalog: &mut Catalog,
        mapping: &dyn AssetMapping,
    ) -> Result<ReconcileReport, ReconcileError> {
        let index = catalog.index()?;
        let mut report = ReconcileReport::default();

        for entry in mapping.entries() {
            let canonical = CanonicalName::for_source(entry.product_id, &entry.source);
            let outcome = self.apply_entry(entry, &canonical)?;

            let known_product = index.contains(entry.product_id);
            let mut image_updated = false;
            if outcome.resolves() {
                if let Some(pos) = index.position(entry.product_id) {
                    let image = asset_image_path(&self.image_prefix, &canonical);
                    let record = &mut catalog.products[pos];
                    if record.image != image {
                        tracing::debug!(id = record.id, from = %record.image, to = %image, "updating image");
                        record.image = image;
                        image_updated = true;
                    }
                } else {
                    tracing::warn!(id = entry.product_id, file = %entry.source, "mapped product is not in the catalog");
                }
            }

            report.entries.push(EntryReport {
                source: entry.source.clone(),
                product_id: entry.product_id,
                canonical: canonical.file_name(),
                outcome,
                known_product,
                image_updated,
            });
        }

        self.remove_extras(mapping.extras(), &mut report)?;
        if self.prune_identical {
            self.remove_identical(&mut report)?;
        }

        let mapped: HashSet<&str> = mapping.entries().iter().map(|e| e.source.as_str()).collect();
        report.unmapped = self
            .dir
            .list_files()?
            .into_iter()
            .filter(|name| CanonicalName::parse(name).is_none() && !mapped.contains(name.as_str()))
            .collect();

        Ok(report)
    }

    fn apply_entry(
        &self,
        entry: &MappingEntry,
        canonical: &CanonicalName,
    ) -> Result<EntryOutcome, AssetError> {
        let target = canonical.file_name();

        if let Some(owner) = CanonicalName::parse(&entry.source) {
            if owner.id != entry.product_id {
                tracing::warn!(file = %entry.source, owner = owner.id, id = entry.product_id, "source is another product's canonical file, skipping");
                return Ok(EntryOutcome::Conflict);
            }
        }

        if entry.source == target || !self.dir.exists(&entry.source) {
            return Ok(if self.dir.exists(&target) {
                EntryOutcome::AlreadyCanonical
            } else {
                tracing::warn!(file = %entry.source, id = entry.product_id, "mapped file not found, skipping");
                EntryOutcome::Missing
            });
        }

        if self.dir.exists(&target) {
            tracing::info!(file = %entry.source, canonical = %target, "canonical file exists, removing stale source");
            self.dir.remove(&entry.source)?;
            Ok(EntryOutcome::Deduplicated)
        } else {
            tracing::info!(file = %entry.source, canonical = %target, "renaming asset");
            self.dir.rename(&entry.source, &target)?;
            Ok(EntryOutcome::Renamed)
        }
    }

    fn remove_extras(
        &self,
        extras: &[String],
        report: &mut ReconcileReport,
    ) -> Result<(), AssetError> {
        for extra in extras {
            if CanonicalName::parse(extra).is_some() {
                tracing::warn!(file = %extra, "refusing to remove a canonical file listed as extra");
                report.extras_refused.push(extra.clone());
                continue;
            }
            if self.dir.exists(extra) {
                self.dir.remove(extra)?;
                tracing::info!(file = %extra, "removed extra file");
                report.extras_removed.push(extra.clone());
            }
        }
        Ok(())
    }

    fn remove_identical(&self, report: &mut ReconcileReport) -> Result<(), AssetError> {
        let files = self.dir.list_files()?;

        let mut canonical_by_digest: HashMap<String, String> = HashMap::new();
        for name in files.iter().filter(|n| CanonicalName::parse(n).is_some()) {
            canonical_by_digest
                .entry(digest(&self.dir.read(name)?))
                .or_insert_with(|| name.clone());
        }
        if canonical_by_digest.is_empty() {
            return Ok(());
        }

        for name in files.iter().filter(|n| CanonicalName::parse(n).is_none()) {
            if let Some(original) = canonical_by_digest.get(&digest(&self.dir.read(name)?)) {
                tracing::info!(file = %name, duplicate_of = %original, "removing byte-identical copy");
                self.dir.remove(name)?;
                report.identical_removed.push(name.clone());
            }
        }
        Ok(())
    }
}

fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Run the `catalog reconcile` command.
///
/// Loads the catalog and mapping, reconciles, saves once, then prints the
/// reconciliation report followed by a consistency check. With
/// `from_images` the mapping is derived from the catalog's image paths
/// instead of read from a file. With `dry_run` the run happens against an
/// in-memory copy of the asset directory and nothing is saved.
pub fn run_reconcile(
    config: &Config,
    mapping_path: Option<&std::path::Path>,
    from_images: bool,
    dry_run: bool,
) -> Result<()> {
    let store = CatalogStore::new(&config.catalog.path);
    let mut catalog = store.load()?;

    let mapping: Box<dyn AssetMapping> = if from_images {
        Box::new(ImagePathMapping::from_catalog(&catalog, &config.assets.image_prefix))
    } else {
        let mapping_path = mapping_path
            .or(config.assets.mapping.as_deref())
            .ok_or_else(|| {
                anyhow::anyhow!("No mapping file: pass --mapping, --from-images or set assets.mapping")
            })?;
        Box::new(
            RenameMapping::load(mapping_path)
                .with_context(|| format!("Failed to load mapping {}", mapping_path.display()))?,
        )
    };

    let local = LocalAssetDir::new(&config.assets.dir, &config.assets.include_globs)?;
    let snapshot;
    let dir: &dyn AssetDir = if dry_run {
        // File bodies are only compared when pruning identical copies.
        snapshot = if config.assets.prune_identical {
            MemoryAssetDir::snapshot(&local)?
        } else {
            MemoryAssetDir::snapshot_names(&local)?
        };
        &snapshot
    } else {
        &local
    };

    let report = Reconciler::new(dir, config.assets.image_prefix.clone())
        .prune_identical(config.assets.prune_identical)
        .reconcile(&mut catalog, mapping.as_ref())?;

    if dry_run {
        println!("reconcile (dry-run)");
    } else {
        println!("reconcile");
    }
    println!("  mapping entries: {}", mapping.entries().len());
    println!("  renamed: {}", report.count(EntryOutcome::Renamed));
    println!("  deduplicated: {}", report.count(EntryOutcome::Deduplicated));
    println!("  already canonical: {}", report.count(EntryOutcome::AlreadyCanonical));
    println!("  images updated: {}", report.images_updated());
    let skipped: Vec<&EntryReport> = report.skipped().collect();
    println!("  skipped: {}", skipped.len());
    for entry in &skipped {
        println!("    - {}", entry.source);
    }
    let conflicts: Vec<&EntryReport> = report
        .entries
        .iter()
        .filter(|e| e.outcome == EntryOutcome::Conflict)
        .collect();
    if !conflicts.is_empty() {
        println!("  conflicts: {}", conflicts.len());
        for entry in &conflicts {
            println!("    - {} -> {}", entry.source, entry.product_id);
        }
    }
    let unknown: Vec<&EntryReport> = report.unknown_products().collect();
    if !unknown.is_empty() {
        println!("  unknown products: {}", unknown.len());
        for entry in &unknown {
            println!("    - {} ({})", entry.product_id, entry.canonical);
        }
    }
    println!("  extras removed: {}", report.extras_removed.len());
    if !report.extras_refused.is_empty() {
        println!("  extras refused: {}", report.extras_refused.len());
    }
    if config.assets.prune_identical {
        println!("  identical removed: {}", report.identical_removed.len());
    }
    println!("  unmapped: {}", report.unmapped.len());
    for name in &report.unmapped {
        println!("    - {}", name);
    }

    if !dry_run {
        store
            .save(&catalog)
            .with_context(|| format!("Failed to save catalog to {}", store.path().display()))?;
    }

    let consistency = check_catalog(&catalog, &config.assets.image_prefix, Some(dir));
    print_report(&consistency);
    println!("ok");

    Ok(())
}
