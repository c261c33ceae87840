//! Operator-curated rename mapping.
//!
//! Asset files arrive with descriptive names. Which product a file belongs
//! to is decided by a person and written down in a mapping file; the
//! reconciler never guesses an id from a filename.
//!
//! ```toml
//! # Files confirmed redundant (duplicates, or matching no product).
//! extras = ["01 HARD SPRITZ - Amos Professional.jpg"]
//!
//! [rename]
//! "01 COLOR&PERM SHAMPOO, CONDITIONER.jpg" = 578458
//! "02 PURE SMART Хагны эсрэг чийгшүүлж,.webp" = 578336
//! ```
//!
//! Entries keep file order. The table must be a bijection: one file per
//! product and one product per file.
//!
//! When the catalog's `image` values still name the scraped files,
//! [`ImagePathMapping`] derives the same entries from the catalog itself.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::assets::validate_name;
use crate::error::MappingError;
use crate::models::{CanonicalName, Catalog};

/// One `source file -> product id` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub source: String,
    pub product_id: u64,
}

/// Source of filename-to-product assignments consumed by the reconciler.
///
/// [`RenameMapping`] is the explicit operator table; an automated matcher
/// can implement this trait without changing reconciliation.
pub trait AssetMapping {
    fn entries(&self) -> &[MappingEntry];

    /// Files to delete unconditionally after the entries are processed.
    fn extras(&self) -> &[String] {
        &[]
    }
}

/// The explicit mapping table loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMapping {
    entries: Vec<MappingEntry>,
    extras: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(default)]
    extras: Vec<String>,
    #[serde(default)]
    rename: toml::Table,
}

impl RenameMapping {
    /// Build a mapping, validating names and the one-file-per-product rule.
    pub fn new(
        entries: impl IntoIterator<Item = MappingEntry>,
        extras: impl IntoIterator<Item = String>,
    ) -> Result<Self, MappingError> {
        let mut by_id: HashMap<u64, String> = HashMap::new();
        let mut checked = Vec::new();

        for entry in entries {
            validate_name(&entry.source)
                .map_err(|_| MappingError::InvalidFilename(entry.source.clone()))?;
            if let Some(owner) = CanonicalName::parse(&entry.source) {
                if owner.id != entry.product_id {
                    return Err(MappingError::CanonicalSource {
                        file: entry.source,
                        owner: owner.id,
                        id: entry.product_id,
                    });
                }
            }
            if let Some(first) = by_id.get(&entry.product_id) {
                return Err(MappingError::DuplicateTarget {
                    id: entry.product_id,
                    first: first.clone(),
                    second: entry.source,
                });
            }
            by_id.insert(entry.product_id, entry.source.clone());
            checked.push(entry);
        }

        let extras: Vec<String> = extras.into_iter().collect();
        for extra in &extras {
            validate_name(extra).map_err(|_| MappingError::InvalidFilename(extra.clone()))?;
        }

        Ok(Self {
            entries: checked,
            extras,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, MappingError> {
        let file: MappingFile = toml::from_str(content)?;

        let mut entries = Vec::with_capacity(file.rename.len());
        for (source, value) in file.rename {
            let product_id = value
                .as_integer()
                .filter(|id| *id > 0)
                .map(|id| id as u64)
                .ok_or_else(|| MappingError::InvalidId {
                    file: source.clone(),
                    value: value.to_string(),
                })?;
            entries.push(MappingEntry { source, product_id });
        }

        Self::new(entries, file.extras)
    }

    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let content = std::fs::read_to_string(path).map_err(|source| MappingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

impl AssetMapping for RenameMapping {
    fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    fn extras(&self) -> &[String] {
        &self.extras
    }
}

/// Entries read off the catalog: each record whose `image` is
/// `<prefix><file>` for a plain, non-canonical file maps that file to the
/// record's id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePathMapping {
    entries: Vec<MappingEntry>,
}

impl ImagePathMapping {
    pub fn from_catalog(catalog: &Catalog, image_prefix: &str) -> Self {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut entries = Vec::new();

        for record in &catalog.products {
            if !record.image_ref(image_prefix).is_placeholder() {
                continue;
            }
            let file = match record.image.strip_prefix(image_prefix) {
                Some(file) => file,
                None => continue,
            };
            if record.image.starts_with("data:") || validate_name(file).is_err() {
                continue;
            }
            if !seen.insert(file) {
                tracing::warn!(id = record.id, file = %file, "image path shared with an earlier product, skipping");
                continue;
            }
            entries.push(MappingEntry {
                source: file.to_string(),
                product_id: record.id,
            });
        }

        Self { entries }
    }
}

impl AssetMapping for ImagePathMapping {
    fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }
}
