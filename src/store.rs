//! JSON catalog persistence.
//!
//! The catalog lives in a single JSON document:
//!
//! ```json
//! {
//!   "products": [
//!     { "id": 583870, "name": "...", "price": 128000, "category": "...",
//!       "url": "...", "image": "Products/product_583870.jpg" }
//!   ]
//! }
//! ```
//!
//! Output is two-space indented with keys in record order and non-ASCII
//! text written as-is, so saving an unchanged catalog reproduces the same
//! bytes. Saves go through a temporary file in the target directory that
//! is renamed into place; readers see either the old or the new document.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;
use crate::models::Catalog;

/// Loads and saves the catalog document at a fixed path.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the catalog.
    pub fn load(&self) -> Result<Catalog, CatalogError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::Missing {
                    path: self.path.clone(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(CatalogError::Corrupt {
                    path: self.path.clone(),
                    reason: "not valid UTF-8".to_string(),
                })
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let catalog = parse_document(&content).map_err(|reason| CatalogError::Corrupt {
            path: self.path.clone(),
            reason,
        })?;

        tracing::debug!(path = %self.path.display(), records = catalog.len(), "loaded catalog");
        Ok(catalog)
    }

    /// Like [`load`](Self::load), but a missing file is an empty catalog.
    pub fn load_or_default(&self) -> Result<Catalog, CatalogError> {
        match self.load() {
            Err(CatalogError::Missing { .. }) => Ok(Catalog::default()),
            other => other,
        }
    }

    /// Atomically replace the persisted catalog.
    pub fn save(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let document = render_document(catalog)?;
        let io_err = |source| CatalogError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(document.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::debug!(path = %self.path.display(), records = catalog.len(), "saved catalog");
        Ok(())
    }
}

/// Render the catalog document exactly as [`CatalogStore::save`] writes it.
pub fn render_document(catalog: &Catalog) -> Result<String, CatalogError> {
    let mut document = serde_json::to_string_pretty(catalog)?;
    document.push('\n');
    Ok(document)
}

/// Parse a catalog document, describing what is wrong on failure.
pub fn parse_document(content: &str) -> Result<Catalog, String> {
    let catalog: Catalog = serde_json::from_str(content).map_err(|e| e.to_string())?;
    if let Some(record) = catalog.products.iter().find(|r| r.id == 0) {
        return Err(format!("product '{}' has id 0", record.name));
    }
    Ok(catalog)
}
