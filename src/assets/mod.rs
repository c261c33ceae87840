//! Asset directory abstraction.
//!
//! The reconciler sees the asset directory only through [`AssetDir`]:
//! list, exists, rename, remove and read, all on bare file names inside
//! one directory. [`LocalAssetDir`] is the on-disk implementation;
//! [`memory::MemoryAssetDir`] backs tests and dry runs.

pub mod memory;

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::AssetError;

/// File operations scoped to a single asset directory.
pub trait AssetDir {
    /// Names of the asset files currently present.
    fn list_files(&self) -> Result<BTreeSet<String>, AssetError>;

    fn exists(&self, name: &str) -> bool;

    /// Rename `from` to `to`. Fails if `to` already exists.
    fn rename(&self, from: &str, to: &str) -> Result<(), AssetError>;

    /// Remove `name`. Removing an absent file is a no-op.
    fn remove(&self, name: &str) -> Result<(), AssetError>;

    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError>;
}

/// Reject anything that is not a plain file name.
pub fn validate_name(name: &str) -> Result<(), AssetError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0');
    if plain {
        Ok(())
    } else {
        Err(AssetError::OutsideDirectory(name.to_string()))
    }
}

/// An asset directory on the local filesystem.
///
/// Only regular files matching the include globs are part of the directory:
/// anything else is invisible to every operation, so a reconciliation over a
/// [`memory::MemoryAssetDir::snapshot`] sees exactly what a real run sees.
pub struct LocalAssetDir {
    root: PathBuf,
    include: GlobSet,
}

impl LocalAssetDir {
    /// `include_globs` select which files [`list_files`](AssetDir::list_files)
    /// reports; they are matched case-insensitively against file names.
    pub fn new(root: impl Into<PathBuf>, include_globs: &[String]) -> anyhow::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            anyhow::bail!("Asset directory does not exist: {}", root.display());
        }
        Ok(Self {
            root,
            include: build_globset(include_globs)?,
        })
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, AssetError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Path of an included file, or `NotFound` for names outside the globs.
    fn included_path(&self, name: &str) -> Result<PathBuf, AssetError> {
        let path = self.path_of(name)?;
        if self.include.is_match(name) {
            Ok(path)
        } else {
            Err(AssetError::NotFound(name.to_string()))
        }
    }
}

impl AssetDir for LocalAssetDir {
    fn list_files(&self) -> Result<BTreeSet<String>, AssetError> {
        let mut names = BTreeSet::new();
        let walker = WalkDir::new(&self.root).min_depth(1).max_depth(1);
        for entry in walker {
            let entry = entry.map_err(|e| AssetError::Io {
                op: "list",
                file: self.root.display().to_string(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if self.include.is_match(&name) {
                names.insert(name);
            }
        }
        Ok(names)
    }

    fn exists(&self, name: &str) -> bool {
        self.included_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), AssetError> {
        let from_path = self.included_path(from)?;
        let to_path = self.path_of(to)?;
        // Any existing entry blocks the rename, included or not.
        if to_path.exists() {
            return Err(AssetError::TargetExists {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        std::fs::rename(&from_path, &to_path).map_err(|source| AssetError::Io {
            op: "rename",
            file: from.to_string(),
            source,
        })
    }

    fn remove(&self, name: &str) -> Result<(), AssetError> {
        let path = match self.included_path(name) {
            Ok(path) => path,
            Err(AssetError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AssetError::Io {
                op: "remove",
                file: name.to_string(),
                source,
            }),
        }
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.included_path(name)?;
        std::fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => AssetError::NotFound(name.to_string()),
            _ => AssetError::Io {
                op: "read",
                file: name.to_string(),
                source,
            },
        })
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}
