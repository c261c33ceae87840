//! In-memory [`AssetDir`] for tests and dry runs.
//!
//! Holds file names and contents in a `BTreeMap` behind a `RefCell`; the
//! pipelines are single-threaded so no locking is needed.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::AssetError;

use super::{validate_name, AssetDir};

/// In-memory asset directory.
#[derive(Debug, Default)]
pub struct MemoryAssetDir {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryAssetDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from `(name, content)` pairs.
    pub fn with_files<N, C>(files: impl IntoIterator<Item = (N, C)>) -> Self
    where
        N: Into<String>,
        C: Into<Vec<u8>>,
    {
        let dir = Self::new();
        for (name, content) in files {
            dir.insert(name, content);
        }
        dir
    }

    /// Copy the listed files (names and contents) of another directory.
    ///
    /// Used by dry runs: reconciling against the copy shows what would
    /// happen without touching the real directory.
    pub fn snapshot(source: &dyn AssetDir) -> Result<Self, AssetError> {
        let dir = Self::new();
        for name in source.list_files()? {
            let content = source.read(&name)?;
            dir.insert(name, content);
        }
        Ok(dir)
    }

    /// Like [`snapshot`](Self::snapshot) but with empty contents. Enough for
    /// a dry run that never compares file bodies.
    pub fn snapshot_names(source: &dyn AssetDir) -> Result<Self, AssetError> {
        let dir = Self::new();
        for name in source.list_files()? {
            dir.insert(name, Vec::new());
        }
        Ok(dir)
    }

    pub fn insert(&self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(name.into(), content.into());
    }

    /// All file names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }
}

impl AssetDir for MemoryAssetDir {
    fn list_files(&self) -> Result<BTreeSet<String>, AssetError> {
        Ok(self.files.borrow().keys().cloned().collect())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.borrow().contains_key(name)
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), AssetError> {
        validate_name(from)?;
        validate_name(to)?;
        let mut files = self.files.borrow_mut();
        if files.contains_key(to) {
            return Err(AssetError::TargetExists {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let content = files
            .remove(from)
            .ok_or_else(|| AssetError::NotFound(from.to_string()))?;
        files.insert(to.to_string(), content);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), AssetError> {
        validate_name(name)?;
        self.files.borrow_mut().remove(name);
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}
