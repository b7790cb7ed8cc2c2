use indexmap::IndexMap;
use indexmap::map::Entry;
use std::collections::HashSet;
use std::sync::Arc;
use structscope_go::{MethodKey, ParsedFile, declared_methods};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};

/// Parsed files of one extraction pass, by package name then file name.
#[derive(Debug, Clone, Default)]
pub struct ParsedTrees {
    packages: IndexMap<String, IndexMap<String, ParsedFile>>,
}

impl ParsedTrees {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file unless one with the same name is already registered.
    pub fn insert(&mut self, parsed: ParsedFile) -> bool {
        let files = self.packages.entry(parsed.package.clone()).or_default();
        match files.entry(parsed.name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(parsed);
                true
            }
        }
    }

    /// Replaces a file after it has been rewritten.
    pub fn update(&mut self, parsed: ParsedFile) {
        self.packages
            .entry(parsed.package.clone())
            .or_default()
            .insert(parsed.name.clone(), parsed);
    }

    pub fn get(&self, package: &str, file: &str) -> Option<&ParsedFile> {
        self.packages.get(package)?.get(file)
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = &ParsedFile> {
        self.packages.values().flat_map(|files| files.values())
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn file_count(&self) -> usize {
        self.packages.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Methods declared by the other files of `package`.
    pub fn methods_declared_outside(&self, package: &str, file: &str) -> HashSet<MethodKey> {
        let Some(files) = self.packages.get(package) else {
            return HashSet::new();
        };
        files
            .iter()
            .filter(|(name, _)| name.as_str() != file)
            .flat_map(|(_, parsed)| declared_methods(parsed))
            .collect()
    }
}

/// Shared registry of the parsed files behind the current model.
///
/// Written by extraction and by edits, read by everything else. Edits hold
/// the write guard for a whole batch.
#[derive(Clone, Default)]
pub struct ParsedRegistry {
    inner: Arc<RwLock<ParsedTrees>>,
}

impl ParsedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, trees: ParsedTrees) {
        *self.inner.write().await = trees;
    }

    pub async fn clear(&self) {
        *self.inner.write().await = ParsedTrees::new();
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ParsedTrees> {
        self.inner.read().await
    }

    /// Exclusive access that can move onto the blocking pool.
    pub async fn write_owned(&self) -> OwnedRwLockWriteGuard<ParsedTrees> {
        Arc::clone(&self.inner).write_owned().await
    }
}
