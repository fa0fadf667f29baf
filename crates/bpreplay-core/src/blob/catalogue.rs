//! Catalogue of known firmware blobs, keyed by content hash.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use super::store::{BlobError, content_hash};

/// Known blobs and the human-readable names they were found under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalogue {
    blobs: BTreeMap<String, Vec<u8>>,
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a blob, optionally under an alias. Returns its hash.
    pub fn insert(&mut self, data: Vec<u8>, alias: Option<String>) -> Result<String, BlobError> {
        let hash = content_hash(&data);
        match self.blobs.get(&hash) {
            Some(existing) if *existing != data => {
                return Err(BlobError::BlobCollision { hash });
            }
            Some(_) => {}
            None => {
                self.blobs.insert(hash.clone(), data);
            }
        }
        let names = self.aliases.entry(hash.clone()).or_default();
        if let Some(alias) = alias {
            names.insert(alias);
        }
        Ok(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&[u8]> {
        self.blobs.get(hash).map(Vec::as_slice)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.blobs.contains_key(hash)
    }

    /// Every alias known for `hash`, sorted.
    pub fn aliases(&self, hash: &str) -> Vec<&str> {
        self.aliases
            .get(hash)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Hash every regular file under `dir`; aliases are paths relative to `dir`.
    #[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
    pub fn load_dir(dir: &Path) -> Result<Self, BlobError> {
        let mut catalogue = Self::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let data = fs::read(path)?;
            let alias = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let hash = catalogue.insert(data, Some(alias.clone()))?;
            debug!(alias = %alias, hash = %hash, "Catalogued blob");
        }
        info!(blobs = catalogue.len(), "Firmware catalogue loaded");
        Ok(catalogue)
    }
}
