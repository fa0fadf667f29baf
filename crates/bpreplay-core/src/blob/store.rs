//! Content-addressed store of large payloads seen during a decode pass.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::catalogue::Catalogue;
use crate::emit::format_literal;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob collision: {hash} already maps to different content")]
    BlobCollision { hash: String },

    #[error("Refusing to overwrite existing blob file {}", path.display())]
    BlobFileExists { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lowercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// How a payload appears in the generated script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralRendering {
    Inline(Vec<u8>),
    Blob(String),
}

impl fmt::Display for LiteralRendering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralRendering::Inline(bytes) => f.write_str(&format_literal(bytes)),
            LiteralRendering::Blob(hash) => write!(f, "fw.hash2bin[\"{}\"]", hash),
        }
    }
}

/// Known catalogue plus blobs discovered in this pass.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    catalogue: Catalogue,
    new_blobs: BTreeMap<String, Vec<u8>>,
    used: BTreeSet<String>,
    threshold: usize,
}

impl BlobStore {
    /// Wrap `catalogue`. Payloads of at least `threshold` bytes are
    /// registered as new blobs; `0` disables discovery.
    pub fn load(catalogue: Catalogue, threshold: usize) -> Self {
        Self {
            catalogue,
            new_blobs: BTreeMap::new(),
            used: BTreeSet::new(),
            threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: usize) {
        self.threshold = threshold;
    }

    /// Number of blobs discovered so far in this pass.
    pub fn new_len(&self) -> usize {
        self.new_blobs.len()
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn lookup(&self, hash: &str) -> Option<&[u8]> {
        self.catalogue
            .get(hash)
            .or_else(|| self.new_blobs.get(hash).map(Vec::as_slice))
    }

    /// Register `data` as a blob of this pass and return its hash.
    pub fn register(&mut self, data: &[u8]) -> Result<String, BlobError> {
        let hash = content_hash(data);
        match self.lookup(&hash) {
            Some(existing) if existing != data => {
                return Err(BlobError::BlobCollision { hash });
            }
            Some(_) => {}
            None => {
                debug!(hash = %hash, len = data.len(), "New blob");
                self.new_blobs.insert(hash.clone(), data.to_vec());
            }
        }
        self.used.insert(hash.clone());
        Ok(hash)
    }

    /// Render a payload, replacing known or large content with a blob reference.
    pub fn classify_payload(&mut self, data: &[u8]) -> Result<LiteralRendering, BlobError> {
        if let Some(rendering) = self.render_known(data)? {
            return Ok(rendering);
        }
        if self.threshold > 0 && data.len() >= self.threshold {
            return Ok(LiteralRendering::Blob(self.register(data)?));
        }
        Ok(LiteralRendering::Inline(data.to_vec()))
    }

    /// Blob reference for already known content, never registering.
    pub fn render_known(&mut self, data: &[u8]) -> Result<Option<LiteralRendering>, BlobError> {
        let hash = content_hash(data);
        match self.lookup(&hash) {
            Some(existing) if existing != data => Err(BlobError::BlobCollision { hash }),
            Some(_) => {
                self.used.insert(hash.clone());
                Ok(Some(LiteralRendering::Blob(hash)))
            }
            None => Ok(None),
        }
    }

    /// Like [`render_known`](Self::render_known) but falls back to inline bytes.
    pub fn render_argument(&mut self, data: &[u8]) -> Result<LiteralRendering, BlobError> {
        Ok(self
            .render_known(data)?
            .unwrap_or_else(|| LiteralRendering::Inline(data.to_vec())))
    }

    /// Bytes behind a rendering.
    pub fn resolve<'a>(&'a self, rendering: &'a LiteralRendering) -> Option<&'a [u8]> {
        match rendering {
            LiteralRendering::Inline(bytes) => Some(bytes.as_slice()),
            LiteralRendering::Blob(hash) => self.lookup(hash),
        }
    }

    pub fn new_blobs(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.new_blobs
            .iter()
            .map(|(h, d)| (h.as_str(), d.as_slice()))
    }

    /// Take the blobs discovered in this pass, sorted by hash.
    pub fn drain_new(&mut self) -> Vec<(String, Vec<u8>)> {
        for hash in self.new_blobs.keys() {
            self.used.remove(hash);
        }
        std::mem::take(&mut self.new_blobs).into_iter().collect()
    }

    /// Comment lines listing new and reused blobs.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("# {} new firmwares", self.new_blobs.len())];
        for (hash, data) in &self.new_blobs {
            lines.push(format!("#   {}: {} bytes", hash, data.len()));
        }

        let existing: Vec<&String> = self
            .used
            .iter()
            .filter(|h| self.catalogue.contains(h))
            .collect();
        lines.push(format!("# {} existing firmwares", existing.len()));
        for hash in existing {
            match self.catalogue.aliases(hash).as_slice() {
                [alias] => lines.push(format!("#   {}: {}", hash, alias)),
                aliases => {
                    lines.push(format!("#   {}", hash));
                    for alias in aliases {
                        lines.push(format!("#     {}", alias));
                    }
                }
            }
        }
        lines
    }

    /// Write every new blob to `<dir>/<hash>.bin`.
    ///
    /// Nothing is written if any target file already exists.
    #[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
    pub fn persist_new(&self, dir: &Path) -> Result<Vec<PathBuf>, BlobError> {
        fs::create_dir_all(dir)?;
        let targets: Vec<(PathBuf, &[u8])> = self
            .new_blobs
            .iter()
            .map(|(hash, data)| (dir.join(format!("{}.bin", hash)), data.as_slice()))
            .collect();
        if let Some((path, _)) = targets.iter().find(|(path, _)| path.exists()) {
            return Err(BlobError::BlobFileExists { path: path.clone() });
        }

        let mut written = Vec::with_capacity(targets.len());
        for (path, data) in targets {
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(BlobError::BlobFileExists { path });
                }
                Err(e) => return Err(e.into()),
            };
            file.write_all(data)?;
            debug!(path = %path.display(), len = data.len(), "Wrote blob");
            written.push(path);
        }
        info!(count = written.len(), "Saved new blobs");
        Ok(written)
    }
}
