//! Where rendered documents live.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "md";

/// A document location relative to the vault root: `<dir>/<stem>.md`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    pub dir: String,
    pub stem: String,
}

impl DocumentPath {
    pub fn new(dir: impl Into<String>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    pub fn relative(&self) -> PathBuf {
        Path::new(&self.dir).join(format!("{}.{}", self.stem, EXTENSION))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative().display())
    }
}

/// Persistence for rendered documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document does not exist yet.
    async fn read(&self, path: &DocumentPath) -> Result<Option<String>>;

    async fn write(&self, path: &DocumentPath, content: &str) -> Result<()>;

    /// Documents directly inside `dir`, sorted.
    async fn list(&self, dir: &str) -> Result<Vec<DocumentPath>>;
}

/// Markdown files under a vault directory.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &DocumentPath) -> PathBuf {
        self.root.join(path.relative())
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, path: &DocumentPath) -> Result<Option<String>> {
        let full = self.full_path(path);
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", full.display())),
        }
    }

    async fn write(&self, path: &DocumentPath, content: &str) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        // Write then rename so a crash never leaves a half-written note.
        let tmp = full.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &full)
            .await
            .with_context(|| format!("Failed to move {} into place", full.display()))?;
        tracing::debug!("Wrote {}", path);
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<DocumentPath>> {
        let full = self.root.join(dir);
        let mut entries = match tokio::fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to list {}", full.display())),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                paths.push(DocumentPath::new(dir, stem));
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<DocumentPath, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content without going through the async trait.
    pub fn get(&self, path: &DocumentPath) -> Option<String> {
        self.documents.lock().get(path).cloned()
    }

    pub fn insert(&self, path: DocumentPath, content: impl Into<String>) {
        self.documents.lock().insert(path, content.into());
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, path: &DocumentPath) -> Result<Option<String>> {
        Ok(self.get(path))
    }

    async fn write(&self, path: &DocumentPath, content: &str) -> Result<()> {
        self.insert(path.clone(), content);
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<DocumentPath>> {
        Ok(self
            .documents
            .lock()
            .keys()
            .filter(|p| p.dir == dir)
            .cloned()
            .collect())
    }
}
