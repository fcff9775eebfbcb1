//! Flat vector index using cosine similarity.
//!
//! [`VectorIndex`] keeps every entry in insertion order and answers queries
//! with a full O(n·d) scan. The index is a plain single-owner structure with
//! no internal locking: callers serialize mutation against search and save.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use crate::document::{IndexData, IndexEntry, SearchResult};
use crate::error::{RagError, Result};

/// An in-memory collection of embeddings sharing one dimension.
///
/// The dimension is fixed by the first entry added and reset to 0
/// ("unconstrained") by [`clear`](VectorIndex::clear).
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::VectorIndex;
///
/// let mut index = VectorIndex::new();
/// index.add("hello", vec![1.0, 0.0], HashMap::new())?;
/// let results = index.search(&[1.0, 0.0], 5)?;
/// index.save("embeddings_index.json")?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
}

/// Summary of an index's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of stored entries.
    pub total_entries: usize,
    /// Embedding dimension, 0 when empty.
    pub dimension: usize,
    /// Approximate embedding payload in bytes (8 bytes per component).
    pub approx_size_bytes: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index Statistics:")?;
        writeln!(f, "  Total entries: {}", self.total_entries)?;
        writeln!(f, "  Dimension: {}", self.dimension)?;
        write!(f, "  Index size: ~{} MB", self.approx_size_bytes / 1024 / 1024)
    }
}

/// Compute cosine similarity between two vectors of equal length.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    dot / denominator
}

impl VectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension shared by all entries, 0 when empty.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Stored entries in id order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Add a single entry and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the index is non-empty and
    /// `embedding.len()` differs from [`dimension`](VectorIndex::dimension).
    /// The index is unchanged on error.
    pub fn add(
        &mut self,
        text: impl Into<String>,
        embedding: Vec<f64>,
        metadata: HashMap<String, String>,
    ) -> Result<usize> {
        if self.entries.is_empty() {
            self.dimension = embedding.len();
        } else if embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let id = self.entries.len();
        self.entries.push(IndexEntry { id, text: text.into(), embedding, metadata });
        Ok(id)
    }

    /// Add entries position by position.
    ///
    /// Metadata beyond the end of `metadata` defaults to an empty map. The
    /// batch is not atomic: on a dimension mismatch, entries added before the
    /// failing position remain in the index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ArityMismatch`] if `texts` and `embeddings` differ in
    /// length (nothing is added), or the first [`RagError::DimensionMismatch`]
    /// encountered.
    pub fn add_batch<S: Into<String>>(
        &mut self,
        texts: Vec<S>,
        embeddings: Vec<Vec<f64>>,
        metadata: Vec<HashMap<String, String>>,
    ) -> Result<()> {
        if texts.len() != embeddings.len() {
            return Err(RagError::ArityMismatch {
                texts: texts.len(),
                embeddings: embeddings.len(),
            });
        }

        let mut metadata = metadata.into_iter();
        for (text, embedding) in texts.into_iter().zip(embeddings) {
            let meta = metadata.next().unwrap_or_default();
            self.add(text, embedding, meta)?;
        }
        Ok(())
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Ties are broken by ascending id. An empty index returns no results for
    /// a query of any length.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the index is non-empty and
    /// `query.len()` differs from its dimension.
    pub fn search(&self, query: &[f64], k: usize) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .map(|entry| (entry.id, cosine_similarity(query, &entry.embedding)))
            .collect();

        // `sort_by` is stable and entries are in id order, so equal scores
        // keep ascending ids.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(id, score)| {
                let entry = &self.entries[id];
                SearchResult {
                    id,
                    text: entry.text.clone(),
                    score,
                    metadata: entry.metadata.clone(),
                }
            })
            .collect())
    }

    /// Remove all entries and reset the dimension to 0.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dimension = 0;
    }

    /// Current size summary.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_entries: self.entries.len(),
            dimension: self.dimension,
            approx_size_bytes: self.entries.len() * self.dimension * 8,
        }
    }

    /// Persist the index as pretty-printed JSON.
    ///
    /// The file is written next to its destination and renamed into place, so
    /// an existing index is never left half-written.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] or [`RagError::Serialization`] on failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = IndexData {
            entries: self.entries.clone(),
            dimension: self.dimension,
            total_entries: self.entries.len(),
        };
        let json = serde_json::to_vec_pretty(&data)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        match_permissions(tmp.as_file(), path)?;
        tmp.persist(path).map_err(|e| RagError::Io(e.error))?;

        info!(
            path = %path.display(),
            entries = self.entries.len(),
            dimension = self.dimension,
            "index saved"
        );
        Ok(())
    }

    /// Replace the in-memory state with the index stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotFound`] if `path` does not exist, and
    /// [`RagError::CorruptIndex`] if the file cannot be decoded or violates
    /// an invariant (`totalEntries` or `dimension` disagreeing with the
    /// entries, or ids out of sequence). The index is unchanged on error.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RagError::IndexNotFound { path: path.to_path_buf() });
        }

        let bytes = fs::read(path)?;
        let data: IndexData = serde_json::from_slice(&bytes)
            .map_err(|e| corrupt(path, format!("invalid JSON: {e}")))?;
        validate(path, &data)?;

        self.entries = data.entries;
        self.dimension = data.dimension;

        info!(
            path = %path.display(),
            entries = self.entries.len(),
            dimension = self.dimension,
            "index loaded"
        );
        Ok(())
    }

    /// Load a fresh index from `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut index = Self::new();
        index.load(path)?;
        Ok(index)
    }
}

/// Give a freshly written temp file the mode of the index it replaces, or
/// 0644 for a new index. Temp files start out owner-only.
#[cfg(unix)]
fn match_permissions(file: &fs::File, path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match fs::metadata(path) {
        Ok(meta) => meta.permissions(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::Permissions::from_mode(0o644),
        Err(e) => return Err(e),
    };
    file.set_permissions(permissions)
}

#[cfg(not(unix))]
fn match_permissions(_file: &fs::File, _path: &Path) -> io::Result<()> {
    Ok(())
}

fn corrupt(path: &Path, reason: String) -> RagError {
    RagError::CorruptIndex { path: path.to_path_buf(), reason }
}

fn validate(path: &Path, data: &IndexData) -> Result<()> {
    if data.total_entries != data.entries.len() {
        return Err(corrupt(
            path,
            format!(
                "totalEntries is {} but file holds {} entries",
                data.total_entries,
                data.entries.len()
            ),
        ));
    }
    for (position, entry) in data.entries.iter().enumerate() {
        if entry.embedding.len() != data.dimension {
            return Err(corrupt(
                path,
                format!(
                    "entry {} has {} components, expected {}",
                    entry.id,
                    entry.embedding.len(),
                    data.dimension
                ),
            ));
        }
        if entry.id != position {
            return Err(corrupt(
                path,
                format!("entry at position {position} has id {}", entry.id),
            ));
        }
    }
    Ok(())
}
