//! Data types for chunks, index entries, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A bounded span of source text selected as a retrieval unit.
///
/// Offsets are character positions into the cleaned source text. Chunks are
/// transient: they are embedded and then discarded, only the resulting
/// [`IndexEntry`] is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The trimmed chunk text.
    pub text: String,
    /// Emission sequence number, 0-based and gapless.
    pub index: usize,
    /// Start character offset (inclusive).
    pub start_offset: usize,
    /// End character offset (exclusive). Always greater than `start_offset`.
    pub end_offset: usize,
}

/// A stored text with its embedding and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Dense 0-based id, equal to the insertion position.
    pub id: usize,
    /// The stored text.
    pub text: String,
    /// The vector embedding for `text`.
    pub embedding: Vec<f64>,
    /// Key-value metadata. Absent in a persisted file means empty.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The persisted form of a [`VectorIndex`](crate::VectorIndex).
///
/// Serialized with camelCase keys so files stay readable by other tools
/// producing the same `entries` / `dimension` / `totalEntries` layout.
/// Unknown keys are ignored on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexData {
    /// Entries in id order.
    pub entries: Vec<IndexEntry>,
    /// Embedding length shared by every entry, 0 when empty.
    pub dimension: usize,
    /// Must equal `entries.len()`.
    pub total_entries: usize,
}

/// A retrieved entry paired with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id of the matching entry.
    pub id: usize,
    /// Text of the matching entry.
    pub text: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f64,
    /// Metadata of the matching entry.
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_data_uses_camel_case_keys() {
        let data = IndexData { entries: Vec::new(), dimension: 3, total_entries: 0 };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["totalEntries"], 0);
        assert_eq!(json["dimension"], 3);
        assert!(json.get("total_entries").is_none());
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let entry: IndexEntry =
            serde_json::from_str(r#"{"id":0,"text":"a","embedding":[1.0]}"#).unwrap();
        assert!(entry.metadata.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let data: IndexData = serde_json::from_str(
            r#"{"entries":[],"dimension":0,"totalEntries":0,"model":"nomic-embed-text"}"#,
        )
        .unwrap();
        assert_eq!(data.total_entries, 0);
    }
}
