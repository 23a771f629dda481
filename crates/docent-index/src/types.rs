use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Location inside a source document that a chunk came from.
///
/// Serialized with a `kind` discriminant, e.g. `{"kind":"pdf","page":3}`.
/// Opaque to the index itself; carried through for citation display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProvenanceTag {
    Pdf { page: usize },
    Pptx { page: usize },
    Csv { row: usize },
    Docx { paragraph: usize },
    Txt { line: usize },
}

impl ProvenanceTag {
    /// Discriminant string as it appears in persisted metadata.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pdf { .. } => "pdf",
            Self::Pptx { .. } => "pptx",
            Self::Csv { .. } => "csv",
            Self::Docx { .. } => "docx",
            Self::Txt { .. } => "txt",
        }
    }
}

impl std::fmt::Display for ProvenanceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf { page } => write!(f, "page {page}"),
            Self::Pptx { page } => write!(f, "slide {page}"),
            Self::Csv { row } => write!(f, "row {row}"),
            Self::Docx { paragraph } => write!(f, "paragraph {paragraph}"),
            Self::Txt { line } => write!(f, "line {line}"),
        }
    }
}

/// A token-bounded slice of one parsed document unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source: ProvenanceTag,
    /// Position of this chunk within the document, increasing monotonically.
    pub sequence_index: usize,
    /// Token offset (inclusive) within the unit the chunk was cut from.
    pub token_start: usize,
    /// Token offset (exclusive).
    pub token_end: usize,
}

/// Metadata stored at the same row as its vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub text: String,
    pub source: ProvenanceTag,
    pub filename: String,
    pub document_id: Uuid,
}

/// One row returned by [`crate::VectorIndex::search`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry {
    pub score: f32,
    pub row: usize,
    pub entry: IndexedEntry,
}

/// A ranked retrieval result tagged with the index it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub text: String,
    pub source: ProvenanceTag,
    pub document_id: Uuid,
    pub filename: String,
}

impl SearchHit {
    /// Tag a scored row with the document identity it was retrieved for.
    ///
    /// The registry is authoritative for identity, so `document_id` and
    /// `filename` override whatever the entry recorded at ingest time.
    #[must_use]
    pub fn tagged(scored: ScoredEntry, document_id: Uuid, filename: &str) -> Self {
        Self {
            score: scored.score,
            text: scored.entry.text,
            source: scored.entry.source,
            document_id,
            filename: filename.to_owned(),
        }
    }
}
