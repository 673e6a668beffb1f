//! File type detection and chunk records

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extensions picked up by directory discovery
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "pptx", "pptm", "xlsx"];

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Microsoft PowerPoint presentation (.pptx, .pptm)
    Pptx,
    /// Excel spreadsheet (.xlsx)
    Xlsx,
    /// Anything else
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "pptx" | "pptm" => Self::Pptx,
            "xlsx" => Self::Xlsx,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a path's final extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext.to_string_lossy()))
            .unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Pptx => "PowerPoint (.pptx)",
            Self::Xlsx => "Excel Spreadsheet (.xlsx)",
            Self::Unknown => "Unknown",
        }
    }
}

/// Positional metadata carried by every chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Display name of the originating file
    pub source: String,
    /// Zero-based position within the chunking invocation
    pub chunk_index: usize,
    /// When the chunk was produced
    pub date_processed: DateTime<Local>,
    /// Number of chunks produced by the invocation
    pub total_chunks: usize,
}

/// One chunk of document text, ready to be written as a JSONL line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    /// `{stem}_chunk_{n}`
    pub id: String,
    /// Trimmed, non-empty chunk text
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    /// Create a record whose `total_chunks` is filled in later
    pub fn new(
        id_base: &str,
        text: String,
        source: &str,
        chunk_index: usize,
        date_processed: DateTime<Local>,
    ) -> Self {
        Self {
            id: format!("{}_chunk_{}", id_base, chunk_index),
            text,
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index,
                date_processed,
                total_chunks: 0,
            },
        }
    }
}

/// Base name without the final extension, as used in chunk ids
pub fn source_stem(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string())
}
