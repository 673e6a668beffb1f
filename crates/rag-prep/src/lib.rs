//! rag-prep: turn office documents into overlapping text chunks for RAG indexing
//!
//! Files (PDF, DOCX, PPTX/PPTM, XLSX) are reduced to plain text, split on a
//! thematic marker and then into word windows, and written as JSONL records.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod output;
pub mod types;

pub use config::{ChunkingConfig, IdScheme, PrepConfig, TimestampMode};
pub use error::{Error, Result};
pub use ingestion::{
    chunk, BatchReport, FileOutcome, FileParser, FileReport, IngestPipeline, TextExtractor,
    WordChunker,
};
pub use types::{ChunkMetadata, ChunkRecord, FileType};
