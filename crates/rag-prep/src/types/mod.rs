//! Core types for the preprocessing pipeline

pub mod document;

pub use document::{source_stem, ChunkMetadata, ChunkRecord, FileType, SUPPORTED_EXTENSIONS};
