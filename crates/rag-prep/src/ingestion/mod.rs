//! Document ingestion: extraction, chunking and batch orchestration

pub mod chunker;
pub mod parser;
pub mod processor;

pub use chunker::{chunk, WordChunker};
pub use parser::{FileParser, TextExtractor};
pub use processor::{BatchReport, FileOutcome, FileReport, IngestPipeline};
