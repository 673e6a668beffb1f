//! Configuration for the preprocessing pipeline
//!
//! A single [`PrepConfig`] is threaded through every stage. It can be loaded
//! from TOML and then overridden from the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PrepConfig {
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Input discovery configuration
    pub input: InputConfig,
    /// Output configuration
    pub output: OutputConfig,
}

impl PrepConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.input.validate()
    }
}

/// How `date_processed` is stamped on the records of one chunking call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// Read the clock once per chunk
    PerChunk,
    /// Read the clock once and share it across the invocation
    #[default]
    PerInvocation,
}

/// How chunk ids are derived from a file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// `{file stem}_chunk_{n}`; files sharing a stem collide
    #[default]
    Stem,
    /// `{path relative to input dir, without extension}_chunk_{n}`
    RelativePath,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum number of words per chunk
    pub words_per_chunk: usize,
    /// Words repeated between consecutive chunks of a block
    pub overlap: usize,
    /// Split on `separator` before splitting by length
    pub thematic_split: bool,
    /// Thematic block marker
    pub separator: String,
    /// Timestamp policy
    pub timestamp_mode: TimestampMode,
    /// Chunk id policy
    pub id_scheme: IdScheme,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            words_per_chunk: 350,
            overlap: 150,
            thematic_split: true,
            separator: "$$$".to_string(),
            timestamp_mode: TimestampMode::default(),
            id_scheme: IdScheme::default(),
        }
    }
}

impl ChunkingConfig {
    /// Create a config with the given window and the default separator
    pub fn new(words_per_chunk: usize, overlap: usize) -> Self {
        Self {
            words_per_chunk,
            overlap,
            ..Self::default()
        }
    }

    /// Active thematic marker, if any
    pub fn active_separator(&self) -> Option<&str> {
        self.thematic_split.then_some(self.separator.as_str())
    }

    /// Reject settings that cannot produce a terminating window
    pub fn validate(&self) -> Result<()> {
        if self.words_per_chunk == 0 {
            return Err(Error::config("words_per_chunk must be greater than 0"));
        }
        if self.overlap >= self.words_per_chunk {
            return Err(Error::config(format!(
                "overlap ({}) must be smaller than words_per_chunk ({})",
                self.overlap, self.words_per_chunk
            )));
        }
        if self.thematic_split && self.separator.is_empty() {
            return Err(Error::config("separator must not be empty"));
        }
        Ok(())
    }
}

/// Input discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Number of files processed in parallel (1 = sequential)
    pub jobs: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            jobs: 1,
        }
    }
}

impl InputConfig {
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(Error::config("jobs must be at least 1"));
        }
        Ok(())
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// JSONL file to write; parent directories are created
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("documents.jsonl"),
        }
    }
}
