//! Word-window chunking with thematic block separators
//!
//! Text is first split into thematic blocks on the configured marker, then
//! each block is cut into windows of `words_per_chunk` words that advance by
//! `words_per_chunk - overlap`. Chunk numbering runs across all blocks of one
//! call, and `total_chunks` is backfilled once every chunk exists.

use chrono::{DateTime, Local};

use crate::config::{ChunkingConfig, TimestampMode};
use crate::error::Result;
use crate::types::{source_stem, ChunkRecord};

/// Word-based chunker with configurable window and overlap
#[derive(Debug, Clone)]
pub struct WordChunker {
    /// Maximum words per chunk
    words_per_chunk: usize,
    /// Words shared by consecutive windows
    overlap: usize,
    /// Thematic marker, if the thematic split is enabled
    separator: Option<String>,
    timestamp_mode: TimestampMode,
}

impl WordChunker {
    /// Create a new chunker, failing on a window that cannot advance
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            words_per_chunk: config.words_per_chunk,
            overlap: config.overlap,
            separator: config.active_separator().map(str::to_string),
            timestamp_mode: config.timestamp_mode,
        })
    }

    /// Chunk `text`, deriving ids from the stem of `source_name`
    pub fn chunk(&self, text: &str, source_name: &str) -> Vec<ChunkRecord> {
        self.chunk_with_id_base(text, source_name, &source_stem(source_name))
    }

    /// Chunk `text` with ids of the form `{id_base}_chunk_{n}`
    pub fn chunk_with_id_base(
        &self,
        text: &str,
        source_name: &str,
        id_base: &str,
    ) -> Vec<ChunkRecord> {
        let invocation_time = Local::now();
        let mut chunks: Vec<ChunkRecord> = Vec::new();

        for block in self.split_into_blocks(text) {
            let words: Vec<&str> = block.split_whitespace().collect();

            for start in (0..words.len()).step_by(self.step()) {
                let end = (start + self.words_per_chunk).min(words.len());
                let joined = words[start..end].join(" ");
                let chunk_text = joined.trim();

                if chunk_text.is_empty() {
                    continue;
                }

                chunks.push(ChunkRecord::new(
                    id_base,
                    chunk_text.to_string(),
                    source_name,
                    chunks.len(),
                    self.timestamp(invocation_time),
                ));
            }
        }

        let total = chunks.len();
        for chunk in &mut chunks {
            chunk.metadata.total_chunks = total;
        }

        tracing::debug!(source = source_name, chunks = total, "chunked text");
        chunks
    }

    /// Window advance; never zero for a validated config
    fn step(&self) -> usize {
        self.words_per_chunk - self.overlap
    }

    /// Split text into thematic blocks
    fn split_into_blocks<'a>(&self, text: &'a str) -> Vec<&'a str> {
        match self.separator.as_deref() {
            Some(separator) if text.contains(separator) => text
                .split(separator)
                .map(str::trim)
                .filter(|block| !block.is_empty())
                .collect(),
            _ => vec![text],
        }
    }

    fn timestamp(&self, invocation_time: DateTime<Local>) -> DateTime<Local> {
        match self.timestamp_mode {
            TimestampMode::PerChunk => Local::now(),
            TimestampMode::PerInvocation => invocation_time,
        }
    }
}

/// Chunk `text` with an explicit window and overlap
///
/// Fails with a configuration error before producing anything when
/// `words_per_chunk` is zero or `overlap >= words_per_chunk`.
pub fn chunk(
    text: &str,
    source_name: &str,
    words_per_chunk: usize,
    overlap: usize,
) -> Result<Vec<ChunkRecord>> {
    let chunker = WordChunker::new(&ChunkingConfig::new(words_per_chunk, overlap))?;
    Ok(chunker.chunk(text, source_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;

    fn texts(chunks: &[ChunkRecord]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_overlapping_windows() {
        let chunks = chunk("a b c d e f g h", "letters.pdf", 3, 1).unwrap();

        assert_eq!(texts(&chunks), vec!["a b c", "c d e", "e f g", "g h"]);
        assert!(chunks.iter().all(|c| c.metadata.total_chunks == 4));
        assert_eq!(chunks[0].id, "letters_chunk_0");
        assert_eq!(chunks[3].id, "letters_chunk_3");
        assert!(chunks.iter().all(|c| c.metadata.source == "letters.pdf"));
    }

    #[test]
    fn test_thematic_blocks() {
        let chunks = chunk("block one $$$ block two", "notes.docx", 350, 150).unwrap();

        assert_eq!(texts(&chunks), vec!["block one", "block two"]);
        assert_eq!(chunks[0].metadata.chunk_index, 0);
        assert_eq!(chunks[1].metadata.chunk_index, 1);
        assert_eq!(chunks[1].metadata.total_chunks, 2);
    }

    #[test]
    fn test_numbering_continues_across_blocks() {
        let chunks = chunk("a b c d $$$ e f g", "doc.pdf", 2, 0).unwrap();

        assert_eq!(texts(&chunks), vec!["a b", "c d", "e f", "g"]);
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["doc_chunk_0", "doc_chunk_1", "doc_chunk_2", "doc_chunk_3"]);
    }

    #[test]
    fn test_empty_blocks_are_dropped() {
        let chunks = chunk("$$$  $$$ only block $$$\n\t$$$", "x.pdf", 10, 2).unwrap();
        assert_eq!(texts(&chunks), vec!["only block"]);
        assert_eq!(chunks[0].metadata.total_chunks, 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk("", "empty.pdf", 350, 150).unwrap().is_empty());
        assert!(chunk("   \n\t ", "blank.pdf", 350, 150).unwrap().is_empty());
        assert!(chunk("$$$", "marker.pdf", 350, 150).unwrap().is_empty());
    }

    #[test]
    fn test_short_block_yields_one_chunk() {
        let chunks = chunk("  just   a few\nwords  ", "short.xlsx", 350, 150).unwrap();
        assert_eq!(texts(&chunks), vec!["just a few words"]);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        for (size, overlap) in [(3, 3), (3, 4), (0, 0)] {
            let err = chunk("a b c d", "bad.pdf", size, overlap).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{size}/{overlap}");
        }
    }

    #[test]
    fn test_thematic_split_disabled() {
        let config = ChunkingConfig {
            thematic_split: false,
            ..ChunkingConfig::new(10, 0)
        };
        let chunker = WordChunker::new(&config).unwrap();
        let chunks = chunker.chunk("one $$$ two", "raw.pdf");
        assert_eq!(texts(&chunks), vec!["one $$$ two"]);
    }

    #[test]
    fn test_custom_separator() {
        let config = ChunkingConfig {
            separator: "---".to_string(),
            ..ChunkingConfig::new(10, 0)
        };
        let chunker = WordChunker::new(&config).unwrap();
        let chunks = chunker.chunk("intro --- body $$$ tail", "sep.pdf");
        assert_eq!(texts(&chunks), vec!["intro", "body $$$ tail"]);
    }

    #[test]
    fn test_explicit_id_base() {
        let chunker = WordChunker::new(&ChunkingConfig::new(5, 1)).unwrap();
        let chunks = chunker.chunk_with_id_base("hello world", "report.pdf", "2024/report");
        assert_eq!(chunks[0].id, "2024/report_chunk_0");
        assert_eq!(chunks[0].metadata.source, "report.pdf");
    }

    #[test]
    fn test_non_ascii_text_is_preserved() {
        let chunks = chunk("Año de gestión $$$ Überblick", "planificación.pdf", 5, 1).unwrap();
        assert_eq!(texts(&chunks), vec!["Año de gestión", "Überblick"]);
        assert_eq!(chunks[0].id, "planificación_chunk_0");
    }

    #[test]
    fn test_per_invocation_timestamp_is_shared() {
        let chunker = WordChunker::new(&ChunkingConfig {
            timestamp_mode: TimestampMode::PerInvocation,
            ..ChunkingConfig::new(1, 0)
        })
        .unwrap();

        let chunks = chunker.chunk("a b c d e f", "t.pdf");
        let first = chunks[0].metadata.date_processed;
        assert!(chunks.iter().all(|c| c.metadata.date_processed == first));
    }

    #[test]
    fn test_per_chunk_timestamp_is_monotonic() {
        // Per-chunk stamps are read in emission order; they may still be equal
        // when the clock does not tick between chunks.
        let chunker = WordChunker::new(&ChunkingConfig {
            timestamp_mode: TimestampMode::PerChunk,
            ..ChunkingConfig::new(1, 0)
        })
        .unwrap();

        let chunks = chunker.chunk("a b c d e f", "t.pdf");
        assert!(chunks
            .windows(2)
            .all(|w| w[0].metadata.date_processed <= w[1].metadata.date_processed));
    }

    #[test]
    fn test_repeated_calls_match() {
        let chunker = WordChunker::new(&ChunkingConfig::new(4, 2)).unwrap();
        let text = "uno dos tres cuatro cinco seis siete $$$ ocho nueve";
        let first = chunker.chunk(text, "same.pdf");
        let second = chunker.chunk(text, "same.pdf");

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.text, b.text);
            assert_eq!(a.metadata.chunk_index, b.metadata.chunk_index);
            assert_eq!(a.metadata.total_chunks, b.metadata.total_chunks);
        }
    }

    fn window_and_overlap() -> impl Strategy<Value = (usize, usize)> {
        (1usize..12).prop_flat_map(|size| (Just(size), 0..size))
    }

    proptest! {
        #[test]
        fn prop_indexes_and_totals((size, overlap) in window_and_overlap(),
                                   words in prop::collection::vec("[a-z]{1,6}", 1..60)) {
            let text = words.join(" ");
            let chunks = chunk(&text, "p.pdf", size, overlap).unwrap();

            prop_assert!(!chunks.is_empty());
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.metadata.chunk_index, i);
                prop_assert_eq!(c.metadata.total_chunks, chunks.len());
                prop_assert!(!c.text.is_empty());
                prop_assert!(c.text.split(' ').count() <= size);
            }
        }

        #[test]
        fn prop_windows_cover_every_word((size, overlap) in window_and_overlap(),
                                         words in prop::collection::vec("[a-z]{1,6}", 1..60)) {
            let text = words.join("  ");
            let chunks = chunk(&text, "p.pdf", size, overlap).unwrap();
            let step = size - overlap;

            prop_assert_eq!(chunks.len(), words.len().div_ceil(step));
            for (k, c) in chunks.iter().enumerate() {
                let start = k * step;
                let end = (start + size).min(words.len());
                prop_assert_eq!(&c.text, &words[start..end].join(" "));
            }
        }
    }
}
