//! Batch orchestration: discover, extract, chunk, accumulate

use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{IdScheme, PrepConfig};
use crate::error::{Error, Result};
use crate::types::{source_stem, ChunkRecord, FileType, SUPPORTED_EXTENSIONS};

use super::chunker::WordChunker;
use super::parser::{FileParser, TextExtractor};

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Text was extracted and chunked into this many records
    Chunked(usize),
    /// Extraction succeeded but produced no text
    Empty,
    /// Extraction failed; the file contributes nothing
    Failed(String),
    /// Extension outside the supported set
    Unsupported(String),
}

/// Per-file processing report
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Path of the file on disk
    pub path: PathBuf,
    /// Display name recorded as `metadata.source`
    pub source: String,
    pub outcome: FileOutcome,
}

/// Result of a batch run, in file-processing order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub records: Vec<ChunkRecord>,
}

impl BatchReport {
    /// Chunk count per source, in order of first appearance
    pub fn summary(&self) -> Vec<(String, usize)> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut summary: Vec<(String, usize)> = Vec::new();

        for record in &self.records {
            let source = record.metadata.source.as_str();
            match positions.get(source) {
                Some(&pos) => summary[pos].1 += 1,
                None => {
                    positions.insert(source, summary.len());
                    summary.push((source.to_string(), 1));
                }
            }
        }

        summary
    }

    /// Number of files that failed extraction
    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed(_)))
            .count()
    }
}

/// Directory-to-records pipeline
pub struct IngestPipeline {
    config: PrepConfig,
    chunker: WordChunker,
    extractor: Box<dyn TextExtractor>,
}

impl IngestPipeline {
    /// Create a pipeline with the built-in [`FileParser`]
    pub fn new(config: PrepConfig) -> Result<Self> {
        Self::with_extractor(config, FileParser::default())
    }

    /// Create a pipeline with a custom extractor
    ///
    /// Validates the whole configuration first, so a bad chunk size or
    /// overlap stops the run before any file is touched.
    pub fn with_extractor(config: PrepConfig, extractor: impl TextExtractor + 'static) -> Result<Self> {
        config.validate()?;
        let chunker = WordChunker::new(&config.chunking)?;

        Ok(Self {
            config,
            chunker,
            extractor: Box::new(extractor),
        })
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    /// Supported files in `input_dir`, sorted by path
    pub fn discover(&self, input_dir: &Path) -> Result<Vec<PathBuf>> {
        if !input_dir.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input directory not found: {}", input_dir.display()),
            )));
        }

        let max_depth = if self.config.input.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.to_string_lossy().to_lowercase())
                    .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            })
            .collect();

        files.sort();
        Ok(files)
    }

    /// Discover and process every supported file in `input_dir`
    pub fn run(&self, input_dir: &Path) -> Result<BatchReport> {
        let files = self.discover(input_dir)?;
        Ok(self.process_files(input_dir, &files, |_| {}))
    }

    /// Process `files` in order, calling `on_file` as each one finishes
    ///
    /// With `input.jobs > 1` files are handled on a rayon pool; the merged
    /// output keeps the order of `files` either way.
    pub fn process_files<F>(&self, input_dir: &Path, files: &[PathBuf], on_file: F) -> BatchReport
    where
        F: Fn(&FileReport) + Sync,
    {
        if self.config.chunking.id_scheme == IdScheme::Stem {
            warn_on_stem_collisions(files);
        }

        let process = |path: &PathBuf| {
            let (report, records) = self.process_file(input_dir, path);
            on_file(&report);
            (report, records)
        };

        let results: Vec<(FileReport, Vec<ChunkRecord>)> = match self.thread_pool() {
            Some(pool) => pool.install(|| files.par_iter().map(process).collect()),
            None => files.iter().map(process).collect(),
        };

        let mut batch = BatchReport::default();
        for (report, records) in results {
            batch.files.push(report);
            batch.records.extend(records);
        }

        tracing::info!(
            files = batch.files.len(),
            chunks = batch.records.len(),
            failed = batch.failed_files(),
            "batch complete"
        );
        batch
    }

    /// Extract and chunk one file; never fails the batch
    pub fn process_file(&self, input_dir: &Path, path: &Path) -> (FileReport, Vec<ChunkRecord>) {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::info!(
            file = %source,
            kind = FileType::from_path(path).display_name(),
            "processing"
        );

        let (outcome, records) = match self.extractor.extract(path) {
            Ok(text) if text.trim().is_empty() => {
                tracing::warn!(file = %source, "no text extracted");
                (FileOutcome::Empty, Vec::new())
            }
            Ok(text) => {
                let id_base = self.id_base(input_dir, path, &source);
                let records = self.chunker.chunk_with_id_base(&text, &source, &id_base);
                tracing::info!(file = %source, chunks = records.len(), "chunks generated");
                (FileOutcome::Chunked(records.len()), records)
            }
            Err(Error::UnsupportedFileType(ext)) => {
                tracing::warn!(file = %source, "unsupported format: {}", ext);
                (FileOutcome::Unsupported(ext), Vec::new())
            }
            Err(e) => {
                tracing::error!(file = %source, "extraction failed: {}", e);
                (FileOutcome::Failed(e.to_string()), Vec::new())
            }
        };

        let report = FileReport {
            path: path.to_path_buf(),
            source,
            outcome,
        };
        (report, records)
    }

    fn id_base(&self, input_dir: &Path, path: &Path, source: &str) -> String {
        match self.config.chunking.id_scheme {
            IdScheme::Stem => source_stem(source),
            IdScheme::RelativePath => relative_id_base(input_dir, path),
        }
    }

    fn thread_pool(&self) -> Option<rayon::ThreadPool> {
        let jobs = self.config.input.jobs;
        if jobs <= 1 {
            return None;
        }

        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!("could not start {} workers, running sequentially: {}", jobs, e);
                None
            }
        }
    }
}

/// Path relative to the input dir, extension dropped, `/`-separated
fn relative_id_base(input_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(input_dir).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn warn_on_stem_collisions(files: &[PathBuf]) {
    let mut seen: HashMap<String, &Path> = HashMap::new();
    for path in files {
        let Some(stem) = path.file_stem() else { continue };
        let stem = stem.to_string_lossy().into_owned();
        if let Some(previous) = seen.get(&stem) {
            tracing::warn!(
                "{} and {} share the stem '{}'; their chunk ids will collide",
                previous.display(),
                path.display(),
                stem
            );
        } else {
            seen.insert(stem, path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use std::fs;

    /// Reads files as UTF-8 text; files containing "corrupt" fail
    struct FakeExtractor;

    impl TextExtractor for FakeExtractor {
        fn extract(&self, path: &Path) -> Result<String> {
            let text = fs::read_to_string(path)?;
            if text.contains("corrupt") {
                return Err(Error::file_parse(path.display().to_string(), "bad xref"));
            }
            Ok(text)
        }
    }

    fn config(words_per_chunk: usize, overlap: usize) -> PrepConfig {
        PrepConfig {
            chunking: ChunkingConfig::new(words_per_chunk, overlap),
            ..PrepConfig::default()
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let result = IngestPipeline::with_extractor(config(5, 5), FakeExtractor);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.DOCX", "x");
        write(dir.path(), "a.pdf", "x");
        write(dir.path(), "c.pptm", "x");
        write(dir.path(), "notes.txt", "x");
        write(dir.path(), "nested/d.xlsx", "x");

        let pipeline = IngestPipeline::with_extractor(config(5, 1), FakeExtractor).unwrap();
        let names: Vec<String> = pipeline
            .discover(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.DOCX", "c.pptm"]);

        let mut recursive = config(5, 1);
        recursive.input.recursive = true;
        let pipeline = IngestPipeline::with_extractor(recursive, FakeExtractor).unwrap();
        assert_eq!(pipeline.discover(dir.path()).unwrap().len(), 4);
    }

    #[test]
    fn test_discover_missing_dir() {
        let pipeline = IngestPipeline::with_extractor(config(5, 1), FakeExtractor).unwrap();
        let err = pipeline.discover(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_run_skips_failed_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.pdf", "one two three four");
        write(dir.path(), "b.pdf", "corrupt");
        write(dir.path(), "c.docx", "   \n ");
        write(dir.path(), "d.xlsx", "alpha $$$ beta");

        let pipeline = IngestPipeline::with_extractor(config(3, 1), FakeExtractor).unwrap();
        let report = pipeline.run(dir.path()).unwrap();

        let outcomes: Vec<&FileOutcome> = report.files.iter().map(|f| &f.outcome).collect();
        assert_eq!(outcomes[0], &FileOutcome::Chunked(2));
        assert!(matches!(outcomes[1], FileOutcome::Failed(_)));
        assert_eq!(outcomes[2], &FileOutcome::Empty);
        assert_eq!(outcomes[3], &FileOutcome::Chunked(2));
        assert_eq!(report.failed_files(), 1);

        let ids: Vec<&str> = report.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a_chunk_0", "a_chunk_1", "d_chunk_0", "d_chunk_1"]);
        assert_eq!(
            report.summary(),
            vec![("a.pdf".to_string(), 2), ("d.xlsx".to_string(), 2)]
        );
    }

    #[test]
    fn test_chunk_index_resets_per_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.pdf", "w1 w2 w3");
        write(dir.path(), "b.pdf", "w1 w2 w3");

        let pipeline = IngestPipeline::with_extractor(config(2, 0), FakeExtractor).unwrap();
        let report = pipeline.run(dir.path()).unwrap();

        let indexes: Vec<(usize, usize)> = report
            .records
            .iter()
            .map(|r| (r.metadata.chunk_index, r.metadata.total_chunks))
            .collect();
        assert_eq!(indexes, vec![(0, 2), (1, 2), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_relative_path_ids_disambiguate() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "2023/report.pdf", "old");
        write(dir.path(), "2024/report.pdf", "new");

        let mut cfg = config(5, 1);
        cfg.input.recursive = true;
        cfg.chunking.id_scheme = IdScheme::RelativePath;
        let pipeline = IngestPipeline::with_extractor(cfg, FakeExtractor).unwrap();
        let report = pipeline.run(dir.path()).unwrap();

        let ids: Vec<&str> = report.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2023/report_chunk_0", "2024/report_chunk_0"]);
        assert!(report.records.iter().all(|r| r.metadata.source == "report.pdf"));
    }

    #[test]
    fn test_parallel_run_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..12 {
            write(dir.path(), &format!("doc{:02}.pdf", i), &format!("file {} body text", i));
        }

        let sequential = IngestPipeline::with_extractor(config(2, 1), FakeExtractor)
            .unwrap()
            .run(dir.path())
            .unwrap();

        let mut parallel_cfg = config(2, 1);
        parallel_cfg.input.jobs = 4;
        let parallel = IngestPipeline::with_extractor(parallel_cfg, FakeExtractor)
            .unwrap()
            .run(dir.path())
            .unwrap();

        let ids = |r: &BatchReport| r.records.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&sequential), ids(&parallel));
        assert_eq!(sequential.summary(), parallel.summary());
    }

    #[test]
    fn test_unsupported_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "legacy.doc", "old format");

        let pipeline = IngestPipeline::new(config(5, 1)).unwrap();
        let (report, records) = pipeline.process_file(dir.path(), &path);
        assert_eq!(report.outcome, FileOutcome::Unsupported("doc".to_string()));
        assert!(records.is_empty());
    }

    #[test]
    fn test_relative_id_base() {
        assert_eq!(
            relative_id_base(Path::new("/in"), Path::new("/in/a/b/deck.v2.pptx")),
            "a/b/deck.v2"
        );
        assert_eq!(relative_id_base(Path::new("/in"), Path::new("/in/top.pdf")), "top");
    }
}
