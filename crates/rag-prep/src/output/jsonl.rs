//! Newline-delimited JSON output
//!
//! One compact object per line, UTF-8, non-ASCII written as-is.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ChunkRecord;

/// Write `records` to `path`, creating parent directories
pub fn write_jsonl(path: &Path, records: &[ChunkRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    tracing::debug!(path = %path.display(), records = records.len(), "wrote jsonl");
    Ok(())
}

/// Read every record from a JSONL file, skipping blank lines
pub fn read_jsonl(path: &Path) -> Result<Vec<ChunkRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            Error::file_parse(
                path.display().to_string(),
                format!("line {}: {}", line_number + 1, e),
            )
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Pretty-printed record, cut to at most `max_chars` characters
pub fn preview(record: &ChunkRecord, max_chars: usize) -> Result<String> {
    let pretty = serde_json::to_string_pretty(record)?;
    Ok(match pretty.char_indices().nth(max_chars) {
        Some((cut, _)) => pretty[..cut].to_string(),
        None => pretty,
    })
}
