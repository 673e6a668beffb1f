//! Multi-format text extraction
//!
//! Every adapter returns one plain-text blob per file. An empty string means
//! the file parsed but held no text; real failures come back as
//! [`Error::FileParse`] so the batch can skip the file and carry on.

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::FileType;

/// Anything that can turn a file into plain text
pub trait TextExtractor: Send + Sync {
    /// Extract the text of the file at `path`
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Extractor backed by pdf-extract/lopdf, docx-rs, zip + quick-xml and calamine
#[derive(Debug, Clone)]
pub struct FileParser {
    /// How long pdf-extract may run before falling back to lopdf
    pdf_timeout: Duration,
}

impl Default for FileParser {
    fn default() -> Self {
        Self {
            pdf_timeout: Duration::from_secs(60),
        }
    }
}

impl TextExtractor for FileParser {
    fn extract(&self, path: &Path) -> Result<String> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let file_type = FileType::from_path(path);
        if !file_type.is_supported() {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(Error::UnsupportedFileType(ext));
        }

        let data = std::fs::read(path).map_err(|e| Error::file_parse(&filename, e.to_string()))?;
        self.parse(&filename, file_type, &data)
    }
}

impl FileParser {
    /// Create a parser with a custom PDF extraction timeout
    pub fn with_pdf_timeout(pdf_timeout: Duration) -> Self {
        Self { pdf_timeout }
    }

    /// Extract text from in-memory file contents
    pub fn parse(&self, filename: &str, file_type: FileType, data: &[u8]) -> Result<String> {
        let text = match file_type {
            FileType::Pdf => self.parse_pdf(filename, data),
            FileType::Docx => Self::parse_docx(filename, data),
            FileType::Pptx => Self::parse_pptx(filename, data),
            FileType::Xlsx => Self::parse_xlsx(filename, data),
            FileType::Unknown => Err(Error::UnsupportedFileType(filename.to_string())),
        }?;

        Ok(text.trim().to_string())
    }

    #[cfg(feature = "pdf")]
    fn parse_pdf(&self, filename: &str, data: &[u8]) -> Result<String> {
        let text = self.extract_pdf_with_timeout(filename, data)?;
        Ok(text.replace('\0', ""))
    }

    /// Run pdf-extract on a worker thread; it can hang or panic on odd fonts
    #[cfg(feature = "pdf")]
    fn extract_pdf_with_timeout(&self, filename: &str, data: &[u8]) -> Result<String> {
        use std::sync::mpsc;
        use std::thread;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.pdf_timeout) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Ok(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!(file = filename, "pdf-extract failed: {}, trying lopdf", e);
                Self::extract_pdf_fallback(filename, data)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!(
                    file = filename,
                    "pdf-extract timed out after {:?}, trying lopdf",
                    self.pdf_timeout
                );
                Self::extract_pdf_fallback(filename, data)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!(file = filename, "pdf-extract thread crashed, trying lopdf");
                Self::extract_pdf_fallback(filename, data)
            }
        }
    }

    /// Page-by-page extraction with lopdf, pages joined by newlines
    #[cfg(feature = "pdf")]
    fn extract_pdf_fallback(filename: &str, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let mut text = String::new();
        for page_number in doc.get_pages().keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => {
                    tracing::debug!(file = filename, "could not read page {}: {}", page_number, e);
                }
            }
        }

        Ok(text)
    }

    #[cfg(not(feature = "pdf"))]
    fn parse_pdf(&self, filename: &str, _data: &[u8]) -> Result<String> {
        Err(Error::UnsupportedFileType(format!("{} - built without the `pdf` feature", filename)))
    }

    /// Paragraph text joined by newlines, blank paragraphs skipped
    #[cfg(feature = "docx")]
    fn parse_docx(filename: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data).map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut paragraphs = Vec::new();
        for child in &doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut paragraph = String::new();
                push_paragraph_text(&p.children, &mut paragraph);
                if !paragraph.trim().is_empty() {
                    paragraphs.push(paragraph);
                }
            }
        }

        Ok(paragraphs.join("\n"))
    }

    #[cfg(not(feature = "docx"))]
    fn parse_docx(filename: &str, _data: &[u8]) -> Result<String> {
        Err(Error::UnsupportedFileType(format!("{} - built without the `docx` feature", filename)))
    }

    /// Shape text of every slide, in presentation order
    #[cfg(feature = "pptx")]
    fn parse_pptx(filename: &str, data: &[u8]) -> Result<String> {
        use std::io::Read;

        let cursor = std::io::Cursor::new(data);
        let mut archive =
            zip::ZipArchive::new(cursor).map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut content = String::new();
        for slide_name in slide_order(&mut archive) {
            let mut xml = String::new();
            archive
                .by_name(&slide_name)
                .map_err(|e| Error::file_parse(filename, e.to_string()))?
                .read_to_string(&mut xml)
                .map_err(|e| Error::file_parse(filename, format!("{}: {}", slide_name, e)))?;

            for shape_text in extract_shape_texts(&xml) {
                content.push_str(&shape_text);
                content.push('\n');
            }
        }

        Ok(content)
    }

    #[cfg(not(feature = "pptx"))]
    fn parse_pptx(filename: &str, _data: &[u8]) -> Result<String> {
        Err(Error::UnsupportedFileType(format!("{} - built without the `pptx` feature", filename)))
    }

    /// One `[Sheet: name]` header per sheet, then pipe-joined rows
    #[cfg(feature = "xlsx")]
    fn parse_xlsx(filename: &str, data: &[u8]) -> Result<String> {
        use calamine::Reader;

        let cursor = std::io::Cursor::new(data);
        let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
            .map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut content = String::new();
        for sheet_name in workbook.sheet_names().to_vec() {
            content.push_str(&format!("\n[Sheet: {}]\n", sheet_name));

            match workbook.worksheet_range(&sheet_name) {
                Ok(range) => {
                    for row in range.rows() {
                        if let Some(line) = format_row(row) {
                            content.push_str(&line);
                            content.push('\n');
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(file = filename, sheet = %sheet_name, "skipping sheet: {}", e);
                }
            }
        }

        Ok(content)
    }

    #[cfg(not(feature = "xlsx"))]
    fn parse_xlsx(filename: &str, _data: &[u8]) -> Result<String> {
        Err(Error::UnsupportedFileType(format!("{} - built without the `xlsx` feature", filename)))
    }
}

/// Join the non-empty cells of a row with ` | `
#[cfg(feature = "xlsx")]
fn format_row(row: &[calamine::Data]) -> Option<String> {
    use calamine::Data;

    let cells: Vec<String> = row
        .iter()
        .filter_map(|cell| match cell {
            Data::String(s) => Some(s.clone()),
            Data::Float(f) => Some(f.to_string()),
            Data::Int(i) => Some(i.to_string()),
            Data::Bool(b) => Some(b.to_string()),
            Data::DateTime(dt) => Some(format_excel_datetime(dt)),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
            _ => None,
        })
        .collect();

    let line = cells.join(" | ");
    if line.trim().is_empty() {
        None
    } else {
        Some(line)
    }
}

/// `YYYY-MM-DD HH:MM:SS` for date cells; durations and out-of-range values keep the serial
#[cfg(feature = "xlsx")]
fn format_excel_datetime(dt: &calamine::ExcelDateTime) -> String {
    if dt.is_datetime() {
        if let Some(datetime) = dt.as_datetime() {
            return datetime.to_string();
        }
    }
    dt.to_string()
}

/// Run text of a paragraph; tabs and breaks become whitespace, hyperlink runs are included
#[cfg(feature = "docx")]
fn push_paragraph_text(children: &[docx_rs::ParagraphChild], out: &mut String) {
    use docx_rs::{ParagraphChild, RunChild};

    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for child in &run.children {
                    match child {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) | RunChild::PTab(_) => out.push('\t'),
                        RunChild::Break(_) | RunChild::CarriageReturn(_) => out.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_paragraph_text(&link.children, out),
            _ => {}
        }
    }
}

/// Slide part names in the order the deck presents them
///
/// Follows `<p:sldIdLst>` in `ppt/presentation.xml` through its relationships
/// part. Decks missing either part fall back to the number in `slideN.xml`.
#[cfg(feature = "pptx")]
fn slide_order<R: std::io::Read + std::io::Seek>(archive: &mut zip::ZipArchive<R>) -> Vec<String> {
    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    numbered.sort();

    let presentation = read_zip_text(archive, "ppt/presentation.xml");
    let relationships = read_zip_text(archive, "ppt/_rels/presentation.xml.rels");
    if let (Some(presentation), Some(relationships)) = (presentation, relationships) {
        let targets = relationship_targets(&relationships);
        let ordered: Vec<String> = slide_relationship_ids(&presentation)
            .iter()
            .filter_map(|id| targets.get(id))
            .map(|target| match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("ppt/{}", target),
            })
            .filter(|name| archive.index_for_name(name).is_some())
            .collect();

        if !ordered.is_empty() {
            return ordered;
        }
        tracing::debug!("presentation.xml lists no slides, using file name order");
    }

    numbered.into_iter().map(|(_, name)| name).collect()
}

#[cfg(feature = "pptx")]
fn read_zip_text<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Option<String> {
    use std::io::Read;

    let mut file = archive.by_name(name).ok()?;
    let mut text = String::new();
    file.read_to_string(&mut text).ok()?;
    Some(text)
}

/// `Id -> Target` for every `<Relationship>` in a `.rels` part
#[cfg(feature = "pptx")]
fn relationship_targets(xml: &str) -> std::collections::HashMap<String, String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut targets = std::collections::HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().ok().map(|v| v.into_owned());
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = value,
                        b"Target" => target = value,
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("malformed relationships xml: {}", e);
                break;
            }
            _ => {}
        }
    }

    targets
}

/// Relationship ids (`r:id`) of `<p:sldId>` entries, in list order
#[cfg(feature = "pptx")]
fn slide_relationship_ids(xml: &str) -> Vec<String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldId" => {
                let rel_id = e
                    .attributes()
                    .flatten()
                    .find(|attr| {
                        attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id"
                    })
                    .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()));
                if let Some(rel_id) = rel_id {
                    ids.push(rel_id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("malformed presentation xml: {}", e);
                break;
            }
            _ => {}
        }
    }

    ids
}

/// Text of each text-bearing shape (`p:sp`) in a slide, paragraphs joined by newlines
#[cfg(feature = "pptx")]
fn extract_shape_texts(xml: &str) -> Vec<String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);

    let mut shapes = Vec::new();
    let mut in_shape = false;
    let mut has_text_body = false;
    let mut in_text_run = false;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut paragraph = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sp" => {
                    in_shape = true;
                    has_text_body = false;
                    paragraphs.clear();
                }
                b"txBody" if in_shape => has_text_body = true,
                b"p" if in_shape => paragraph.clear(),
                b"t" if in_shape => in_text_run = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"txBody" if in_shape => has_text_body = true,
                b"p" if in_shape && has_text_body => paragraphs.push(String::new()),
                b"br" if in_shape => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                if let Ok(text) = e.unescape() {
                    paragraph.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" if in_shape && has_text_body => {
                    paragraphs.push(std::mem::take(&mut paragraph));
                }
                b"sp" if in_shape => {
                    if has_text_body {
                        shapes.push(paragraphs.join("\n"));
                    }
                    in_shape = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("malformed slide xml at {}: {}", reader.buffer_position(), e);
                break;
            }
            _ => {}
        }
    }

    shapes
}
