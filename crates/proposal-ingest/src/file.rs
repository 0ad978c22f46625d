//! File text extraction for the supported upload and corpus formats.

use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use proposal_core::{Error, Result};
use regex::{Captures, Regex};
use tracing::{debug, warn};

static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").unwrap());
static TEXT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").unwrap());
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").unwrap());

/// Supported file types for text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    PlainText,
    Pdf,
    Docx,
    Unknown,
}

impl FileType {
    /// Detect file type from extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" => Self::PlainText,
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext)
    }
}

/// A unit of source material: a corpus file or a user upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name, used as the citation identifier.
    pub id: String,
    pub text: String,
}

/// Extract text content from a file.
///
/// Unsupported types yield an empty string rather than an error.
pub fn extract_text(path: &Path) -> Result<String> {
    match FileType::from_path(path) {
        FileType::PlainText => {
            let bytes = std::fs::read(path)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        FileType::Pdf => extract_pdf(path),
        FileType::Docx => extract_docx(path),
        FileType::Unknown => {
            debug!("Unsupported file type, skipping: {}", path.display());
            Ok(String::new())
        }
    }
}

/// Read a file into a [`Document`]. Returns None when no text was extracted.
pub fn load_document(path: &Path) -> Result<Option<Document>> {
    let text = extract_text(path)?;
    if text.trim().is_empty() {
        debug!("No text extracted from {}", path.display());
        return Ok(None);
    }

    let id = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(Some(Document { id, text }))
}

/// Run a third-party parser, turning a panic into an ingest error for `path`.
fn guard_parser<T>(path: &Path, parse: impl FnOnce() -> Result<T>) -> Result<T> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(parse)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        warn!("Parser panicked on {}: {}", path.display(), reason);
        Err(Error::Ingest(format!("Parser crashed on {}: {}", path.display(), reason)))
    })
}

/// Concatenate per-page text, skipping pages without text.
fn extract_pdf(path: &Path) -> Result<String> {
    let pages = guard_parser(path, || {
        pdf_extract::extract_text_by_pages(path).map_err(|e| {
            Error::Ingest(format!("PDF extraction failed for {}: {}", path.display(), e))
        })
    })?;

    let text = pages
        .iter()
        .filter(|page| !page.trim().is_empty())
        .map(|page| page.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(text)
}

/// Concatenate paragraph texts from `word/document.xml` in document order.
fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::Ingest(format!("Invalid DOCX archive {}: {}", path.display(), e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::Ingest(format!("DOCX body missing in {}: {}", path.display(), e)))?
        .read_to_string(&mut xml)?;

    Ok(docx_paragraphs(&xml).join(" "))
}

/// Paragraph texts of a WordprocessingML body. Empty paragraphs are dropped.
pub fn docx_paragraphs(xml: &str) -> Vec<String> {
    PARAGRAPH_RE
        .captures_iter(xml)
        .map(|para| {
            TEXT_RUN_RE
                .captures_iter(&para[1])
                .map(|run| decode_xml_entities(&run[1]))
                .collect::<String>()
        })
        .filter(|text| !text.is_empty())
        .collect()
}

fn decode_xml_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        entity[1..].parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
