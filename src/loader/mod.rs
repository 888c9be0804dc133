
use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::{ContractQaError, Result};

/// One page of extracted document text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub content: String,
    /// 1-based; Word documents are a single page
    pub page_number: u32,
    /// File name of the document, without directories
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Word,
}

impl FileType {
    /// Detect the file type from the extension, case-insensitively
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" | "doc" => Ok(Self::Word),
            "" => Err(ContractQaError::UnsupportedFileType(
                "file has no extension".to_string(),
            )),
            other => Err(ContractQaError::UnsupportedFileType(format!(".{other}"))),
        }
    }
}

impl fmt::Display for FileType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "PDF"),
            Self::Word => write!(f, "Word"),
        }
    }
}

/// Extract the text of a PDF or Word document, one entry per non-empty page
///
/// Pages without any visible text are dropped, so a scanned or empty
/// document yields an empty vector rather than an error.
#[inline]
pub fn load_document(path: &Path) -> Result<Vec<Page>> {
    let file_type = FileType::from_path(path)?;
    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Loading {} document {}", file_type, path.display());

    let pages = match file_type {
        FileType::Pdf => load_pdf(path, &source)?,
        FileType::Word => load_word(path, &source)?,
    };

    info!(
        "Extracted {} pages with text from {}",
        pages.len(),
        source
    );

    Ok(pages)
}

fn load_pdf(path: &Path, source: &str) -> Result<Vec<Page>> {
    let document = lopdf::Document::load(path).map_err(|e| {
        ContractQaError::Extraction(format!("could not read PDF {}: {e}", path.display()))
    })?;

    if document.is_encrypted() {
        return Err(ContractQaError::Extraction(format!(
            "{} is encrypted",
            path.display()
        )));
    }

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        match document.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => pages.push(Page {
                content: text,
                page_number,
                source: source.to_string(),
            }),
            Ok(_) => debug!("Page {} of {} has no text", page_number, source),
            Err(e) => warn!(
                "Skipping page {} of {}: text extraction failed: {}",
                page_number, source, e
            ),
        }
    }

    Ok(pages)
}

fn load_word(path: &Path, source: &str) -> Result<Vec<Page>> {
    let bytes = std::fs::read(path)?;
    let document = docx_rs::read_docx(&bytes).map_err(|e| {
        ContractQaError::Extraction(format!(
            "could not read Word document {}: {e}",
            path.display()
        ))
    })?;

    let mut content = String::new();
    for child in &document.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                push_paragraph(&mut content, paragraph);
            }
            DocumentChild::Table(table) => push_table(&mut content, table),
            _ => {}
        }
    }

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![Page {
        content,
        page_number: 1,
        source: source.to_string(),
    }])
}

fn push_paragraph(content: &mut String, paragraph: &Paragraph) {
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(text) => content.push_str(&text.text),
                    RunChild::Tab(_) => content.push('\t'),
                    RunChild::Break(_) => content.push('\n'),
                    _ => {}
                }
            }
        }
    }
    // Paragraph breaks become blank lines so the chunker can split on them
    content.push_str("\n\n");
}

#[allow(irrefutable_let_patterns)]
fn push_table(content: &mut String, table: &Table) {
    for row_child in &table.rows {
        let TableChild::TableRow(row) = row_child else {
            continue;
        };
        for cell_child in &row.cells {
            let TableRowChild::TableCell(cell) = cell_child else {
                continue;
            };
            for cell_content in &cell.children {
                match cell_content {
                    TableCellContent::Paragraph(paragraph) => push_paragraph(content, paragraph),
                    TableCellContent::Table(nested) => push_table(content, nested),
                    _ => {}
                }
            }
        }
    }
}
