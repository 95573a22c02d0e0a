use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Semaphore;

use crate::upload::{MediaType, UploadedDocument};

// ── Constants ────────────────────────────────────────────────────────────────

const PDF_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking threads that may be parsing PDFs at once.
pub const MAX_PDF_EXTRACTIONS: usize = 4;

static PDF_SLOTS: Lazy<Arc<Semaphore>> =
    Lazy::new(|| Arc::new(Semaphore::new(MAX_PDF_EXTRACTIONS)));

// ── Lazy static regexes ──────────────────────────────────────────────────────

static CONTROL_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap());

static TRAILING_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());

static MULTI_NEWLINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content does not match declared type {declared}")]
    Mismatch { declared: String },
    #[error("failed to read PDF: {0}")]
    Pdf(String),
    #[error("PDF text extraction timed out")]
    Timeout,
    #[error("no text found in PDF")]
    NoText,
}

// ── Extracted content ────────────────────────────────────────────────────────

/// What the prompts are built from. Images travel as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    Image { bytes: Vec<u8>, media_type: MediaType },
    Text { plain_text: String },
}

impl ExtractedContent {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractedContent::Image { .. } => "image",
            ExtractedContent::Text { .. } => "pdf",
        }
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

pub async fn extract(doc: UploadedDocument) -> Result<ExtractedContent, ContentError> {
    match doc.detected_type() {
        Some(MediaType::Pdf) => {
            let plain_text = extract_pdf_text(doc.data).await?;
            Ok(ExtractedContent::Text { plain_text })
        }
        Some(media_type) => Ok(ExtractedContent::Image {
            bytes: doc.data,
            media_type,
        }),
        None => Err(ContentError::Mismatch {
            declared: doc.declared_type.unwrap_or_else(|| "unknown".to_string()),
        }),
    }
}

// ── PDF text ─────────────────────────────────────────────────────────────────

async fn extract_pdf_text(data: Vec<u8>) -> Result<String, ContentError> {
    let raw = tokio::time::timeout(PDF_EXTRACTION_TIMEOUT, async move {
        let permit = PDF_SLOTS
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ContentError::Pdf(e.to_string()))?;
        // A timed-out parse keeps running on its blocking thread. The permit
        // moves into the closure so the slot stays taken until it finishes.
        // The parser may also panic on hostile input; that surfaces as a
        // JoinError.
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pdf_extract::extract_text_from_mem(&data)
        })
        .await
        .map_err(|e| ContentError::Pdf(format!("parser aborted: {}", e)))?
        .map_err(|e| ContentError::Pdf(e.to_string()))
    })
    .await
    .map_err(|_| ContentError::Timeout)??;

    let text = sanitize_text(&raw);
    tracing::debug!(chars = text.chars().count(), "PDF text extracted");

    if text.is_empty() {
        return Err(ContentError::NoText);
    }
    Ok(text)
}

pub fn sanitize_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = CONTROL_CHARS_RE.replace_all(&text, "");
    let text = TRAILING_SPACE_RE.replace_all(&text, "\n");
    MULTI_NEWLINE_RE
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}
