use axum::extract::Multipart;

use crate::config::UploadPolicy;

// ── Constants ────────────────────────────────────────────────────────────────

/// Form fields that may carry the uploaded file. `image` is the legacy name.
const FILE_FIELDS: &[&str] = &["file", "image"];
const FILE_TYPE_FIELD: &str = "fileType";

/// Readers accept a PDF header anywhere in the first kilobyte.
const PDF_HEADER_WINDOW: usize = 1024;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no file was uploaded")]
    MissingFile,
    #[error("failed to read upload: {0}")]
    Multipart(String),
    #[error("uploaded file is empty")]
    Empty,
    #[error("file is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
}

// ── Media types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Gif,
    Pdf,
}

impl MediaType {
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Pdf => "application/pdf",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        // Drop parameters such as "; charset=binary".
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/gif" => Some(MediaType::Gif),
            "application/pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    /// Derive the type from magic bytes. Client-declared types are never
    /// used to choose the extraction branch.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(MediaType::Jpeg);
        }
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(MediaType::Png);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(MediaType::Gif);
        }
        let head = &data[..data.len().min(PDF_HEADER_WINDOW)];
        if head.windows(5).any(|w| w == b"%PDF-") {
            return Some(MediaType::Pdf);
        }
        None
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, MediaType::Pdf)
    }
}

// ── Uploaded document ────────────────────────────────────────────────────────

/// One upload, owned by its request and dropped with it.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub declared_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, declared_type: Option<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            declared_type,
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn detected_type(&self) -> Option<MediaType> {
        MediaType::sniff(&self.data)
    }

    /// Type used for logs: sniffed when possible, else whatever the client sent.
    pub fn display_type(&self) -> String {
        match (self.detected_type(), self.declared_type.as_deref()) {
            (Some(t), _) => t.as_mime().to_string(),
            (None, Some(declared)) => declared.to_string(),
            (None, None) => "unknown".to_string(),
        }
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Size and type gate. Runs before any content is derived from the bytes.
///
/// When sniffing fails but the declared type is accepted, the upload passes
/// here and the extractor reports the mismatch.
pub fn validate(doc: &UploadedDocument, policy: &UploadPolicy) -> Result<(), UploadError> {
    let size = doc.size();
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > policy.max_bytes {
        return Err(UploadError::TooLarge {
            size,
            max: policy.max_bytes,
        });
    }

    match doc.detected_type() {
        Some(detected) if policy.accepts(detected.as_mime()) => {
            if let Some(declared) = doc.declared_type.as_deref() {
                if MediaType::from_mime(declared) != Some(detected) {
                    tracing::warn!(
                        filename = %doc.filename,
                        declared,
                        detected = detected.as_mime(),
                        "declared type differs from content"
                    );
                }
            }
            Ok(())
        }
        Some(detected) => Err(UploadError::UnsupportedType(detected.as_mime().to_string())),
        None => match doc.declared_type.as_deref() {
            Some(declared)
                if MediaType::from_mime(declared).is_some_and(|t| policy.accepts(t.as_mime())) =>
            {
                Ok(())
            }
            Some(declared) => Err(UploadError::UnsupportedType(declared.to_string())),
            None => Err(UploadError::UnsupportedType("unknown".to_string())),
        },
    }
}

// ── Multipart intake ─────────────────────────────────────────────────────────

pub async fn read_upload(mut multipart: Multipart) -> Result<UploadedDocument, UploadError> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut file_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if FILE_FIELDS.contains(&name.as_str()) {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| UploadError::Multipart(e.to_string()))?
                .to_vec();
            file = Some((filename, content_type, data));
        } else if name == FILE_TYPE_FIELD {
            let value = field
                .text()
                .await
                .map_err(|e| UploadError::Multipart(e.to_string()))?;
            if !value.trim().is_empty() {
                file_type = Some(value.trim().to_string());
            }
        } else {
            field
                .bytes()
                .await
                .map_err(|e| UploadError::Multipart(e.to_string()))?;
        }
    }

    let (filename, content_type, data) = file.ok_or(UploadError::MissingFile)?;

    // Browsers send octet-stream when they cannot tell; the fileType echo is
    // more useful then.
    let declared_type = content_type
        .filter(|ct| !ct.eq_ignore_ascii_case("application/octet-stream"))
        .or(file_type);

    Ok(UploadedDocument::new(filename, declared_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'];

    fn doc(declared: Option<&str>, data: &[u8]) -> UploadedDocument {
        UploadedDocument::new("article", declared.map(|s| s.to_string()), data.to_vec())
    }

    #[test]
    fn sniffs_supported_types() {
        assert_eq!(MediaType::sniff(JPEG), Some(MediaType::Jpeg));
        assert_eq!(MediaType::sniff(PNG), Some(MediaType::Png));
        assert_eq!(MediaType::sniff(b"GIF89a\x01\x00"), Some(MediaType::Gif));
        assert_eq!(MediaType::sniff(b"GIF87a\x01\x00"), Some(MediaType::Gif));
        assert_eq!(MediaType::sniff(b"%PDF-1.7\n"), Some(MediaType::Pdf));
        assert_eq!(MediaType::sniff(b"\r\n%PDF-1.4\n"), Some(MediaType::Pdf));
        assert_eq!(MediaType::sniff(b"hello world"), None);
        assert_eq!(MediaType::sniff(b""), None);
    }

    #[test]
    fn mime_parameters_are_ignored() {
        assert_eq!(
            MediaType::from_mime("application/pdf; qs=0.1"),
            Some(MediaType::Pdf)
        );
        assert_eq!(MediaType::from_mime("IMAGE/JPG"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_mime("text/html"), None);
    }

    #[test]
    fn accepts_matching_upload() {
        let policy = UploadPolicy::default();
        assert!(validate(&doc(Some("image/png"), PNG), &policy).is_ok());
        assert!(validate(&doc(None, JPEG), &policy).is_ok());
    }

    #[test]
    fn content_wins_over_declared_type() {
        // A PNG labelled as JPEG is still a supported image.
        let policy = UploadPolicy::default();
        assert!(validate(&doc(Some("image/jpeg"), PNG), &policy).is_ok());
        assert_eq!(doc(Some("image/jpeg"), PNG).display_type(), "image/png");
    }

    #[test]
    fn rejects_disallowed_types() {
        let policy = UploadPolicy::default();
        for declared in ["text/plain", "image/webp", "application/zip"] {
            let result = validate(&doc(Some(declared), b"plain bytes"), &policy);
            assert!(
                matches!(result, Err(UploadError::UnsupportedType(ref t)) if t == declared),
                "{declared} should be rejected"
            );
        }
        assert!(matches!(
            validate(&doc(None, b"plain bytes"), &policy),
            Err(UploadError::UnsupportedType(_))
        ));
    }

    #[test]
    fn sniffed_type_outside_policy_is_rejected() {
        let policy = UploadPolicy {
            max_bytes: 1024,
            accepted_types: vec!["application/pdf".to_string()],
        };
        assert!(matches!(
            validate(&doc(Some("application/pdf"), PNG), &policy),
            Err(UploadError::UnsupportedType(ref t)) if t == "image/png"
        ));
    }

    #[test]
    fn misdeclared_content_passes_to_extractor() {
        let policy = UploadPolicy::default();
        assert!(validate(&doc(Some("application/pdf"), b"not a pdf at all"), &policy).is_ok());
    }

    #[test]
    fn declared_type_parameters_do_not_hide_a_mismatch() {
        let policy = UploadPolicy::default();
        let misdeclared = doc(Some("application/pdf; x=y"), b"not a pdf at all");
        assert!(validate(&misdeclared, &policy).is_ok());
        assert!(validate(&doc(Some("Image/PNG; q=1"), b"plain bytes"), &policy).is_ok());
    }

    #[test]
    fn rejects_oversized_regardless_of_type() {
        let policy = UploadPolicy {
            max_bytes: 16,
            ..UploadPolicy::default()
        };
        let mut big_png = PNG.to_vec();
        big_png.resize(17, 0);
        let mut big_pdf = b"%PDF-1.4\n".to_vec();
        big_pdf.resize(17, b' ');

        for (declared, data) in [("image/png", big_png), ("application/pdf", big_pdf)] {
            assert!(matches!(
                validate(&doc(Some(declared), &data), &policy),
                Err(UploadError::TooLarge { size: 17, max: 16 })
            ));
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let mut exact = PNG.to_vec();
        exact.resize(16, 0);
        let policy = UploadPolicy {
            max_bytes: 16,
            ..UploadPolicy::default()
        };
        assert!(validate(&doc(None, &exact), &policy).is_ok());
    }

    #[test]
    fn rejects_empty_upload() {
        assert!(matches!(
            validate(&doc(Some("image/png"), b""), &UploadPolicy::default()),
            Err(UploadError::Empty)
        ));
    }
}
