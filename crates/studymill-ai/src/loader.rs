use crate::{AiError, Result};
use std::path::Path;

/// Load an uploaded document as plain text.
///
/// Plain text is read as-is; PDF and DOCX are run through text extraction.
/// Anything else is rejected so the job fails permanently instead of feeding
/// garbage to the model, and a document that extracts to nothing is treated
/// the same way.
pub fn load_document(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let text = match extension.as_str() {
        "txt" | "md" => std::fs::read_to_string(path)?,
        "pdf" => extract_pdf(path)?,
        "docx" => extract_docx(path)?,
        _ => return Err(AiError::UnsupportedDocument(path.display().to_string())),
    };

    if text.trim().is_empty() {
        return Err(AiError::EmptyDocument(path.display().to_string()));
    }

    Ok(text)
}

fn extract_pdf(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path)
        .map_err(|e| AiError::Extraction(format!("{}: {e}", path.display())))
}

/// Pull the paragraph text out of a DOCX body. Tables and headers are
/// ignored; study material lives in the running text.
fn extract_docx(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let docx = docx_rs::read_docx(&bytes)
        .map_err(|e| AiError::Extraction(format!("{}: {e}", path.display())))?;

    let mut text = String::new();
    for child in &docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for content in &paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = content {
                    for piece in &run.children {
                        if let docx_rs::RunChild::Text(t) = piece {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_txt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all("photosynthesis converts light to energy".as_bytes())
            .unwrap();

        let text = load_document(&path).unwrap();
        assert!(text.contains("photosynthesis"));
    }

    #[test]
    fn test_load_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.docx");
        let file = std::fs::File::create(&path).unwrap();
        docx_rs::Docx::new()
            .add_paragraph(
                docx_rs::Paragraph::new()
                    .add_run(docx_rs::Run::new().add_text("osmosis moves water")),
            )
            .build()
            .pack(file)
            .unwrap();

        let text = load_document(&path).unwrap();
        assert!(text.contains("osmosis moves water"));
    }

    #[test]
    fn test_corrupt_pdf_is_permanent_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, AiError::Extraction(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_corrupt_docx_is_permanent_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.docx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, AiError::Extraction(_)));
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, AiError::UnsupportedDocument(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_rejects_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, b"   \n\n ").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, AiError::EmptyDocument(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_document(Path::new("/nonexistent/notes.txt")).unwrap_err();
        assert!(matches!(err, AiError::Io(_)));
    }
}
