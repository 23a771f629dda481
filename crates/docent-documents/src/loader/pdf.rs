use std::path::Path;

use docent_index::ProvenanceTag;

use super::{DocumentLoader, LoadFuture, ParsedUnit, blocking, check_size};
use crate::error::DocumentError;

/// PDF files: one unit per page with extractable text.
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> LoadFuture<'_> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;
            blocking(move || {
                let pages = pdf_extract::extract_text_by_pages(&path)
                    .map_err(|e| DocumentError::Pdf(e.to_string()))?;
                Ok(pages
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, text)| {
                        let text = text.trim();
                        (!text.is_empty()).then(|| ParsedUnit {
                            text: text.to_owned(),
                            source: ProvenanceTag::Pdf { page: i + 1 },
                        })
                    })
                    .collect())
            })
            .await
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
