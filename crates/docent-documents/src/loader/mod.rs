//! Format-specific loaders producing one [`ParsedUnit`] per page, slide, row,
//! paragraph or line.

mod csv;
mod docx;
#[cfg(feature = "pdf")]
mod pdf;
mod pptx;
mod text;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use docent_index::ProvenanceTag;

pub use self::csv::CsvLoader;
pub use self::docx::DocxLoader;
#[cfg(feature = "pdf")]
pub use self::pdf::PdfLoader;
pub use self::pptx::PptxLoader;
pub use self::text::TextLoader;
use crate::error::{DocumentError, Result};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Text extracted from one addressable part of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUnit {
    pub text: String,
    pub source: ProvenanceTag,
}

pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<ParsedUnit>>> + Send + 'a>>;

pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> LoadFuture<'_>;

    fn supported_extensions(&self) -> &[&str];
}

/// Picks a loader by file extension and enforces a size limit.
#[derive(Debug, Clone, Copy)]
pub struct DocumentParser {
    pub max_file_size: u64,
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentParser {
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    fn loaders(self) -> Vec<Box<dyn DocumentLoader>> {
        let max_file_size = self.max_file_size;
        vec![
            Box::new(TextLoader { max_file_size }),
            Box::new(CsvLoader { max_file_size }),
            Box::new(DocxLoader { max_file_size }),
            Box::new(PptxLoader { max_file_size }),
            #[cfg(feature = "pdf")]
            Box::new(PdfLoader { max_file_size }),
        ]
    }

    /// Whether some loader handles `path`'s extension.
    #[must_use]
    pub fn supports(&self, path: &Path) -> bool {
        let ext = extension(path);
        self.loaders()
            .iter()
            .any(|l| l.supported_extensions().contains(&ext.as_str()))
    }

    /// Parse `path` into ordered units.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] for unknown extensions, or
    /// the loader's error if the file is too large or unreadable.
    pub async fn parse(&self, path: &Path) -> Result<Vec<ParsedUnit>> {
        let ext = extension(path);
        let loader = self
            .loaders()
            .into_iter()
            .find(|l| l.supported_extensions().contains(&ext.as_str()))
            .ok_or_else(|| DocumentError::UnsupportedFormat(format!(".{ext}")))?;
        let units = loader.load(path).await?;
        tracing::debug!(path = %path.display(), units = units.len(), "parsed document");
        Ok(units)
    }
}

/// Parse with the default size limit.
///
/// # Errors
///
/// See [`DocumentParser::parse`].
pub async fn parse_file(path: &Path) -> Result<Vec<ParsedUnit>> {
    DocumentParser::default().parse(path).await
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Reject files above `max_size` before reading them.
async fn check_size(path: &Path, max_size: u64) -> Result<()> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(())
}

/// Run a blocking parser off the async runtime.
async fn blocking<F>(f: F) -> Result<Vec<ParsedUnit>>
where
    F: FnOnce() -> Result<Vec<ParsedUnit>> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DocumentError::Task(e.to_string()))?
}
