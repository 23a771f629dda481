use std::path::Path;

use docent_index::ProvenanceTag;

use super::{DocumentLoader, LoadFuture, ParsedUnit, check_size};

/// Plain text and markdown: one unit per non-blank line.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> LoadFuture<'_> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;
            let bytes = tokio::fs::read(&path).await?;
            let content = String::from_utf8_lossy(&bytes);
            Ok(split_lines(&content))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}

fn split_lines(content: &str) -> Vec<ParsedUnit> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            (!line.is_empty()).then(|| ParsedUnit {
                text: line.to_owned(),
                source: ProvenanceTag::Txt { line: i + 1 },
            })
        })
        .collect()
}
