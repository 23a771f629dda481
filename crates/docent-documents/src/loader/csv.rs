use std::path::Path;

use docent_index::ProvenanceTag;

use super::{DocumentLoader, LoadFuture, ParsedUnit, blocking, check_size};
use crate::error::Result;

/// CSV with a header row: one unit per data row, fields joined by commas.
pub struct CsvLoader {
    pub max_file_size: u64,
}

impl DocumentLoader for CsvLoader {
    fn load(&self, path: &Path) -> LoadFuture<'_> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;
            blocking(move || read_rows(&path)).await
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["csv"]
    }
}

fn read_rows(path: &Path) -> Result<Vec<ParsedUnit>> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut units = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        units.push(ParsedUnit {
            text: record.iter().collect::<Vec<_>>().join(","),
            source: ProvenanceTag::Csv { row },
        });
    }
    Ok(units)
}
