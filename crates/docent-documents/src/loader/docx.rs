use std::fs::File;
use std::io::Read;
use std::path::Path;

use docent_index::ProvenanceTag;
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};

use super::{DocumentLoader, LoadFuture, ParsedUnit, blocking, check_size};
use crate::error::{DocumentError, Result};

const DOCUMENT_PART: &str = "word/document.xml";

/// Word documents: one unit per non-blank paragraph, numbered over all paragraphs.
pub struct DocxLoader {
    pub max_file_size: u64,
}

impl DocumentLoader for DocxLoader {
    fn load(&self, path: &Path) -> LoadFuture<'_> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;
            blocking(move || read_paragraphs(&path)).await
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["docx"]
    }
}

fn malformed(reason: impl std::fmt::Display) -> DocumentError {
    DocumentError::Malformed {
        format: "docx",
        reason: reason.to_string(),
    }
}

fn read_paragraphs(path: &Path) -> Result<Vec<ParsedUnit>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut part = archive.by_name(DOCUMENT_PART).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => malformed(format!("missing {DOCUMENT_PART}")),
        other => DocumentError::Zip(other),
    })?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;

    Ok(word_paragraphs(&xml)?
        .into_iter()
        .enumerate()
        .filter_map(|(i, text)| {
            let text = text.trim();
            (!text.is_empty()).then(|| ParsedUnit {
                text: text.to_owned(),
                source: ProvenanceTag::Docx { paragraph: i + 1 },
            })
        })
        .collect())
}

/// Text of every `w:p` in the order the paragraphs open, empty ones included.
///
/// Paragraphs nest inside text boxes and table cells; each open paragraph
/// collects only its own runs.
fn word_paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut done: Vec<(usize, String)> = Vec::new();
    let mut open: Vec<(usize, String)> = Vec::new();
    let mut opened = 0usize;
    let mut in_text = 0usize;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    open.push((opened, String::new()));
                    opened += 1;
                }
                b"w:t" => in_text += 1,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => {
                    done.push((opened, String::new()));
                    opened += 1;
                }
                b"w:tab" => push_text(&mut open, "\t"),
                b"w:br" | b"w:cr" => push_text(&mut open, "\n"),
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    if let Some(paragraph) = open.pop() {
                        done.push(paragraph);
                    }
                }
                b"w:t" => in_text = in_text.saturating_sub(1),
                _ => {}
            },
            Event::Text(t) if in_text > 0 => {
                push_text(&mut open, &t.xml_content().map_err(malformed)?);
            }
            Event::CData(t) if in_text > 0 => {
                push_text(&mut open, &t.decode().map_err(malformed)?);
            }
            Event::GeneralRef(r) if in_text > 0 => push_text(&mut open, &resolve_ref(&r)?),
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(malformed("unclosed paragraph"));
    }
    done.sort_by_key(|(position, _)| *position);
    Ok(done.into_iter().map(|(_, text)| text).collect())
}

fn push_text(open: &mut [(usize, String)], text: &str) {
    if let Some((_, paragraph)) = open.last_mut() {
        paragraph.push_str(text);
    }
}

fn resolve_ref(r: &BytesRef<'_>) -> Result<String> {
    if let Some(c) = r.resolve_char_ref().map_err(malformed)? {
        return Ok(c.to_string());
    }
    let name = r.decode().map_err(malformed)?;
    resolve_predefined_entity(&name)
        .map(str::to_owned)
        .ok_or_else(|| malformed(format!("unknown entity &{name};")))
}
