use std::path::Path;

use docent_index::ProvenanceTag;
use pptx_to_md::{ParserConfig, PptxContainer};

use super::{DocumentLoader, LoadFuture, ParsedUnit, blocking, check_size};
use crate::error::{DocumentError, Result};

/// Presentations: one unit per slide with text, non-blank lines joined by newlines.
pub struct PptxLoader {
    pub max_file_size: u64,
}

impl DocumentLoader for PptxLoader {
    fn load(&self, path: &Path) -> LoadFuture<'_> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;
            blocking(move || read_slides(&path)).await
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pptx"]
    }
}

fn malformed(reason: impl std::fmt::Display) -> DocumentError {
    DocumentError::Malformed {
        format: "pptx",
        reason: reason.to_string(),
    }
}

fn read_slides(path: &Path) -> Result<Vec<ParsedUnit>> {
    let config = ParserConfig::builder()
        .extract_images(false)
        .include_slide_comment(false)
        .build();
    let mut container = PptxContainer::open(path, config).map_err(malformed)?;
    let slides = container.parse_all().map_err(malformed)?;

    let mut units = Vec::with_capacity(slides.len());
    // Slides come back in presentation order; pages count from 1 like the
    // slide sorter does.
    for (position, slide) in slides.into_iter().enumerate() {
        let page = position + 1;
        let Some(markdown) = slide.convert_to_md() else {
            continue;
        };
        let text = slide_text(&markdown);
        if !text.is_empty() {
            units.push(ParsedUnit {
                text,
                source: ProvenanceTag::Pptx { page },
            });
        }
    }
    tracing::debug!(path = %path.display(), slides = units.len(), "read presentation");
    Ok(units)
}

/// Trimmed non-blank lines of a rendered slide.
fn slide_text(markdown: &str) -> String {
    markdown
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::zip_bytes;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/slides/slide2.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/slides/slide3.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/></Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#;

    const PRESENTATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/><p:sldId id="258" r:id="rId4"/></p:sldIdLst></p:presentation>"#;

    const PRESENTATION_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide3.xml"/></Relationships>"#;

    const SLIDE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

    fn slide(lines: &[&str]) -> String {
        let paragraphs: String = lines
            .iter()
            .map(|l| format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{l}</a:t></a:r></a:p>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="TextBox 1"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
        )
    }

    fn deck(dir: &Path, slides: [&str; 3]) -> std::path::PathBuf {
        let file = dir.join("deck.pptx");
        std::fs::write(
            &file,
            zip_bytes(&[
                ("[Content_Types].xml", CONTENT_TYPES),
                ("_rels/.rels", ROOT_RELS),
                ("ppt/presentation.xml", PRESENTATION),
                ("ppt/_rels/presentation.xml.rels", PRESENTATION_RELS),
                ("ppt/slides/slide1.xml", slides[0]),
                ("ppt/slides/_rels/slide1.xml.rels", SLIDE_RELS),
                ("ppt/slides/slide2.xml", slides[1]),
                ("ppt/slides/_rels/slide2.xml.rels", SLIDE_RELS),
                ("ppt/slides/slide3.xml", slides[2]),
                ("ppt/slides/_rels/slide3.xml.rels", SLIDE_RELS),
            ]),
        )
        .unwrap();
        file
    }

    #[test]
    fn blank_slides_are_skipped_and_numbering_kept() {
        let dir = tempfile::tempdir().unwrap();
        let s1 = slide(&["Title slide"]);
        let s2 = slide(&[]);
        let s3 = slide(&["Roadmap", "Hiring"]);
        let file = deck(dir.path(), [&s1, &s2, &s3]);

        let units = read_slides(&file).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].source, ProvenanceTag::Pptx { page: 1 });
        assert!(units[0].text.contains("Title slide"));
        assert_eq!(units[1].source, ProvenanceTag::Pptx { page: 3 });
        assert!(units[1].text.contains("Roadmap"));
        assert!(units[1].text.contains("Hiring"));
    }

    #[test]
    fn not_a_presentation_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fake.pptx");
        std::fs::write(&file, "plain text pretending").unwrap();
        assert!(matches!(
            read_slides(&file),
            Err(DocumentError::Malformed { format: "pptx", .. })
        ));
    }

    #[test]
    fn slide_text_drops_blank_lines() {
        assert_eq!(slide_text("  Roadmap  \n\n\nHiring\n"), "Roadmap\nHiring");
        assert_eq!(slide_text("\n  \n"), "");
    }
}
