//! DOCX 텍스트 추출 모듈
//!
//! DOCX는 zip 컨테이너이며 본문은 `word/document.xml`에 있습니다.
//! 신뢰할 수 있는 페이지 정보가 없으므로 문서 전체를 1페이지로 반환합니다.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use regex::Regex;

use crate::error::{RagError, Result};

use super::PageText;

/// 본문 XML 경로
const DOCUMENT_XML: &str = "word/document.xml";

/// 기본 엔티티와 문자 참조
const ENTITY_PATTERN: &str = r"&(#x[0-9a-fA-F]+|#[0-9]+|lt|gt|quot|apos|amp);";

/// DOCX에서 텍스트 추출
///
/// 비어있지 않은 문단을 줄바꿈으로 이어 하나의 레코드(page_number = 1)로 반환합니다.
pub fn extract_text_from_docx(path: &Path) -> Result<Vec<PageText>> {
    let file = File::open(path).map_err(|e| RagError::extraction(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| RagError::extraction(path, e))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| RagError::extraction(path, e))?
        .read_to_string(&mut xml)
        .map_err(|e| RagError::extraction(path, e))?;

    let paragraphs = paragraphs_from_xml(&xml).map_err(|e| RagError::extraction(path, e))?;

    let full_text = paragraphs
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(vec![PageText::new(full_text, 1)])
}

/// document.xml에서 문단 텍스트 추출
///
/// `<w:t>` 런 텍스트를 이어 붙이고, `<w:tab/>`은 탭, `<w:br/>`/`<w:cr/>`은 줄바꿈으로 변환합니다.
/// 텍스트 상자(`<w:txbxContent>`)는 자체 문단을 품고 있어 건너뜁니다.
fn paragraphs_from_xml(xml: &str) -> std::result::Result<Vec<String>, regex::Error> {
    let textbox_re = Regex::new(r"(?s)<w:txbxContent[\s>].*?</w:txbxContent>")?;
    let paragraph_re = Regex::new(r"(?s)<w:p[\s>].*?</w:p>")?;
    let run_re = Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:(?:br|cr)(?:\s[^>]*)?/>")?;
    let entity_re = Regex::new(ENTITY_PATTERN)?;

    let body = textbox_re.replace_all(xml, "");

    let paragraphs = paragraph_re
        .find_iter(&body)
        .map(|para| {
            let mut text = String::new();
            for cap in run_re.captures_iter(para.as_str()) {
                match cap.get(1) {
                    Some(run) => text.push_str(&unescape_xml(&entity_re, run.as_str())),
                    None if cap[0].starts_with("<w:tab") => text.push('\t'),
                    None => text.push('\n'),
                }
            }
            text
        })
        .collect();

    Ok(paragraphs)
}

/// XML 엔티티 디코딩 (기본 엔티티 + `&#NN;`/`&#xHH;` 문자 참조)
///
/// 한 번에 치환하므로 `&amp;lt;`는 `&lt;`로 남습니다. 잘못된 코드 포인트는 그대로 둡니다.
fn unescape_xml(entity_re: &Regex, s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    entity_re
        .replace_all(s, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => {
                    let code = match entity.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_docx(path: &Path, document_xml: &str) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(DOCUMENT_XML, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_paragraphs_from_xml() {
        let xml = r#"<w:document><w:body>
<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Safety</w:t></w:r><w:r><w:t xml:space="preserve"> Manual</w:t></w:r></w:p>
<w:p><w:r><w:t>A</w:t><w:tab/><w:t>B</w:t></w:r></w:p>
<w:p></w:p>
<w:p><w:r><w:t>Tom &amp; Jerry &lt;3</w:t></w:r></w:p>
</w:body></w:document>"#;

        let paragraphs = paragraphs_from_xml(xml).unwrap();
        assert_eq!(
            paragraphs,
            vec!["Safety Manual", "A\tB", "", "Tom & Jerry <3"]
        );
    }

    #[test]
    fn test_extract_docx_single_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.docx");
        write_docx(
            &path,
            r#"<w:document><w:body><w:p><w:r><w:t>First paragraph</w:t></w:r></w:p><w:p><w:r><w:t>   </w:t></w:r></w:p><w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p></w:body></w:document>"#,
        );

        let pages = extract_text_from_docx(&path).unwrap();
        assert_eq!(pages, vec![PageText::new("First paragraph\nSecond paragraph", 1)]);
    }

    #[test]
    fn test_extract_docx_not_a_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.doc");
        std::fs::write(&path, b"\xd0\xcf\x11\xe0 legacy binary").unwrap();

        let err = extract_text_from_docx(&path).unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }

    fn entity_re() -> Regex {
        Regex::new(ENTITY_PATTERN).unwrap()
    }

    #[test]
    fn test_unescape_xml() {
        let re = entity_re();
        assert_eq!(unescape_xml(&re, "plain"), "plain");
        assert_eq!(unescape_xml(&re, "&amp;lt;"), "&lt;");
        assert_eq!(unescape_xml(&re, "&quot;hi&quot;"), "\"hi\"");
    }

    #[test]
    fn test_unescape_numeric_references() {
        let re = entity_re();
        assert_eq!(unescape_xml(&re, "It&#x2019;s"), "It\u{2019}s");
        assert_eq!(unescape_xml(&re, "caf&#233; &#38; bar"), "caf\u{e9} & bar");
        // 범위를 벗어난 코드 포인트는 원문 유지
        assert_eq!(unescape_xml(&re, "&#x110000;"), "&#x110000;");
    }

    #[test]
    fn test_textbox_does_not_cut_paragraph() {
        let xml = r#"<w:body><w:p><w:r><w:t>Before box </w:t></w:r><w:r><w:drawing><wps:txbx><w:txbxContent><w:p><w:r><w:t>Box text</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></w:r><w:r><w:t>after box</w:t></w:r></w:p><w:p><w:r><w:t>Next</w:t></w:r></w:p></w:body>"#;

        let paragraphs = paragraphs_from_xml(xml).unwrap();
        assert_eq!(paragraphs, vec!["Before box after box", "Next"]);
    }
}
