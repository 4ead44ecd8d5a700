//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 페이지별 텍스트를 추출합니다.

use std::path::Path;

use crate::error::{RagError, Result};

use super::PageText;

/// PDF에서 텍스트 추출
///
/// 페이지마다 하나의 레코드를 반환합니다. 페이지 번호는 1부터 시작하며,
/// 공백뿐인 페이지는 제외하되 나머지 페이지의 번호는 원래 위치를 유지합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<PageText>> {
    let bytes = std::fs::read(path).map_err(|e| RagError::extraction(path, e))?;

    // pdf-extract는 일부 손상된 입력에서 panic 하므로 에러로 변환
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .map_err(|_| RagError::extraction(path, "PDF parser panicked on malformed input"))?
        .map_err(|e| RagError::extraction(path, e))?;

    let pages = collect_pages(pages);

    if pages.is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
    }

    Ok(pages)
}

/// 페이지 텍스트 목록을 번호가 매겨진 레코드로 변환 (공백 페이지 제외)
fn collect_pages(pages: Vec<String>) -> Vec<PageText> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| PageText::new(text, i as u32 + 1))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

/// 페이지마다 주어진 텍스트 한 줄을 가진 PDF 작성 (빈 문자열은 텍스트 없는 페이지)
#[cfg(test)]
pub(crate) fn write_test_pdf(path: &Path, pages: &[&str]) {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            vec![]
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_pages_numbering() {
        let pages = vec![
            "Page 1 content".to_string(),
            "Page 2 content".to_string(),
        ];
        let collected = collect_pages(pages);
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0], PageText::new("Page 1 content", 1));
        assert_eq!(collected[1], PageText::new("Page 2 content", 2));
    }

    #[test]
    fn test_collect_pages_drops_blank_pages() {
        let pages = vec![
            "Intro".to_string(),
            "  \n\t ".to_string(),
            String::new(),
            "Appendix".to_string(),
        ];
        let collected = collect_pages(pages);
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[1].page_number, 4);
        assert_eq!(collected[1].text, "Appendix");
    }

    #[test]
    fn test_corrupt_pdf_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = extract_text_from_pdf(&path).unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }

    #[test]
    fn test_extract_two_page_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("two.pdf");
        write_test_pdf(&path, &["Hello page one", "Second page text"]);

        let pages = extract_text_from_pdf(&path).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(pages[0].text.contains("Hello page one"));
        assert!(pages[1].text.contains("Second page text"));
    }

    #[test]
    fn test_extract_pdf_skips_blank_middle_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("three.pdf");
        write_test_pdf(&path, &["Alpha", "", "Gamma"]);

        let pages = extract_text_from_pdf(&path).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(pages[0].text.trim(), "Alpha");
        assert_eq!(pages[1].text.trim(), "Gamma");
    }
}
