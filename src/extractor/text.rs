//! 텍스트 파일 추출 모듈

use std::path::Path;

use crate::error::{RagError, Result};

use super::PageText;

/// 텍스트 파일에서 추출
///
/// 파일 전체를 하나의 레코드(page_number = 1)로 반환합니다.
/// UTF-8로 해석할 수 없는 바이트는 실패 대신 버립니다.
pub fn extract_text_file(path: &Path) -> Result<Vec<PageText>> {
    let bytes = std::fs::read(path).map_err(|e| RagError::extraction(path, e))?;
    Ok(vec![PageText::new(decode_permissive(&bytes), 1)])
}

/// 유효한 UTF-8 구간만 이어 붙여 디코딩
pub fn decode_permissive(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_drops_invalid_bytes() {
        let bytes = b"caf\xc3\xa9 \xff\xfeok";
        assert_eq!(decode_permissive(bytes), "café ok");
    }

    #[test]
    fn test_decode_keeps_valid_utf8() {
        let text = "안녕하세요 world";
        assert_eq!(decode_permissive(text.as_bytes()), text);
    }

    #[test]
    fn test_extract_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, b"Hello\x80 world").unwrap();

        let pages = extract_text_file(&path).unwrap();
        assert_eq!(pages, vec![PageText::new("Hello world", 1)]);
    }
}
