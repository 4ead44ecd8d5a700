//! Text Chunking Module
//!
//! 재귀적 경계 탐색 방식으로 텍스트를 분할합니다.
//! 문단 → 줄 → 단어 경계 순으로 시도하고, 부드러운 경계가 없을 때만 문자 단위로 자릅니다.
//! 인접 청크 사이에는 `chunk_overlap` 문자만큼의 앞 문맥이 반복됩니다.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::extractor::{file_extension, PageText};

/// 기본 구분자 (우선순위 순). 빈 문자열은 문자 단위 분할
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정 (길이 단위: 문자 수)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// 최대 청크 크기
    pub chunk_size: usize,
    /// 오버랩 크기
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 청크 출처 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// 저장소 내 고유 ID (= 청크 목록 위치 = 인덱스 행 번호)
    pub chunk_id: usize,
    /// 원본 파일 이름
    pub file_name: String,
    /// 확장자 (앞의 점 포함)
    pub file_type: String,
    /// 페이지 번호 (1부터 시작)
    pub page_number: u32,
}

/// 검색 단위 텍스트 조각
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn id(&self) -> usize {
        self.metadata.chunk_id
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 문자 분할 청커
pub struct RecursiveChunker {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 기본 설정으로 생성 (500 / 50)
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 텍스트에 존재하는 첫 구분자로 나누고, 너무 긴 조각은 다음 구분자로 재귀 분할
    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().cloned().unwrap_or_default();
        let mut finer: &[String] = &[];

        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = String::new();
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.clone();
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();

        for piece in split_keep_separator(text, &separator) {
            if char_len(&piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                chunks.extend(self.merge_splits(&good_splits, ""));
                good_splits.clear();
            }

            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, finer));
            }
        }

        if !good_splits.is_empty() {
            chunks.extend(self.merge_splits(&good_splits, ""));
        }

        chunks
    }

    /// 작은 조각을 chunk_size 이하로 병합하며, 다음 청크 앞에 오버랩 조각을 남김
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let sep_len = char_len(separator);

        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joined_len = |current: &VecDeque<&str>| if current.is_empty() { 0 } else { sep_len };

            if total + len + joined_len(&current) > size {
                if total > size {
                    tracing::warn!("Created a chunk of size {}, which is longer than {}", total, size);
                }

                if !current.is_empty() {
                    if let Some(doc) = join_docs(&current, separator) {
                        docs.push(doc);
                    }

                    // 오버랩 이하가 되고 다음 조각이 들어갈 때까지 앞에서 제거
                    while total > overlap || (total + len + joined_len(&current) > size && total > 0) {
                        let Some(first) = current.pop_front() else {
                            break;
                        };
                        let sep = if current.is_empty() { 0 } else { sep_len };
                        total = total.saturating_sub(char_len(first) + sep);
                    }
                }
            }

            current.push_back(split);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        if let Some(doc) = join_docs(&current, separator) {
            docs.push(doc);
        }

        docs
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }
        self.split_recursive(text, &self.separators)
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Page Chunking
// ============================================================================

/// 페이지 목록을 청크로 변환
///
/// `next_id`부터 연속된 ID를 부여하고, 다음 사용할 ID를 함께 반환합니다.
pub fn chunk_pages(
    chunker: &dyn Chunker,
    pages: &[PageText],
    file_name: &str,
    next_id: usize,
) -> (Vec<Chunk>, usize) {
    let file_type = file_extension(file_name);
    let mut next_id = next_id;
    let mut chunks = Vec::new();

    for page in pages {
        for text in chunker.chunk(&page.text) {
            chunks.push(Chunk {
                text,
                metadata: ChunkMetadata {
                    chunk_id: next_id,
                    file_name: file_name.to_string(),
                    file_type: file_type.clone(),
                    page_number: page.page_number,
                },
            });
            next_id += 1;
        }
    }

    (chunks, next_id)
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자로 나누되 구분자를 다음 조각 앞에 붙여 보존 (빈 구분자는 문자 단위)
fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces = Vec::new();
    if let Some(first) = parts.next() {
        pieces.push(first.to_string());
    }
    pieces.extend(parts.map(|p| format!("{}{}", separator, p)));
    pieces.retain(|p| !p.is_empty());
    pieces
}

/// 조각을 이어 붙이고 앞뒤 공백 제거. 비면 None
fn join_docs(docs: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = docs.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 설정을 지정하여 청커 생성
pub fn recursive_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> RecursiveChunker {
        RecursiveChunker::new(ChunkConfig::new(size, overlap))
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = RecursiveChunker::with_defaults();
        assert_eq!(chunker.chunk("Hello world"), vec!["Hello world"]);
    }

    #[test]
    fn test_word_boundaries_with_overlap() {
        let chunks = chunker(10, 5).chunk("one two three four five six");
        assert_eq!(chunks, vec!["one two", "two three", "four five", "five six"]);
    }

    #[test]
    fn test_hard_cut_without_soft_boundary() {
        let chunks = chunker(10, 3).chunk("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(
            chunks,
            vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]
        );
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = "a".repeat(30);
        let second = "b".repeat(30);
        let text = format!("{}\n\n{}", first, second);
        let chunks = chunker(40, 0).chunk(&text);
        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let text = "Rust ownership rules prevent data races at compile time.\n".repeat(40);
        let chunks = chunker(100, 20).chunk(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_multibyte_length_counts_chars() {
        let text = "가나다라마바사아자차카타파하";
        let chunks = chunker(5, 0).chunk(text);
        assert_eq!(chunks, vec!["가나다라마", "바사아자차", "카타파하"]);
    }

    #[test]
    fn test_split_keep_separator() {
        assert_eq!(split_keep_separator("a b  c", " "), vec!["a", " b", " ", " c"]);
        assert_eq!(split_keep_separator("ab", ""), vec!["a", "b"]);
    }

    #[test]
    fn test_config_validate() {
        assert!(ChunkConfig::default().validate().is_ok());
        assert!(ChunkConfig::new(0, 0).validate().is_err());
        assert!(ChunkConfig::new(50, 50).validate().is_err());
    }

    #[test]
    fn test_chunk_pages_ids_and_metadata() {
        let chunker = RecursiveChunker::with_defaults();
        let pages = vec![
            PageText::new("First page text", 1),
            PageText::new("Second page text", 2),
        ];

        let (chunks, next_id) = chunk_pages(&chunker, &pages, "manual.pdf", 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(next_id, 2);
        assert_eq!(chunks[0].id(), 0);
        assert_eq!(chunks[1].id(), 1);
        assert_eq!(chunks[0].metadata.page_number, 1);
        assert_eq!(chunks[1].metadata.page_number, 2);
        assert_eq!(chunks[1].metadata.file_type, ".pdf");
        assert_eq!(chunks[1].metadata.file_name, "manual.pdf");
    }

    #[test]
    fn test_chunk_pages_continues_counter() {
        let chunker = chunker(10, 0);
        let pages = vec![PageText::new("", 1), PageText::new("alpha beta gamma", 2)];

        let (chunks, next_id) = chunk_pages(&chunker, &pages, "notes.txt", 7);
        let ids: Vec<usize> = chunks.iter().map(Chunk::id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(next_id, 9);
        assert!(chunks.iter().all(|c| c.metadata.page_number == 2));
    }
}
