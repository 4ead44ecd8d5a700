//! 콘텐츠 추출 모듈
//!
//! 확장자로 문서 종류를 판별하고 (페이지 텍스트, 페이지 번호) 목록을 추출합니다.
//! - PDF 파일: pdf-extract로 페이지별 추출, 공백뿐인 페이지는 제외
//! - DOCX 파일: 문서 전체를 1페이지로 평탄화
//! - 텍스트 파일: 파일 전체를 1페이지로, 잘못된 UTF-8 바이트는 버림

pub mod docx;
pub mod pdf;
pub mod text;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

// ============================================================================
// Document Kind
// ============================================================================

/// 지원하는 문서 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// PDF 문서
    Pdf,
    /// 워드 문서 (.docx, .doc)
    Docx,
    /// 텍스트 파일
    Text,
}

impl DocumentKind {
    /// 확장자로 문서 종류 결정 (앞의 점 없이, 대소문자 무시)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::Text),
            _ => None,
        }
    }

    /// 파일 경로에서 종류 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 표시용 짧은 이름
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOC",
            Self::Text => "TXT",
        }
    }
}

// ============================================================================
// Page Text
// ============================================================================

/// 추출된 페이지 텍스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 페이지 텍스트
    pub text: String,
    /// 페이지 번호 (1부터 시작)
    pub page_number: u32,
}

impl PageText {
    pub fn new(text: impl Into<String>, page_number: u32) -> Self {
        Self {
            text: text.into(),
            page_number,
        }
    }
}

/// 파일 확장자 (앞의 점 포함, 원래 대소문자 유지). 확장자가 없으면 빈 문자열
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

// ============================================================================
// Extract
// ============================================================================

/// 파일에서 페이지 텍스트 추출
///
/// 지원하지 않는 확장자는 `UnsupportedFormat`, 읽을 수 없거나 손상된 파일은
/// `Extraction` 에러를 반환합니다. 둘 다 호출자가 해당 파일만 건너뜁니다.
pub fn extract(path: &Path) -> Result<Vec<PageText>> {
    let kind = DocumentKind::from_path(path).ok_or_else(|| RagError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: path
            .file_name()
            .and_then(|n| n.to_str())
            .map(file_extension)
            .unwrap_or_default(),
    })?;

    if !path.is_file() {
        return Err(RagError::extraction(path, "file not found"));
    }

    tracing::debug!("Extracting {:?} as {}", path, kind.label());

    match kind {
        DocumentKind::Pdf => pdf::extract_text_from_pdf(path),
        DocumentKind::Docx => docx::extract_text_from_docx(path),
        DocumentKind::Text => text::extract_text_file(path),
    }
}

// ============================================================================
// Tests
// ============================================================================
