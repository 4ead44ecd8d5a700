//! 파일 수집 모듈
//!
//! CLI 경로 인자(파일, 폴더)를 수집할 파일 목록으로 펼칩니다.
//! - 명시한 파일은 그대로 통과 (지원하지 않거나 없는 파일도 수집 리포트에 남기기 위함)
//! - 폴더는 재귀 탐색하며 .gitignore 패턴을 존중하고, 지원하는 확장자만 수집

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::extractor::DocumentKind;

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 폴더 탐색 시 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// 특정 문서 종류만 수집 (비어있으면 모든 지원 종류)
    pub kinds: Vec<DocumentKind>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 50 * 1024 * 1024, // 50MB
            kinds: vec![],
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    /// 새 수집기 생성
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 수집기 생성
    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 경로 목록을 파일 목록으로 펼침 (인자 순서 유지, 폴더 내부는 정렬)
    pub fn collect(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_dir() {
                files.extend(self.collect_directory(path));
            } else {
                files.push(path.clone());
            }
        }

        files
    }

    /// 폴더 재귀 수집
    pub fn collect_directory(&self, path: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        // ignore 크레이트로 .gitignore 지원
        let walker = WalkBuilder::new(path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            // 파일만 처리
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            if self.should_include(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();
        tracing::info!("Collected {} files from {:?}", files.len(), path);
        files
    }

    /// 파일이 필터 조건을 만족하는지 확인
    fn should_include(&self, path: &Path) -> bool {
        let Some(kind) = DocumentKind::from_path(path) else {
            return false;
        };

        if !self.config.kinds.is_empty() && !self.config.kinds.contains(&kind) {
            return false;
        }

        // 파일 크기 제한
        if self.config.max_file_size > 0 {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            if size > self.config.max_file_size {
                tracing::debug!("Skipping large file: {:?} ({} bytes)", path, size);
                return false;
            }
        }

        true
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_files: usize,
    pub pdf_files: usize,
    pub docx_files: usize,
    pub text_files: usize,
    /// 지원하지 않는 확장자
    pub other_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    /// 수집된 파일 목록에서 통계 계산
    pub fn from_files(files: &[PathBuf]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);

            match DocumentKind::from_path(file) {
                Some(DocumentKind::Pdf) => stats.pdf_files += 1,
                Some(DocumentKind::Docx) => stats.docx_files += 1,
                Some(DocumentKind::Text) => stats.text_files += 1,
                None => stats.other_files += 1,
            }
        }

        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
