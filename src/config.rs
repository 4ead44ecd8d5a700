//! 설정 모듈
//!
//! 저장 위치, 청킹 파라미터, 임베딩 프로바이더, 리빌드 모드를 관리합니다.
//! 우선순위: CLI 플래그 > 환경변수 > 기본값

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbedderKind;
use crate::error::{RagError, Result};
use crate::knowledge::ChunkConfig;

/// 기본 검색 결과 개수
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.citerag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".citerag")
}

// ============================================================================
// Rebuild Mode
// ============================================================================

/// 인덱스 갱신 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildMode {
    /// 수집할 때마다 전체 청크를 다시 임베딩하여 인덱스 재구성
    #[default]
    Full,
    /// 새 청크만 임베딩하여 기존 인덱스 뒤에 추가
    Append,
}

impl FromStr for RebuildMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "append" => Ok(Self::Append),
            other => Err(RagError::InvalidConfig(format!(
                "Unknown rebuild mode: {other} (expected full or append)"
            ))),
        }
    }
}

// ============================================================================
// RagConfig
// ============================================================================

/// 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// 저장소 디렉토리 (knowledge_base.json + vector_store.index)
    pub storage_dir: PathBuf,
    /// 청킹 설정
    pub chunk: ChunkConfig,
    /// 임베딩 프로바이더
    pub embedder: EmbedderKind,
    /// 인덱스 갱신 방식
    pub rebuild: RebuildMode,
    /// 기본 검색 결과 개수
    pub default_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            storage_dir: get_data_dir().join("knowledge_base"),
            chunk: ChunkConfig::default(),
            embedder: EmbedderKind::default(),
            rebuild: RebuildMode::default(),
            default_k: DEFAULT_TOP_K,
        }
    }
}

impl RagConfig {
    /// 지정된 저장소 디렉토리로 생성 (나머지는 기본값)
    pub fn with_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Default::default()
        }
    }

    /// 환경변수를 기본값 위에 덮어써서 생성
    ///
    /// - `CITERAG_STORAGE_DIR`
    /// - `CITERAG_CHUNK_SIZE`, `CITERAG_CHUNK_OVERLAP`
    /// - `CITERAG_EMBEDDER` (minilm | hashing | openai)
    /// - `CITERAG_MODEL_DIR` (MiniLM 모델 디렉토리, 임베더가 직접 읽음)
    /// - `CITERAG_REBUILD` (full | append)
    /// - `CITERAG_TOP_K`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = env_value("CITERAG_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(size) = env_value("CITERAG_CHUNK_SIZE") {
            config.chunk.chunk_size = parse_usize("CITERAG_CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = env_value("CITERAG_CHUNK_OVERLAP") {
            config.chunk.chunk_overlap = parse_usize("CITERAG_CHUNK_OVERLAP", &overlap)?;
        }
        if let Some(kind) = env_value("CITERAG_EMBEDDER") {
            config.embedder = kind.parse()?;
        }
        if let Some(mode) = env_value("CITERAG_REBUILD") {
            config.rebuild = mode.parse()?;
        }
        if let Some(k) = env_value("CITERAG_TOP_K") {
            config.default_k = parse_usize("CITERAG_TOP_K", &k)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        self.chunk.validate()?;
        if self.default_k == 0 {
            return Err(RagError::InvalidConfig(
                "default_k must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// 청크 메타데이터 파일 경로
    pub fn chunks_path(&self) -> PathBuf {
        self.storage_dir.join(crate::knowledge::CHUNKS_FILE)
    }

    /// 벡터 인덱스 파일 경로
    pub fn index_path(&self) -> PathBuf {
        self.storage_dir.join(crate::knowledge::INDEX_FILE)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 비어있지 않은 환경변수 값
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| RagError::InvalidConfig(format!("{key} must be a non-negative integer, got '{value}'")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.chunk.chunk_size, 500);
        assert_eq!(config.chunk.chunk_overlap, 50);
        assert_eq!(config.embedder, EmbedderKind::MiniLm);
        assert_eq!(config.rebuild, RebuildMode::Full);
        assert_eq!(config.default_k, 3);
        assert!(config.storage_dir.ends_with("knowledge_base"));
    }

    #[test]
    fn test_artifact_paths() {
        let config = RagConfig::with_storage_dir("/tmp/kb");
        assert_eq!(config.chunks_path(), PathBuf::from("/tmp/kb/knowledge_base.json"));
        assert_eq!(config.index_path(), PathBuf::from("/tmp/kb/vector_store.index"));
    }

    #[test]
    fn test_rebuild_mode_parse() {
        assert_eq!("full".parse::<RebuildMode>().ok(), Some(RebuildMode::Full));
        assert_eq!("APPEND".parse::<RebuildMode>().ok(), Some(RebuildMode::Append));
        assert!("partial".parse::<RebuildMode>().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_k() {
        let config = RagConfig {
            default_k: 0,
            ..RagConfig::with_storage_dir("kb")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_usize_error() {
        let err = parse_usize("CITERAG_CHUNK_SIZE", "big").err();
        assert!(matches!(err, Some(RagError::InvalidConfig(_))));
        assert_eq!(parse_usize("CITERAG_TOP_K", " 7 ").ok(), Some(7));
    }
}
