//! 에러 타입 정의
//!
//! 엔진 전체에서 사용하는 에러 분류입니다.
//! - 파일 단위 에러 (UnsupportedFormat, Extraction): 배치 수집 중 흡수되고 리포트에 기록
//! - 치명적 에러 (Embedding, DimensionMismatch, Persistence): ingest 호출자에게 전파

use std::path::PathBuf;

use thiserror::Error;

/// citerag 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 지원하지 않는 확장자
    #[error("Unsupported format '{extension}': {path:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// 파일을 읽을 수 없거나 손상됨
    #[error("Failed to extract {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// 임베딩 생성 실패 (모델 또는 네트워크)
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// 벡터 차원 불일치
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 저장/로드 실패
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// 잘못된 설정값
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RagError {
    /// 추출 에러 생성 헬퍼
    pub fn extraction(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// 배치 수집 중 파일 단위로 흡수되는 에러인지 여부
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::Extraction { .. }
        )
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_file_classification() {
        let unsupported = RagError::UnsupportedFormat {
            path: PathBuf::from("a.xyz"),
            extension: ".xyz".to_string(),
        };
        assert!(unsupported.is_per_file());
        assert!(RagError::extraction("a.pdf", "broken").is_per_file());
        assert!(!RagError::Embedding("timeout".to_string()).is_per_file());
        assert!(!RagError::Persistence("disk full".to_string()).is_per_file());
    }

    #[test]
    fn test_io_error_maps_to_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RagError = io.into();
        assert!(matches!(err, RagError::Persistence(_)));
    }
}
