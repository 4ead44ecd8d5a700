//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 텍스트를 고정 차원 벡터로 변환하는 프로바이더입니다.
//! - MiniLM: 프로세스 내 문장 임베딩 모델 (candle, 로컬 모델 파일 필요)
//! - Hashing: 특징 해싱 모델 (결정적, 모델 파일/네트워크 불필요, 오프라인/테스트용)
//! - OpenAI: 원격 임베딩 API (텍스트당 1회 호출, 재시도 없음)
//!
//! 한 프로바이더로 만든 인덱스는 반드시 같은 프로바이더로만 검색해야 합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(EmbedderKind::MiniLm)?;
//! let vectors = embedder.embed_batch(&texts).await?;
//! ```

mod hashing;
mod minilm;
mod openai;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

pub use hashing::{HashingEmbedding, HASHING_DIMENSION};
pub use minilm::{resolve_model_dir, MiniLmEmbedding, MINILM_DIMENSION, MINILM_MODEL};
pub use openai::{get_api_key, has_api_key, OpenAiEmbedding, OPENAI_DIMENSION, OPENAI_EMBED_MODEL};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출, 하나라도 실패하면 전체 실패)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Embedder Kind
// ============================================================================

/// 프로바이더 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// 프로세스 내 MiniLM 모델
    #[default]
    MiniLm,
    /// 특징 해싱 모델
    Hashing,
    /// OpenAI 호환 원격 API
    OpenAi,
}

impl FromStr for EmbedderKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "minilm" | "local" => Ok(Self::MiniLm),
            "hashing" | "hash" => Ok(Self::Hashing),
            "openai" | "remote" => Ok(Self::OpenAi),
            other => Err(RagError::InvalidConfig(format!(
                "Unknown embedder: {other} (expected minilm, hashing or openai)"
            ))),
        }
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성
///
/// MiniLM 모델은 첫 임베딩 때 로드됩니다 (`CITERAG_MODEL_DIR`).
/// OpenAI는 환경변수 `OPENAI_API_KEY`가 필요합니다.
pub fn create_embedder(kind: EmbedderKind) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match kind {
        EmbedderKind::MiniLm => Arc::new(MiniLmEmbedding::from_env()),
        EmbedderKind::Hashing => Arc::new(HashingEmbedding::new()),
        EmbedderKind::OpenAi => Arc::new(OpenAiEmbedding::from_env()?),
    };

    tracing::info!(
        "Using {} embedding (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_kind_parse() {
        assert_eq!("minilm".parse::<EmbedderKind>().ok(), Some(EmbedderKind::MiniLm));
        assert_eq!("local".parse::<EmbedderKind>().ok(), Some(EmbedderKind::MiniLm));
        assert_eq!("hash".parse::<EmbedderKind>().ok(), Some(EmbedderKind::Hashing));
        assert_eq!("OpenAI".parse::<EmbedderKind>().ok(), Some(EmbedderKind::OpenAi));
        assert!("word2vec".parse::<EmbedderKind>().is_err());
    }

    #[tokio::test]
    async fn test_create_hashing_embedder() {
        let embedder = create_embedder(EmbedderKind::Hashing).unwrap();
        assert_eq!(embedder.name(), "hashing");
        assert_eq!(embedder.dimension(), HASHING_DIMENSION);

        let batch = embedder
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|v| v.len() == HASHING_DIMENSION));
    }

    #[test]
    fn test_create_minilm_embedder_is_lazy() {
        // 모델 파일은 첫 임베딩 때 읽음
        let embedder = create_embedder(EmbedderKind::MiniLm).unwrap();
        assert_eq!(embedder.name(), MINILM_MODEL);
        assert_eq!(embedder.dimension(), MINILM_DIMENSION);
    }
}
