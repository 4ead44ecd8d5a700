//! 해싱 임베딩 - 네트워크와 모델 파일이 필요 없는 오프라인 모델
//!
//! 토큰과 토큰 내부의 문자 3-gram을 XxHash64로 고정 개수 버킷에 해싱하고
//! L2 정규화합니다. 같은 입력과 같은 모델 버전이면 항상 같은 벡터를 냅니다.

use std::collections::HashSet;
use std::hash::Hasher;
use std::sync::OnceLock;

use async_trait::async_trait;
use twox_hash::XxHash64;

use crate::error::Result;

use super::EmbeddingProvider;

/// 기본 임베딩 차원
pub const HASHING_DIMENSION: usize = 384;

/// 해시 시드 (바꾸면 기존 인덱스와 호환되지 않음)
const HASH_SEED: u64 = 0x6369_7465_7261_6701;

/// 토큰 특징 가중치
const TOKEN_WEIGHT: f32 = 1.0;
/// 3-gram 특징 가중치
const TRIGRAM_WEIGHT: f32 = 0.5;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "were", "with",
];

// ============================================================================
// Hashing Model
// ============================================================================

/// 해싱 모델 테이블
struct HashingModel {
    dimension: usize,
    stopwords: HashSet<&'static str>,
}

impl HashingModel {
    fn load(dimension: usize) -> Self {
        tracing::debug!("Loading hashing model (dimension: {})", dimension);
        Self {
            dimension,
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            if self.stopwords.contains(token) {
                continue;
            }

            self.add_feature(&mut vector, token.as_bytes(), TOKEN_WEIGHT);

            let padded: Vec<char> = std::iter::once('#')
                .chain(token.chars())
                .chain(std::iter::once('#'))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let mut hasher = XxHash64::with_seed(HASH_SEED);
        hasher.write(feature);
        let hash = hasher.finish();

        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
        vector[index] += sign * weight;
    }
}

// ============================================================================
// HashingEmbedding
// ============================================================================

/// 해싱 임베딩 구현체 (오프라인/테스트용)
///
/// 모델은 첫 호출 시 한 번만 초기화됩니다.
pub struct HashingEmbedding {
    dimension: usize,
    model: OnceLock<HashingModel>,
}

impl HashingEmbedding {
    /// 기본 차원으로 생성
    pub fn new() -> Self {
        Self::with_dimension(HASHING_DIMENSION)
    }

    /// 차원을 지정하여 생성 (0이면 1로 보정)
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            model: OnceLock::new(),
        }
    }

    fn model(&self) -> &HashingModel {
        self.model.get_or_init(|| HashingModel::load(self.dimension))
    }

    /// 동기 임베딩
    pub fn encode(&self, text: &str) -> Vec<f32> {
        self.model().encode(text)
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

// ============================================================================
// Tests
// ============================================================================
