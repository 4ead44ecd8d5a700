//! OpenAI 임베딩 - 원격 API
//!
//! OpenAI 호환 `/embeddings` 엔드포인트를 텍스트마다 한 번씩 호출합니다.
//! 배치 요청, 재시도, 타임아웃은 없습니다. 한 번이라도 실패하면 전체 임베딩이 실패합니다.
//! 공백뿐인 텍스트도 그대로 요청하며, 응답 차원이 다르면 `Embedding` 에러입니다.
//! source: https://platform.openai.com/docs/api-reference/embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

use super::EmbeddingProvider;

/// 임베딩 모델
pub const OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";

/// text-embedding-3-small 차원
pub const OPENAI_DIMENSION: usize = 1536;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

// ============================================================================
// OpenAiEmbedding
// ============================================================================

/// OpenAI 임베딩 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl OpenAiEmbedding {
    /// API 키로 생성 (기본 모델, 키 접두사에 따라 base URL 결정)
    pub fn new(api_key: String) -> Result<Self> {
        let base_url = resolve_base_url(&api_key, None);
        Self::with_base_url(api_key, base_url)
    }

    /// base URL을 지정하여 생성
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RagError::InvalidConfig("OpenAI API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RagError::Embedding(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: OPENAI_EMBED_MODEL.to_string(),
            dimension: OPENAI_DIMENSION,
            client,
        })
    }

    /// 환경변수에서 생성
    ///
    /// `OPENAI_API_KEY` 필수, `OPENAI_BASE_URL` 선택
    pub fn from_env() -> Result<Self> {
        let api_key = get_api_key()?;
        let base_url = resolve_base_url(
            &api_key,
            std::env::var("OPENAI_BASE_URL").ok().filter(|u| !u.is_empty()),
        );
        Self::with_base_url(api_key, base_url)
    }

    /// 모델과 차원 변경 (다른 OpenAI 호환 모델용)
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

/// API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: String,
}

/// API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// API 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 일부 프로바이더는 줄바꿈을 제대로 처리하지 못함
        let request = EmbedRequest {
            model: &self.model,
            input: text.replace('\n', " "),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to send embedding request: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                return Err(RagError::Embedding(format!(
                    "API error ({}): {}",
                    status, error.error.message
                )));
            }
            return Err(RagError::Embedding(format!("API error ({}): {}", status, body)));
        }

        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::Embedding(format!("Failed to parse embedding response: {e}")))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::Embedding("Response contained no embedding".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(RagError::Embedding(format!(
                "Model {} returned {} values, expected {}",
                self.model,
                embedding.len(),
                self.dimension
            )));
        }

        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (`OPENAI_API_KEY`)
pub fn get_api_key() -> Result<String> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(RagError::InvalidConfig(
            "API key not found. Set OPENAI_API_KEY environment variable.".to_string(),
        )),
    }
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

/// base URL 결정: 명시값 > OpenRouter 키(sk-or-) > OpenAI 기본값
fn resolve_base_url(api_key: &str, explicit: Option<String>) -> String {
    match explicit {
        Some(url) => url,
        None if api_key.starts_with("sk-or-") => OPENROUTER_BASE_URL.to_string(),
        None => OPENAI_BASE_URL.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
