//! MiniLM 임베딩 - 프로세스 내 문장 임베딩 모델 (candle)
//!
//! all-MiniLM-L6-v2 (BERT, 384차원)를 로컬 모델 파일에서 읽어 CPU로 실행합니다.
//! 토큰 임베딩을 attention mask로 평균 풀링한 뒤 L2 정규화합니다.
//!
//! 모델 디렉토리에는 다음 파일이 필요합니다:
//! ```text
//! config.json
//! tokenizer.json
//! model.safetensors   (없으면 pytorch_model.bin)
//! ```
//! source: https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

use crate::config::get_data_dir;
use crate::error::{RagError, Result};

use super::EmbeddingProvider;

/// 모델 이름
pub const MINILM_MODEL: &str = "all-MiniLM-L6-v2";

/// all-MiniLM-L6-v2 차원
pub const MINILM_DIMENSION: usize = 384;

/// 모델 학습 시 최대 시퀀스 길이
const MAX_SEQ_LEN: usize = 256;

// ============================================================================
// Model
// ============================================================================

/// 로드된 BERT 모델 + 토크나이저
struct MiniLmModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl MiniLmModel {
    fn load(model_dir: &Path) -> std::result::Result<Self, String> {
        let device = Device::Cpu;
        tracing::info!("Loading {} from {:?}", MINILM_MODEL, model_dir);

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| format!("Failed to load tokenizer from {:?}: {}", tokenizer_path, e))?;

        let config_path = model_dir.join("config.json");
        let config_json = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read {:?}: {}", config_path, e))?;
        let config: BertConfig = serde_json::from_str(&config_json)
            .map_err(|e| format!("Invalid model config {:?}: {}", config_path, e))?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config).map_err(|e| format!("Failed to build model: {e}"))?;

        tracing::info!("{} loaded", MINILM_MODEL);
        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    fn encode(&self, text: &str) -> std::result::Result<Vec<f32>, String> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| format!("Tokenization failed: {e}"))?;

        let mut ids = encoding.get_ids().to_vec();
        let mut mask = encoding.get_attention_mask().to_vec();
        if ids.len() > MAX_SEQ_LEN {
            // [SEP] 토큰은 유지
            let last_id = ids[ids.len() - 1];
            ids.truncate(MAX_SEQ_LEN - 1);
            ids.push(last_id);
            mask.truncate(MAX_SEQ_LEN);
        }

        self.forward(&ids, &mask).map_err(|e| format!("Model inference failed: {e}"))
    }

    fn forward(&self, ids: &[u32], mask: &[u32]) -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(mask, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        mean_pool_normalize(&hidden, &attention_mask)?
            .squeeze(0)?
            .to_vec1::<f32>()
    }
}

/// safetensors 우선, 없으면 PyTorch 체크포인트
fn load_weights(
    model_dir: &Path,
    device: &Device,
) -> std::result::Result<HashMap<String, Tensor>, String> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.is_file() {
        return candle_core::safetensors::load(&safetensors, device)
            .map_err(|e| format!("Failed to read {:?}: {}", safetensors, e));
    }

    let pytorch = model_dir.join("pytorch_model.bin");
    if pytorch.is_file() {
        let weights = candle_core::pickle::read_all(&pytorch)
            .map_err(|e| format!("Failed to read {:?}: {}", pytorch, e))?;
        return Ok(weights.into_iter().collect());
    }

    Err(format!(
        "No model weights in {:?} (expected model.safetensors or pytorch_model.bin)",
        model_dir
    ))
}

/// 마스크된 평균 풀링 + L2 정규화. hidden: (batch, seq, dim), mask: (batch, seq)
fn mean_pool_normalize(hidden: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = mask.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9f32, f32::MAX)?;
    let mean = summed.broadcast_div(&counts)?;

    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12f32, f32::MAX)?;
    mean.broadcast_div(&norm)
}

// ============================================================================
// MiniLmEmbedding
// ============================================================================

/// MiniLM 임베딩 구현체
///
/// 모델 파일은 첫 임베딩 호출 때 한 번만 로드됩니다. 로드 실패도 캐시되어
/// 이후 호출은 같은 에러를 반환합니다.
pub struct MiniLmEmbedding {
    model_dir: PathBuf,
    model: OnceLock<std::result::Result<MiniLmModel, String>>,
}

impl MiniLmEmbedding {
    /// 모델 디렉토리를 지정하여 생성
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            model: OnceLock::new(),
        }
    }

    /// `CITERAG_MODEL_DIR` 또는 기본 위치(~/.citerag/models/all-MiniLM-L6-v2)
    pub fn from_env() -> Self {
        Self::new(resolve_model_dir())
    }

    fn model(&self) -> Result<&MiniLmModel> {
        self.model
            .get_or_init(|| MiniLmModel::load(&self.model_dir))
            .as_ref()
            .map_err(|e| RagError::Embedding(e.clone()))
    }
}

#[async_trait]
impl EmbeddingProvider for MiniLmEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.model()?.encode(text).map_err(RagError::Embedding)?;

        if vector.len() != MINILM_DIMENSION {
            return Err(RagError::Embedding(format!(
                "{} produced {} values, expected {}",
                MINILM_MODEL,
                vector.len(),
                MINILM_DIMENSION
            )));
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    fn name(&self) -> &str {
        MINILM_MODEL
    }
}

/// 모델 디렉토리 결정: `CITERAG_MODEL_DIR` > 데이터 디렉토리 기본값
pub fn resolve_model_dir() -> PathBuf {
    match std::env::var("CITERAG_MODEL_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => get_data_dir().join("models").join(MINILM_MODEL),
    }
}

// ============================================================================
// Tests
// ============================================================================
