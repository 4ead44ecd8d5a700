//! Knowledge Store - 청크 목록 + 벡터 인덱스 집합체
//!
//! 저장 위치 하나당 청크 목록 하나와 벡터 인덱스 하나를 소유하며, 둘의 유일한 변경 주체입니다.
//!
//! ```text
//! ingest:   extract → chunk → (pending 버퍼) → embed → index → commit → save
//! retrieve: query → embed → search → 청크 조회 → ScoredChunk
//! ```
//!
//! 새 청크는 임베딩과 인덱싱이 끝난 뒤에만 청크 목록에 반영됩니다.
//! 따라서 임베딩이 실패해도 청크 위치 = 청크 ID = 인덱스 행 번호가 항상 유지됩니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{RagConfig, RebuildMode};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extractor::{self, PageText};

use super::chunker::{chunk_pages, recursive_chunker, Chunk, Chunker};
use super::persist;
use super::vector::FlatL2Index;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 (청크 + 거리 점수, 작을수록 관련성 높음)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub score: f32,
}

/// 파일을 건너뛴 이유
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// 지원하지 않는 확장자
    Unsupported { extension: String },
    /// 읽을 수 없거나 손상된 파일
    Extraction(String),
}

impl SkipReason {
    /// 파일 단위 에러를 건너뜀 사유로 변환 (그 외 에러는 그대로 반환)
    fn from_error(err: RagError) -> std::result::Result<Self, RagError> {
        match err {
            RagError::UnsupportedFormat { extension, .. } => Ok(Self::Unsupported { extension }),
            RagError::Extraction { message, .. } => Ok(Self::Extraction(message)),
            other => Err(other),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { extension } if extension.is_empty() => {
                write!(f, "unsupported format (no extension)")
            }
            Self::Unsupported { extension } => write!(f, "unsupported format '{}'", extension),
            Self::Extraction(message) => write!(f, "extraction failed: {}", message),
        }
    }
}

/// 파일별 수집 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// 추출 및 청킹 성공
    Ingested {
        path: PathBuf,
        pages: usize,
        chunks: usize,
    },
    /// 건너뜀
    Skipped { path: PathBuf, reason: SkipReason },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Ingested { path, .. } | Self::Skipped { path, .. } => path,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// 수집 호출 결과 리포트
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// 입력 순서대로의 파일별 결과
    pub files: Vec<FileOutcome>,
    /// 이번 호출로 추가된 청크 수
    pub chunks_added: usize,
    /// 호출 후 전체 청크 수
    pub total_chunks: usize,
}

impl IngestReport {
    pub fn ingested_count(&self) -> usize {
        self.files.iter().filter(|f| !f.is_skipped()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_skipped()).count()
    }
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub vector_count: usize,
    pub dimension: usize,
    /// 서로 다른 파일 이름 수
    pub file_count: usize,
    /// 확장자별 파일 수
    pub files_by_type: BTreeMap<String, usize>,
    pub storage_dir: PathBuf,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// Knowledge Store - 검색 엔진 집합체
///
/// 내부 동기화가 없으므로 `ingest`는 `&mut self`로 한 번에 하나만 실행됩니다.
pub struct KnowledgeStore {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Box<dyn Chunker>,
    chunks: Vec<Chunk>,
    index: FlatL2Index,
}

impl KnowledgeStore {
    /// 저장소 열기
    ///
    /// 저장된 상태가 있으면 복원하고, 없거나 손상되었으면 빈 상태로 시작합니다.
    pub fn open(config: RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.storage_dir).map_err(|e| {
            RagError::Persistence(format!(
                "Failed to create storage directory {:?}: {}",
                config.storage_dir, e
            ))
        })?;

        let (chunks, index) = match persist::load(&config.storage_dir) {
            Ok(Some((chunks, index))) => {
                tracing::info!(
                    "Loaded {} chunks from {:?}",
                    chunks.len(),
                    config.storage_dir
                );
                (chunks, index)
            }
            Ok(None) => {
                tracing::info!("No existing knowledge base, initialized empty");
                (Vec::new(), FlatL2Index::new())
            }
            Err(e) => {
                tracing::warn!("Failed to load knowledge base, initialized empty: {}", e);
                (Vec::new(), FlatL2Index::new())
            }
        };

        if !index.is_empty() && index.dimension() != embedder.dimension() {
            tracing::warn!(
                "Index dimension {} does not match {} embedder dimension {}; queries will fail until the index is rebuilt",
                index.dimension(),
                embedder.name(),
                embedder.dimension()
            );
        }

        let chunker = recursive_chunker(config.chunk.clone());

        Ok(Self {
            config,
            embedder,
            chunker,
            chunks,
            index,
        })
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// 파일 목록 수집
    ///
    /// 파일 단위 실패(지원하지 않는 형식, 추출 실패)는 리포트에 기록하고 계속 진행합니다.
    /// 임베딩/인덱싱/저장 실패는 호출 전체를 중단하며, 이때 청크 목록과 인덱스는
    /// 호출 전 상태 그대로입니다.
    pub async fn ingest(&mut self, paths: &[PathBuf]) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut pending: Vec<Chunk> = Vec::new();
        let mut next_id = self.chunks.len();

        for path in paths {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());

            match extractor::extract(path) {
                Ok(pages) => {
                    let (chunks, next) =
                        chunk_pages(self.chunker.as_ref(), &pages, &file_name, next_id);
                    next_id = next;

                    tracing::info!(
                        "Processed {}: {} pages, {} chunks",
                        file_name,
                        pages.len(),
                        chunks.len()
                    );
                    report.files.push(FileOutcome::Ingested {
                        path: path.clone(),
                        pages: pages.len(),
                        chunks: chunks.len(),
                    });
                    pending.extend(chunks);
                }
                Err(e) if e.is_per_file() => {
                    tracing::warn!("Skipping {:?}: {}", path, e);
                    let reason = SkipReason::from_error(e)?;
                    report.files.push(FileOutcome::Skipped {
                        path: path.clone(),
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        report.chunks_added = self.commit(pending).await?;
        report.total_chunks = self.chunks.len();
        Ok(report)
    }

    /// 이미 추출된 페이지 수집 (추출을 호출자가 직접 하는 경우)
    ///
    /// 추가된 청크 수를 반환합니다.
    pub async fn ingest_pages(&mut self, file_name: &str, pages: &[PageText]) -> Result<usize> {
        let (pending, _) =
            chunk_pages(self.chunker.as_ref(), pages, file_name, self.chunks.len());
        self.commit(pending).await
    }

    /// 대기 청크를 임베딩하고 새 인덱스를 만든 뒤 저장, 저장이 끝나면 반영
    ///
    /// 어느 단계에서 실패하든 메모리 상태는 호출 전 그대로입니다.
    async fn commit(&mut self, pending: Vec<Chunk>) -> Result<usize> {
        if pending.is_empty() {
            tracing::info!("No new chunks; index unchanged");
            return Ok(0);
        }

        let added = pending.len();

        let index = match self.config.rebuild {
            RebuildMode::Full => {
                let texts: Vec<String> = self
                    .chunks
                    .iter()
                    .chain(pending.iter())
                    .map(|c| c.text.clone())
                    .collect();

                tracing::info!("Rebuilding index from {} chunks", texts.len());
                let vectors = self.embed_all(&texts).await?;
                FlatL2Index::build(vectors)?
            }
            RebuildMode::Append => {
                let texts: Vec<String> = pending.iter().map(|c| c.text.clone()).collect();

                tracing::info!("Appending {} chunks to index", texts.len());
                let vectors = self.embed_all(&texts).await?;
                let mut index = self.index.clone();
                index.append(vectors)?;
                index
            }
        };

        let mut chunks = Vec::with_capacity(self.chunks.len() + added);
        chunks.extend_from_slice(&self.chunks);
        chunks.extend(pending);

        persist::save(&self.config.storage_dir, &chunks, &index)?;

        self.chunks = chunks;
        self.index = index;
        Ok(added)
    }

    /// 배치 임베딩 + 결과 개수 검증
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "{} returned {} vectors for {} texts",
                self.embedder.name(),
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    // ========================================================================
    // Retrieval
    // ========================================================================

    /// 질의와 가장 가까운 청크 k개 (점수 오름차순, 길이 min(k, 청크 수))
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.is_empty() {
            return Ok(vec![]);
        }

        let query_vector = self.embedder.embed(query).await?;
        let neighbors = self.index.search(&query_vector, k)?;

        let results: Vec<ScoredChunk> = neighbors
            .into_iter()
            .filter_map(|n| {
                self.chunks.get(n.id).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score: n.distance,
                })
            })
            .collect();

        tracing::info!("Query: {:?} ({} results)", query, results.len());
        for result in &results {
            tracing::info!(
                "  Source: {} (Page {}) score={:.4}",
                result.chunk.metadata.file_name,
                result.chunk.metadata.page_number,
                result.score
            );
        }

        Ok(results)
    }

    // ========================================================================
    // Persistence / Accessors
    // ========================================================================

    /// 현재 상태 저장
    pub fn save(&self) -> Result<()> {
        persist::save(&self.config.storage_dir, &self.chunks, &self.index)
    }

    /// 저장소 통계
    pub fn stats(&self) -> StoreStats {
        let mut files = BTreeSet::new();
        let mut files_by_type: BTreeMap<String, usize> = BTreeMap::new();

        for chunk in &self.chunks {
            if files.insert(chunk.metadata.file_name.as_str()) {
                *files_by_type
                    .entry(chunk.metadata.file_type.to_lowercase())
                    .or_insert(0) += 1;
            }
        }

        StoreStats {
            chunk_count: self.chunks.len(),
            vector_count: self.index.len(),
            dimension: self.index.dimension(),
            file_count: files.len(),
            files_by_type,
            storage_dir: self.config.storage_dir.clone(),
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    /// 사용 중인 임베딩 프로바이더
    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }
}

// ============================================================================
// Context Formatting
// ============================================================================

/// 인용 헤더가 붙은 컨텍스트 블록 생성 (검색 결과 순서 유지)
///
/// ```text
/// [SOURCE: manual.pdf (Page 3)]
/// chunk text
///
/// [SOURCE: notes.txt (Page 1)]
/// chunk text
/// ```
pub fn format_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "[SOURCE: {} (Page {})]\n{}",
                r.chunk.metadata.file_name, r.chunk.metadata.page_number, r.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// Tests
// ============================================================================
