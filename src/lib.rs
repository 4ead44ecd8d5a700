//! citerag - 출처 인용 RAG 검색 엔진
//!
//! PDF, DOCX, 텍스트 문서를 수집하여 청크로 나누고, 임베딩하여 정확한 L2 인덱스로
//! 검색합니다. 검색 결과에는 (파일 이름, 페이지 번호) 인용이 붙습니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;

// Re-exports
pub use config::{get_data_dir, RagConfig, RebuildMode, DEFAULT_TOP_K};
pub use embedding::{
    create_embedder, get_api_key, has_api_key, EmbedderKind, EmbeddingProvider, HashingEmbedding,
    MiniLmEmbedding, OpenAiEmbedding,
};
pub use error::{RagError, Result};
pub use extractor::{extract, DocumentKind, PageText};
pub use knowledge::{
    format_context, Chunk, ChunkConfig, ChunkMetadata, Chunker, FileOutcome, FlatL2Index,
    IngestReport, KnowledgeStore, RecursiveChunker, ScoredChunk, SkipReason, StoreStats,
};
