//! Knowledge 모듈 - 검색 엔진 코어
//!
//! - Chunker: 재귀 경계 탐색 텍스트 분할
//! - Vector: 정확한 L2 평면 인덱스
//! - Persist: JSON 청크 목록 + 바이너리 인덱스 저장
//! - Store: 수집/검색을 중재하는 집합체

mod chunker;
mod persist;
mod store;
mod vector;

// Re-exports
pub use chunker::{
    chunk_pages, recursive_chunker, Chunk, ChunkConfig, ChunkMetadata, Chunker,
    RecursiveChunker, DEFAULT_SEPARATORS,
};
pub use persist::{CHUNKS_FILE, INDEX_FILE};
pub use store::{
    format_context, FileOutcome, IngestReport, KnowledgeStore, ScoredChunk, SkipReason, StoreStats,
};
pub use vector::{squared_l2, FlatL2Index, Neighbor};
