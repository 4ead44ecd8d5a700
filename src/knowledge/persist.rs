//! 영속화 - 청크 목록(JSON) + 벡터 인덱스(바이너리)
//!
//! ```text
//! <storage_dir>/knowledge_base.json   청크 배열 {text, metadata:{chunk_id,file_name,file_type,page_number}}
//! <storage_dir>/vector_store.index    평면 L2 인덱스
//! ```
//!
//! 두 파일은 함께 저장되고 함께 로드됩니다. 하나라도 없으면 저장소가 없는 것으로 봅니다.
//!
//! 저장은 두 임시 파일을 모두 쓴 뒤에 차례로 rename 합니다. 각 파일의 교체는 원자적이지만
//! 두 rename 사이에 중단되면 새 JSON과 이전 인덱스가 남을 수 있습니다. 이런 쌍은
//! 청크 수/인덱스 행 수 검증에서 걸러지고, 저장소는 빈 상태로 시작합니다.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{RagError, Result};

use super::chunker::Chunk;
use super::vector::FlatL2Index;

/// 청크 메타데이터 파일 이름
pub const CHUNKS_FILE: &str = "knowledge_base.json";
/// 벡터 인덱스 파일 이름
pub const INDEX_FILE: &str = "vector_store.index";

/// 인덱스 파일 매직 바이트
const INDEX_MAGIC: &[u8; 4] = b"CRFL";
/// 인덱스 파일 포맷 버전
const INDEX_VERSION: u32 = 1;

// ============================================================================
// Save / Load
// ============================================================================

/// 청크 목록과 인덱스를 저장
pub fn save(storage_dir: &Path, chunks: &[Chunk], index: &FlatL2Index) -> Result<()> {
    fs::create_dir_all(storage_dir)
        .map_err(|e| RagError::Persistence(format!("Failed to create {:?}: {}", storage_dir, e)))?;

    let json = serde_json::to_vec_pretty(chunks)?;
    let mut buf = Vec::with_capacity(20 + index.as_raw().len() * 4);
    write_index(&mut buf, index)?;

    let chunks_path = storage_dir.join(CHUNKS_FILE);
    let index_path = storage_dir.join(INDEX_FILE);

    // 둘 다 쓴 뒤에 교체
    let chunks_temp = write_temp(&chunks_path, &json)?;
    let index_temp = match write_temp(&index_path, &buf) {
        Ok(path) => path,
        Err(e) => {
            fs::remove_file(&chunks_temp).ok();
            return Err(e);
        }
    };

    fs::rename(&chunks_temp, &chunks_path)?;
    fs::rename(&index_temp, &index_path)?;

    tracing::info!("Saved {} chunks to {:?}", chunks.len(), storage_dir);
    Ok(())
}

/// 저장된 청크 목록과 인덱스를 로드
///
/// 두 파일 중 하나라도 없으면 `Ok(None)`. 파일은 있으나 읽을 수 없거나
/// 청크 ID/인덱스 행이 정렬되어 있지 않으면 에러입니다.
pub fn load(storage_dir: &Path) -> Result<Option<(Vec<Chunk>, FlatL2Index)>> {
    let chunks_path = storage_dir.join(CHUNKS_FILE);
    let index_path = storage_dir.join(INDEX_FILE);

    if !chunks_path.is_file() || !index_path.is_file() {
        return Ok(None);
    }

    let json = fs::read(&chunks_path)?;
    let chunks: Vec<Chunk> = serde_json::from_slice(&json)?;

    let bytes = fs::read(&index_path)?;
    let index = read_index(&mut bytes.as_slice())?;

    validate_alignment(&chunks, &index)?;

    Ok(Some((chunks, index)))
}

/// 청크 위치 = chunk_id = 인덱스 행 번호 검증
pub fn validate_alignment(chunks: &[Chunk], index: &FlatL2Index) -> Result<()> {
    if let Some((pos, chunk)) = chunks.iter().enumerate().find(|(pos, c)| c.id() != *pos) {
        return Err(RagError::Persistence(format!(
            "chunk at position {} has chunk_id {}",
            pos,
            chunk.id()
        )));
    }
    if index.len() != chunks.len() {
        return Err(RagError::Persistence(format!(
            "index holds {} vectors but there are {} chunks",
            index.len(),
            chunks.len()
        )));
    }
    Ok(())
}

// ============================================================================
// Index Codec
// ============================================================================

/// magic(4) | version u32 | dimension u32 | count u64 | count×dimension f32 (LE)
fn write_index<W: Write>(writer: &mut W, index: &FlatL2Index) -> Result<()> {
    writer.write_all(INDEX_MAGIC)?;
    writer.write_u32::<LittleEndian>(INDEX_VERSION)?;
    writer.write_u32::<LittleEndian>(index.dimension() as u32)?;
    writer.write_u64::<LittleEndian>(index.len() as u64)?;
    for value in index.as_raw() {
        writer.write_f32::<LittleEndian>(*value)?;
    }
    Ok(())
}

fn read_index<R: Read>(reader: &mut R) -> Result<FlatL2Index> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| RagError::Persistence(format!("Truncated index header: {e}")))?;
    if &magic != INDEX_MAGIC {
        return Err(RagError::Persistence("Not a vector index file".to_string()));
    }

    let version = reader.read_u32::<LittleEndian>()?;
    if version != INDEX_VERSION {
        return Err(RagError::Persistence(format!(
            "Unsupported index version: {version}"
        )));
    }

    let dimension = reader.read_u32::<LittleEndian>()? as usize;
    let count = reader.read_u64::<LittleEndian>()? as usize;

    let total = count
        .checked_mul(dimension)
        .ok_or_else(|| RagError::Persistence("Index size overflow".to_string()))?;

    let mut data = Vec::new();
    for _ in 0..total {
        let value = reader
            .read_f32::<LittleEndian>()
            .map_err(|e| RagError::Persistence(format!("Truncated index data: {e}")))?;
        data.push(value);
    }

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(RagError::Persistence("Trailing bytes after index data".to_string()));
    }

    let index = FlatL2Index::from_raw(dimension, data)?;
    if index.len() != count {
        return Err(RagError::Persistence(format!(
            "Index header declares {} vectors but holds {}",
            count,
            index.len()
        )));
    }
    Ok(index)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 대상 옆의 임시 파일에 기록하고 그 경로를 반환
fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let temp_path: PathBuf = path.with_extension("tmp");
    fs::write(&temp_path, bytes)?;
    Ok(temp_path)
}

// ============================================================================
// Tests
// ============================================================================
