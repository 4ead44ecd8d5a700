//! Vector Index - 정확한 L2 최근접 이웃 검색
//!
//! 모든 벡터를 청크 ID 순서로 한 버퍼에 저장하고, 질의마다 전체를 비교합니다 (O(n·d)).
//! 근사나 가지치기는 없으며, 소규모~중규모 코퍼스 전용입니다.

use serde::Serialize;

use crate::error::{RagError, Result};

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 (거리, 청크 ID)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    /// 제곱 유클리드 거리 (작을수록 가까움)
    pub distance: f32,
    /// 행 번호 = 청크 ID
    pub id: usize,
}

// ============================================================================
// FlatL2Index
// ============================================================================

/// 평면 L2 인덱스
///
/// 행 i는 청크 ID i의 벡터입니다. 차원은 첫 빌드 때 정해집니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// 빈 인덱스
    pub fn new() -> Self {
        Self::default()
    }

    /// 벡터 목록으로 새 인덱스 생성
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let mut index = Self::new();
        index.append(vectors)?;
        Ok(index)
    }

    /// 저장된 원시 버퍼로 복원
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 && !data.is_empty() {
            return Err(RagError::Persistence(
                "index has vectors but zero dimension".to_string(),
            ));
        }
        if dimension > 0 && data.len() % dimension != 0 {
            return Err(RagError::Persistence(format!(
                "index buffer length {} is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    /// 벡터를 뒤에 추가
    ///
    /// 모든 벡터의 차원을 먼저 검사하므로, 실패 시 인덱스는 변경되지 않습니다.
    pub fn append(&mut self, vectors: Vec<Vec<f32>>) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let dimension = if self.dimension == 0 { first.len() } else { self.dimension };
        if dimension == 0 {
            return Err(RagError::Embedding("embedding vectors are empty".to_string()));
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        self.dimension = dimension;
        self.data.reserve(vectors.len() * dimension);
        for vector in vectors {
            self.data.extend_from_slice(&vector);
        }
        Ok(())
    }

    /// k개 최근접 이웃 검색 (거리 오름차순, 길이 min(k, len))
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, row)| Neighbor {
                distance: squared_l2(query, row),
                id,
            })
            .collect();

        // 같은 거리는 낮은 ID 우선 (결정적 순서)
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        neighbors.truncate(k);

        Ok(neighbors)
    }

    /// 저장된 벡터 수
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 벡터 차원 (빈 인덱스는 0)
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 원시 버퍼 (행 우선)
    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 제곱 유클리드 거리
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatL2Index {
        FlatL2Index::build(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 3.0],
            vec![5.0, 5.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let hits = index.search(&[0.9, 0.1], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((hits[0].distance - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_search_k_larger_than_count() {
        let index = sample_index();
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 4);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_ties_prefer_lower_id() {
        let index = FlatL2Index::build(vec![vec![1.0], vec![-1.0], vec![1.0]]).unwrap();
        let ids: Vec<usize> = index.search(&[0.0], 3).unwrap().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_index_search() {
        let index = FlatL2Index::new();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 2.0, 3.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let err = FlatL2Index::build(vec![vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_append_keeps_dimension_fixed() {
        let mut index = sample_index();
        let err = index.append(vec![vec![1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
        assert_eq!(index.len(), 4);

        index.append(vec![vec![9.0, 9.0]]).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(&index.as_raw()[8..], &[9.0, 9.0]);
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = sample_index();
        assert!(index.search(&[1.0, 2.0, 3.0], 1).is_err());
    }

    #[test]
    fn test_from_raw_validates_length() {
        assert!(FlatL2Index::from_raw(3, vec![1.0; 7]).is_err());
        assert!(FlatL2Index::from_raw(0, vec![1.0]).is_err());
        assert_eq!(FlatL2Index::from_raw(2, vec![1.0; 6]).unwrap().len(), 3);
    }
}
