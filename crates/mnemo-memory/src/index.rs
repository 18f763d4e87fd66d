// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flat append-only vector index.
//!
//! Vectors are positionally aligned with memory items: id i holds vector i.
//! Search is a brute-force squared-L2 scan, which is a bounded local
//! computation at single-user scale. The index serializes to a small binary
//! blob (header + little-endian f32 rows) persisted through the atomic
//! persistence layer.

use mnemo_core::MnemoError;

/// Magic bytes at the head of a serialized index blob.
const MAGIC: &[u8; 4] = b"MNVX";

/// Lifecycle state of the vector index inside the store.
///
/// `Uninitialized -> Loading -> Ready`, with `Ready -> Rebuilding -> Ready`
/// around bulk rebuilds. A live store never reverts to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uninitialized,
    Loading,
    Ready,
    Rebuilding,
}

/// Append-only flat vector index with positional ids.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimensions: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index. The dimension is fixed by the first `add`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vectors stored.
    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.data.len() / self.dimensions
        }
    }

    /// True when no vectors are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Dimension of stored vectors (0 until the first append).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Append a vector; the returned id is its stable position.
    ///
    /// The first append fixes the index dimension; later appends must match.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, MnemoError> {
        if vector.is_empty() {
            return Err(MnemoError::Integrity("cannot index an empty vector".into()));
        }
        if self.dimensions == 0 {
            self.dimensions = vector.len();
        } else if vector.len() != self.dimensions {
            return Err(MnemoError::Integrity(format!(
                "vector dimension {} != index dimension {}",
                vector.len(),
                self.dimensions
            )));
        }
        let id = self.len();
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    /// Drop every vector with id >= `len`. Used for write-path rollback.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dimensions);
    }

    /// Top-`k` nearest vectors by squared L2 distance, ascending.
    ///
    /// An empty index yields an empty result, not an error.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if self.is_empty() || query.len() != self.dimensions || k == 0 {
            return Vec::new();
        }
        let mut hits: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(id, row)| {
                let dist: f32 = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| {
                        let d = a - b;
                        d * d
                    })
                    .sum();
                (id, dist)
            })
            .collect();
        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(k);
        hits
    }

    /// Serialize to the binary blob format: magic, dim u32, count u32, rows.
    pub fn to_bytes(&self) -> Vec<u8> {
        let count = self.len() as u32;
        let mut bytes = Vec::with_capacity(12 + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(self.dimensions as u32).to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Deserialize from the binary blob format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MnemoError> {
        if bytes.len() < 12 || &bytes[0..4] != MAGIC {
            return Err(MnemoError::Integrity(
                "vector index blob has no valid header".into(),
            ));
        }
        let dimensions = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let body = &bytes[12..];
        if body.len() != dimensions * count * 4 {
            return Err(MnemoError::Integrity(format!(
                "vector index blob body is {} bytes, expected {}",
                body.len(),
                dimensions * count * 4
            )));
        }
        let data = body
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self { dimensions, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_assigns_positional_ids() {
        let mut index = VectorIndex::new();
        assert_eq!(index.add(&[1.0, 0.0]).unwrap(), 0);
        assert_eq!(index.add(&[0.0, 1.0]).unwrap(), 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimensions(), 2);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::new();
        index.add(&[1.0, 0.0]).unwrap();
        let err = index.add(&[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, MnemoError::Integrity(_)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn search_empty_index_returns_empty() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn search_orders_by_distance_ascending() {
        let mut index = VectorIndex::new();
        index.add(&[0.0, 0.0]).unwrap(); // dist 2.0 from query
        index.add(&[1.0, 1.0]).unwrap(); // dist 0.0
        index.add(&[1.0, 0.0]).unwrap(); // dist 1.0

        let hits = index.search(&[1.0, 1.0], 3);
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[2].0, 0);
        assert!(hits[0].1 < hits[1].1 && hits[1].1 < hits[2].1);
    }

    #[test]
    fn search_truncates_to_k() {
        let mut index = VectorIndex::new();
        for i in 0..10 {
            index.add(&[i as f32, 0.0]).unwrap();
        }
        assert_eq!(index.search(&[0.0, 0.0], 3).len(), 3);
    }

    #[test]
    fn truncate_rolls_back_appends() {
        let mut index = VectorIndex::new();
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[0.0, 1.0]).unwrap();
        index.truncate(1);
        assert_eq!(index.len(), 1);
        let hits = index.search(&[1.0, 0.0], 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 0);
    }

    #[test]
    fn blob_roundtrip() {
        let mut index = VectorIndex::new();
        index.add(&[0.25, -1.5, 3.0]).unwrap();
        index.add(&[1.0, 2.0, -0.5]).unwrap();

        let restored = VectorIndex::from_bytes(&index.to_bytes()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.dimensions(), 3);
        let hits = restored.search(&[0.25, -1.5, 3.0], 1);
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 < f32::EPSILON);
    }

    #[test]
    fn empty_blob_roundtrip() {
        let index = VectorIndex::new();
        let restored = VectorIndex::from_bytes(&index.to_bytes()).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn corrupt_blob_is_integrity_error() {
        assert!(matches!(
            VectorIndex::from_bytes(b"garbage"),
            Err(MnemoError::Integrity(_))
        ));
        // Valid header, truncated body.
        let mut index = VectorIndex::new();
        index.add(&[1.0, 2.0]).unwrap();
        let mut bytes = index.to_bytes();
        bytes.pop();
        assert!(matches!(
            VectorIndex::from_bytes(&bytes),
            Err(MnemoError::Integrity(_))
        ));
    }
}
