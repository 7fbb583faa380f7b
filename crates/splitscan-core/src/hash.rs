//! Stable hashing helpers for split documents and scan results.
//!
//! `RowDigest` folds per-row hashes with wrapping addition, so two scans that
//! produce the same multiset of rows in any order and any batch/split shape
//! end with the same digest.

use blake3::Hasher;

use crate::types::{scalar_type_order, RowBatch, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    let out = h.finalize();
    Hash256(out.into())
}

/// Hash a scalar value into a hasher.
pub fn hash_scalar(scalar: &Scalar, hasher: &mut Hasher) {
    use Scalar::*;

    // Type discriminant first so I32(1) and I64(1) differ.
    hasher.update(&[scalar_type_order(scalar)]);

    match scalar {
        Null => {}
        Bool(b) => {
            hasher.update(&[*b as u8]);
        }
        I32(i) | Date(i) => {
            hasher.update(&i.to_le_bytes());
        }
        I64(i) => {
            hasher.update(&i.to_le_bytes());
        }
        F32(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        F64(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Str(s) => {
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Bin(b) => {
            hasher.update(&(b.len() as u64).to_le_bytes());
            hasher.update(b);
        }
    }
}

/// Order-insensitive digest over the rows of many batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDigest {
    lanes: [u64; 4],
    rows: u64,
}

impl RowDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, batch: &RowBatch) {
        for row in 0..batch.num_rows() {
            let mut h = Hasher::new();
            for col in &batch.columns {
                hash_scalar(&col.values[row], &mut h);
            }
            let out: [u8; 32] = h.finalize().into();
            for (lane, chunk) in self.lanes.iter_mut().zip(out.chunks_exact(8)) {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                *lane = lane.wrapping_add(u64::from_le_bytes(word));
            }
            self.rows += 1;
        }
    }

    /// Combine with a digest computed elsewhere (e.g. another worker).
    pub fn merge(&mut self, other: &RowDigest) {
        for (a, b) in self.lanes.iter_mut().zip(other.lanes.iter()) {
            *a = a.wrapping_add(*b);
        }
        self.rows += other.rows;
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn finish(&self) -> Hash256 {
        let mut bytes = Vec::with_capacity(40);
        for lane in &self.lanes {
            bytes.extend_from_slice(&lane.to_le_bytes());
        }
        bytes.extend_from_slice(&self.rows.to_le_bytes());
        hash_bytes(&bytes)
    }
}
