//! Sparse float vector pair-list codec.
//!
//! Each pair is exactly 8 bytes: a little-endian `u32` index followed by a
//! little-endian IEEE-754 `f32` value. Pairs appear in strictly ascending index
//! order and there is no length prefix.

use crate::error::{WireError, WireResult};
use crate::types::SparseVector;

/// Size in bytes of one encoded (index, value) pair.
pub const SPARSE_PAIR_LEN: usize = 8;

/// Encode a sparse vector into its pair-list bytes.
#[must_use]
pub fn encode_sparse(vector: &SparseVector) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.nnz() * SPARSE_PAIR_LEN);
    for &(idx, val) in vector.iter() {
        bytes.extend_from_slice(&idx.to_le_bytes());
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Decode pair-list bytes into a sparse vector.
///
/// # Errors
///
/// Returns an error if the length is not a multiple of 8 or the indices are not
/// strictly ascending.
pub fn decode_sparse(bytes: &[u8]) -> WireResult<SparseVector> {
    if bytes.len() % SPARSE_PAIR_LEN != 0 {
        return Err(WireError::encoding(format!(
            "sparse vector byte length {} is not a multiple of {}",
            bytes.len(),
            SPARSE_PAIR_LEN
        )));
    }

    let mut data = Vec::with_capacity(bytes.len() / SPARSE_PAIR_LEN);
    for chunk in bytes.chunks_exact(SPARSE_PAIR_LEN) {
        let idx_bytes: [u8; 4] = chunk[..4]
            .try_into()
            .map_err(|_| WireError::encoding("failed to read sparse index"))?;
        let val_bytes: [u8; 4] = chunk[4..]
            .try_into()
            .map_err(|_| WireError::encoding("failed to read sparse value"))?;
        data.push((u32::from_le_bytes(idx_bytes), f32::from_le_bytes(val_bytes)));
    }

    SparseVector::from_sorted(data)
}
