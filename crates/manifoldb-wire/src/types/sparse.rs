//! Sparse float vector type.
//!
//! Sparse vectors are represented as sorted (index, value) pairs. This is the
//! row type of `SparseFloatVector` columns and of sparse search targets.

use std::collections::BTreeMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::encoding::sparse::{decode_sparse, encode_sparse};
use crate::error::{WireError, WireResult};

/// A sparse float vector.
///
/// The pairs are always sorted by index in ascending order, and indices are unique.
///
/// # Example
///
/// ```
/// use manifoldb_wire::types::SparseVector;
///
/// // Create from unsorted pairs - they will be sorted
/// let vector = SparseVector::new(vec![(100, 0.5), (10, 0.3), (50, 0.2)]).unwrap();
/// assert_eq!(vector.nnz(), 3);
/// assert_eq!(vector.indices().collect::<Vec<_>>(), vec![10, 50, 100]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    /// Sorted (index, value) pairs.
    data: Vec<(u32, f32)>,
}

impl SparseVector {
    /// Create a sparse vector from (index, value) pairs.
    ///
    /// The pairs will be sorted by index.
    ///
    /// # Errors
    ///
    /// Returns an error if there are duplicate indices.
    pub fn new(mut data: Vec<(u32, f32)>) -> WireResult<Self> {
        data.sort_by_key(|&(idx, _)| idx);

        for window in data.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(WireError::encoding(format!(
                    "duplicate index {} in sparse vector",
                    window[0].0
                )));
            }
        }

        Ok(Self { data })
    }

    /// Create from pairs that are already strictly ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the indices are not strictly ascending.
    pub fn from_sorted(data: Vec<(u32, f32)>) -> WireResult<Self> {
        for window in data.windows(2) {
            if window[0].0 >= window[1].0 {
                return Err(WireError::encoding("sparse vector indices not sorted"));
            }
        }
        Ok(Self { data })
    }

    /// Decode from the sparse pair-list wire format.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte format is invalid.
    pub fn from_bytes(bytes: &[u8]) -> WireResult<Self> {
        decode_sparse(bytes)
    }

    /// Encode into the sparse pair-list wire format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_sparse(self)
    }

    /// Get the number of stored elements.
    #[inline]
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Check if the vector has no stored elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over the indices.
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.data.iter().map(|&(idx, _)| idx)
    }

    /// Iterate over the values.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().map(|&(_, v)| v)
    }

    /// Look up the value stored at an index.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<f32> {
        self.data.binary_search_by_key(&index, |&(idx, _)| idx).ok().map(|pos| self.data[pos].1)
    }

    /// Consume and return the sorted pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(u32, f32)> {
        self.data
    }
}

impl Deref for SparseVector {
    type Target = [(u32, f32)];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl From<BTreeMap<u32, f32>> for SparseVector {
    fn from(map: BTreeMap<u32, f32>) -> Self {
        Self { data: map.into_iter().collect() }
    }
}

impl From<&SparseVector> for BTreeMap<u32, f32> {
    fn from(vector: &SparseVector) -> Self {
        vector.data.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_pairs() {
        let v = SparseVector::new(vec![(7, 0.7), (1, 0.1), (3, 0.3)]).expect("valid");
        assert_eq!(&*v, &[(1, 0.1), (3, 0.3), (7, 0.7)]);
        assert_eq!(v.get(3), Some(0.3));
        assert_eq!(v.get(4), None);
    }

    #[test]
    fn test_new_rejects_duplicates() {
        assert!(SparseVector::new(vec![(1, 0.1), (1, 0.2)]).is_err());
    }

    #[test]
    fn test_from_sorted_rejects_unsorted() {
        assert!(SparseVector::from_sorted(vec![(3, 0.1), (1, 0.2)]).is_err());
        assert!(SparseVector::from_sorted(vec![(1, 0.1), (3, 0.2)]).is_ok());
    }

    #[test]
    fn test_btreemap_conversion() {
        let map: BTreeMap<u32, f32> = [(5, 1.0), (2, 2.0)].into_iter().collect();
        let v = SparseVector::from(map.clone());
        assert_eq!(v.indices().collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(BTreeMap::from(&v), map);
    }
}
