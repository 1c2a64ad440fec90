//! Fixed-arity Merkle trees and Merkle Mountain Ranges.
//!
//! Nodes hash the plain concatenation of their `n` children's hashes; leaves
//! are stored as given (no leaf re-hashing). A mountain range splits an
//! arbitrary leaf count into perfect trees whose sizes are decreasing powers
//! of `n`, largest first, so the peak layout is a pure function of the size.
//!
//! Verifier objects carry only the hash function and degree; they hold no
//! tree state and can be shared freely.

pub mod mmr;
pub mod tree;

pub use mmr::*;
pub use tree::*;

use thiserror::Error;

pub type Hash = [u8; 32];

/// Hash function applied to the concatenation of child hashes.
pub type HashFn = fn(&[u8]) -> Hash;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("there should be at least one leaf")]
    NoLeaves,

    #[error("tree degree must be at least 2, got {0}")]
    InvalidDegree(usize),

    #[error("leaf count {leaves} is not an exact power of the tree degree {degree}")]
    NotPowerOfDegree { leaves: usize, degree: usize },

    #[error("leaf index {index} out of range for {size} leaves")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("depth {depth} too big for a tree of height {height}")]
    DepthTooBig { depth: usize, height: usize },
}

/// Largest `k` with `base^k <= x`. Zero for `x < base`.
pub fn log_floor(x: usize, base: usize) -> usize {
    if base < 2 {
        return 0;
    }
    let mut k = 0;
    let mut rest = x;
    while rest >= base {
        rest /= base;
        k += 1;
    }
    k
}

/// Greedy decomposition of `size` into powers of `degree`, largest first.
pub fn peak_sizes(size: usize, degree: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    if degree < 2 {
        return sizes;
    }
    let mut left = size;
    while left > 0 {
        let peak = degree.pow(log_floor(left, degree) as u32);
        sizes.push(peak);
        left -= peak;
    }
    sizes
}

pub(crate) fn hash_concat(hash_fn: HashFn, hashes: &[Hash]) -> Hash {
    hash_fn(&hashes.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_floor() {
        assert_eq!(log_floor(1, 2), 0);
        assert_eq!(log_floor(7, 2), 2);
        assert_eq!(log_floor(8, 2), 3);
        assert_eq!(log_floor(199, 200), 0);
        assert_eq!(log_floor(200, 200), 1);
        assert_eq!(log_floor(40_000, 200), 2);
        assert_eq!(log_floor(39_999, 200), 1);
    }

    #[test]
    fn test_peak_sizes_greedy() {
        assert_eq!(peak_sizes(1, 2), vec![1]);
        assert_eq!(peak_sizes(7, 2), vec![4, 2, 1]);
        assert_eq!(peak_sizes(8, 2), vec![8]);
        assert_eq!(peak_sizes(13, 3), vec![9, 3, 1]);
        assert_eq!(peak_sizes(17, 3), vec![9, 3, 3, 1, 1]);
        assert_eq!(peak_sizes(401, 200), vec![200, 200, 1]);
        assert!(peak_sizes(0, 2).is_empty());
    }

    #[test]
    fn test_peak_sizes_cover_size_and_decrease() {
        for degree in 2..6 {
            for size in 1..200 {
                let sizes = peak_sizes(size, degree);
                assert_eq!(sizes.iter().sum::<usize>(), size);
                assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
                // At most degree - 1 peaks share a size.
                for s in &sizes {
                    assert!(sizes.iter().filter(|x| *x == s).count() < degree);
                }
            }
        }
    }
}
