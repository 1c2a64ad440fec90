use super::{hash_concat, peak_sizes, Hash, HashFn, MerkleError, MerkleTree};
use std::collections::HashMap;

/// Root and leaf count of one perfect tree in a mountain range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Peak {
    pub root_hash: Hash,
    pub size: usize,
}

/// A leaf proof inside a mountain range: the proof only reaches the peak.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeakProof {
    pub peak_root: Hash,
    pub proof: Vec<Vec<Hash>>,
}

#[derive(Clone, Debug)]
pub struct MerkleMountainRange {
    degree: usize,
    trees: Vec<MerkleTree>,
    lookup: HashMap<Hash, usize>,
    root_hash: Hash,
}

impl MerkleMountainRange {
    pub fn new(hash_fn: HashFn, degree: usize, leaves: &[Hash]) -> Result<Self, MerkleError> {
        if degree < 2 {
            return Err(MerkleError::InvalidDegree(degree));
        }
        if leaves.is_empty() {
            return Err(MerkleError::NoLeaves);
        }

        let mut trees = Vec::new();
        let mut lookup = HashMap::new();
        let mut offset = 0;
        for size in peak_sizes(leaves.len(), degree) {
            let tree = MerkleTree::new(hash_fn, degree, &leaves[offset..offset + size])?;
            lookup.entry(tree.root_hash()).or_insert(trees.len());
            trees.push(tree);
            offset += size;
        }

        let roots: Vec<Hash> = trees.iter().map(MerkleTree::root_hash).collect();
        Ok(Self {
            degree,
            trees,
            lookup,
            root_hash: hash_concat(hash_fn, &roots),
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn root_hash(&self) -> Hash {
        self.root_hash
    }

    /// Total number of leaves.
    pub fn size(&self) -> usize {
        self.trees.iter().map(MerkleTree::size).sum()
    }

    pub fn peaks(&self) -> Vec<Peak> {
        self.trees
            .iter()
            .map(|t| Peak {
                root_hash: t.root_hash(),
                size: t.size(),
            })
            .collect()
    }

    /// The peak tree rooted at `root`.
    pub fn tree(&self, root: &Hash) -> Option<&MerkleTree> {
        self.lookup.get(root).map(|&i| &self.trees[i])
    }

    pub fn leaf(&self, index: usize) -> Option<Hash> {
        let (tree, local) = self.locate(index)?;
        tree.leaf(local)
    }

    /// Proof of leaf `index` up to the root of the peak containing it.
    pub fn generate_proof(&self, index: usize) -> Result<PeakProof, MerkleError> {
        let (tree, local) = self.locate(index).ok_or(MerkleError::IndexOutOfRange {
            index,
            size: self.size(),
        })?;
        Ok(PeakProof {
            peak_root: tree.root_hash(),
            proof: tree.generate_proof(local)?,
        })
    }

    fn locate(&self, index: usize) -> Option<(&MerkleTree, usize)> {
        let mut local = index;
        for tree in &self.trees {
            if local < tree.size() {
                return Some((tree, local));
            }
            local -= tree.size();
        }
        None
    }
}

/// Stateless verifier for mountain range commitments.
#[derive(Clone, Copy, Debug)]
pub struct MerkleMountainVerify {
    hash_fn: HashFn,
    degree: usize,
}

impl MerkleMountainVerify {
    pub fn new(hash_fn: HashFn, degree: usize) -> Self {
        Self { hash_fn, degree }
    }

    /// Accepts exactly the canonical peak layout for `size` whose roots hash to `root`.
    pub fn verify(&self, root: &Hash, peaks: &[Peak], size: usize) -> bool {
        let expected = peak_sizes(size, self.degree);
        if expected.is_empty() || expected.len() != peaks.len() {
            return false;
        }
        if expected.iter().zip(peaks).any(|(s, p)| *s != p.size) {
            return false;
        }
        let roots: Vec<Hash> = peaks.iter().map(|p| p.root_hash).collect();
        hash_concat(self.hash_fn, &roots) == *root
    }

    /// The peak holding leaf `index`, and the leaf's index inside that peak.
    pub fn peak_and_index<'a>(&self, peaks: &'a [Peak], index: usize) -> Option<(&'a Peak, usize)> {
        let mut offset = 0;
        for peak in peaks {
            if offset + peak.size > index {
                return Some((peak, index - offset));
            }
            offset += peak.size;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::MerkleVerify;
    use crate::ssz::sha256;

    fn leaves(count: usize) -> Vec<Hash> {
        (0..count as u64).map(|i| sha256(&(i + 1000).to_le_bytes())).collect()
    }

    #[test]
    fn test_peaks_follow_greedy_decomposition() {
        let mmr = MerkleMountainRange::new(sha256, 2, &leaves(7)).unwrap();
        let sizes: Vec<usize> = mmr.peaks().iter().map(|p| p.size).collect();
        assert_eq!(sizes, vec![4, 2, 1]);
        assert_eq!(mmr.size(), 7);

        let roots: Vec<Hash> = mmr.peaks().iter().map(|p| p.root_hash).collect();
        assert_eq!(mmr.root_hash(), sha256(&roots.concat()));
    }

    #[test]
    fn test_verify_accepts_only_canonical_peaks() {
        let verifier = MerkleMountainVerify::new(sha256, 3);
        for size in 1..30 {
            let mmr = MerkleMountainRange::new(sha256, 3, &leaves(size)).unwrap();
            let peaks = mmr.peaks();
            assert!(verifier.verify(&mmr.root_hash(), &peaks, size));
            assert!(!verifier.verify(&mmr.root_hash(), &peaks, size + 1));
            if size > 1 {
                assert!(!verifier.verify(&mmr.root_hash(), &peaks, size - 1));
            }
        }
    }

    #[test]
    fn test_verify_rejects_tampered_layouts() {
        let mmr = MerkleMountainRange::new(sha256, 2, &leaves(6)).unwrap();
        let verifier = MerkleMountainVerify::new(sha256, 2);
        let peaks = mmr.peaks();

        let mut swapped = peaks.clone();
        swapped.reverse();
        assert!(!verifier.verify(&mmr.root_hash(), &swapped, 6));

        let mut extra = peaks.clone();
        extra.push(peaks[1]);
        assert!(!verifier.verify(&mmr.root_hash(), &extra, 6));

        assert!(!verifier.verify(&mmr.root_hash(), &peaks[..1], 6));
        assert!(!verifier.verify(&[0u8; 32], &peaks, 6));
        assert!(!verifier.verify(&mmr.root_hash(), &[], 0));
    }

    #[test]
    fn test_leaf_proofs_verify_against_their_peak() {
        let l = leaves(13);
        let mmr = MerkleMountainRange::new(sha256, 3, &l).unwrap();
        let mountain = MerkleMountainVerify::new(sha256, 3);
        let tree_verify = MerkleVerify::new(sha256, 3);
        let peaks = mmr.peaks();

        for (index, leaf) in l.iter().enumerate() {
            let proof = mmr.generate_proof(index).unwrap();
            let (peak, local) = mountain.peak_and_index(&peaks, index).unwrap();
            assert_eq!(peak.root_hash, proof.peak_root);
            assert!(tree_verify.verify(leaf, local, &peak.root_hash, &proof.proof));
            assert_eq!(mmr.leaf(index), Some(*leaf));
        }
        assert!(mountain.peak_and_index(&peaks, 13).is_none());
        assert!(mmr.generate_proof(13).is_err());
    }

    #[test]
    fn test_tree_lookup_by_peak_root() {
        let mmr = MerkleMountainRange::new(sha256, 2, &leaves(5)).unwrap();
        for peak in mmr.peaks() {
            let tree = mmr.tree(&peak.root_hash).unwrap();
            assert_eq!(tree.size(), peak.size);
        }
        assert!(mmr.tree(&[7u8; 32]).is_none());
    }
}
