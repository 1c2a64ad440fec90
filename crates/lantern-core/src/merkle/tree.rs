use super::{hash_concat, log_floor, Hash, HashFn, MerkleError};
use std::collections::HashMap;

/// A node in the tree arena. Parent and children are arena indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub hash: Hash,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A perfect `degree`-ary Merkle tree.
///
/// Leaves occupy arena slots `0..size`, then each layer follows in order;
/// the root is the last node.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    degree: usize,
    nodes: Vec<Node>,
    size: usize,
    lookup: HashMap<Hash, usize>,
}

impl MerkleTree {
    /// Build a tree over `leaves`, whose count must be an exact power of `degree`.
    pub fn new(hash_fn: HashFn, degree: usize, leaves: &[Hash]) -> Result<Self, MerkleError> {
        if degree < 2 {
            return Err(MerkleError::InvalidDegree(degree));
        }
        let size = leaves.len();
        if size == 0 {
            return Err(MerkleError::NoLeaves);
        }
        if degree.pow(log_floor(size, degree) as u32) != size {
            return Err(MerkleError::NotPowerOfDegree {
                leaves: size,
                degree,
            });
        }

        let mut tree = Self {
            degree,
            nodes: Vec::with_capacity(size * degree / (degree - 1)),
            size,
            lookup: HashMap::new(),
        };

        let mut layer: Vec<usize> = leaves.iter().map(|leaf| tree.push(*leaf, vec![])).collect();
        while layer.len() > 1 {
            layer = layer
                .chunks(degree)
                .map(|children| {
                    let hashes: Vec<Hash> = children.iter().map(|&c| tree.nodes[c].hash).collect();
                    let parent = tree.push(hash_concat(hash_fn, &hashes), children.to_vec());
                    for &c in children {
                        tree.nodes[c].parent = Some(parent);
                    }
                    parent
                })
                .collect();
        }

        Ok(tree)
    }

    fn push(&mut self, hash: Hash, children: Vec<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            hash,
            parent: None,
            children,
        });
        self.lookup.entry(hash).or_insert(index);
        index
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of leaves.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of levels below the root.
    pub fn height(&self) -> usize {
        log_floor(self.size, self.degree)
    }

    pub fn root(&self) -> &Node {
        // Construction guarantees at least one node.
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn root_hash(&self) -> Hash {
        self.root().hash
    }

    pub fn leaf(&self, index: usize) -> Option<Hash> {
        (index < self.size).then(|| self.nodes[index].hash)
    }

    pub fn node_by_hash(&self, hash: &Hash) -> Option<&Node> {
        self.lookup.get(hash).map(|&i| &self.nodes[i])
    }

    pub fn children_hashes(&self, node: &Node) -> Vec<Hash> {
        node.children.iter().map(|&c| self.nodes[c].hash).collect()
    }

    /// Sibling hashes for each level from the leaf up to (excluding) the root.
    /// Each step holds `degree - 1` hashes, in order, with the path node removed.
    pub fn generate_proof(&self, index: usize) -> Result<Vec<Vec<Hash>>, MerkleError> {
        if index >= self.size {
            return Err(MerkleError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }

        let mut proof = Vec::with_capacity(self.height());
        let mut current = index;
        let mut position = index;
        while let Some(parent) = self.nodes[current].parent {
            let pos = position % self.degree;
            let siblings = self.nodes[parent]
                .children
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != pos)
                .map(|(_, &c)| self.nodes[c].hash)
                .collect();
            proof.push(siblings);
            current = parent;
            position /= self.degree;
        }
        Ok(proof)
    }

    /// The leftmost node `depth` levels below the root.
    pub fn root_at_depth(&self, depth: usize) -> Result<&Node, MerkleError> {
        let mut node = self.root();
        for _ in 0..depth {
            let first = node.children.first().ok_or(MerkleError::DepthTooBig {
                depth,
                height: self.height(),
            })?;
            node = &self.nodes[*first];
        }
        Ok(node)
    }
}

/// Stateless verifier for proofs produced by [`MerkleTree::generate_proof`].
#[derive(Clone, Copy, Debug)]
pub struct MerkleVerify {
    hash_fn: HashFn,
    degree: usize,
}

impl MerkleVerify {
    pub fn new(hash_fn: HashFn, degree: usize) -> Self {
        Self { hash_fn, degree }
    }

    pub fn verify(&self, leaf: &Hash, index: usize, root: &Hash, proof: &[Vec<Hash>]) -> bool {
        if self.degree < 2 {
            return false;
        }
        let mut value = *leaf;
        let mut position = index;
        for siblings in proof {
            if siblings.len() != self.degree - 1 {
                return false;
            }
            let pos = position % self.degree;
            let mut children = siblings.clone();
            children.insert(pos, value);
            value = hash_concat(self.hash_fn, &children);
            position /= self.degree;
        }
        // Anything left over addresses a leaf past the end of the tree.
        position == 0 && value == *root
    }
}
