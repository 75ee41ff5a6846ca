//! BLAKE3 Merkle accumulator with raw-leaf proof sets
//!
//! Leaves are arbitrary byte strings and are hashed with a `0x00` domain tag;
//! inner nodes combine two children under a `0x01` tag. A proof for index `i`
//! is a *proof set*: the raw leaf bytes followed by the sibling hashes from
//! the leaf level up to (excluding) the root. Carrying the raw leaf lets a
//! verifier authenticate a sibling leaf by swapping the first two entries of
//! a neighbouring proof set, which the FRI query phase relies on.
//!
//! Trees here always have a power-of-two number of leaves (evaluation
//! vectors of radix-2 domains), which keeps the layout a perfect binary tree.

#![forbid(unsafe_code)]

use blake3::Hasher;

/// Output size of the tree hash, in bytes.
pub const HASH_SIZE: usize = 32;

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;

/// Hash of a leaf's raw bytes.
pub fn leaf_sum(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut h = Hasher::new();
    h.update(&[LEAF_TAG]);
    h.update(data);
    *h.finalize().as_bytes()
}

/// Hash of an inner node from its two children.
fn node_sum(left: &[u8; HASH_SIZE], right: &[u8; HASH_SIZE]) -> [u8; HASH_SIZE] {
    let mut h = Hasher::new();
    h.update(&[NODE_TAG]);
    h.update(left);
    h.update(right);
    *h.finalize().as_bytes()
}

/// A fully materialized Merkle tree over raw byte leaves.
pub struct MerkleTree {
    leaves: Vec<Vec<u8>>,
    // levels[0] holds the leaf hashes, the last level holds the root alone.
    levels: Vec<Vec<[u8; HASH_SIZE]>>,
}

impl MerkleTree {
    /// Build a tree over `leaves`. The leaf count must be a power of two.
    pub fn new(leaves: Vec<Vec<u8>>) -> Self {
        assert!(
            !leaves.is_empty() && leaves.len().is_power_of_two(),
            "leaf count must be a nonzero power of two"
        );
        let mut levels = Vec::with_capacity(leaves.len().trailing_zeros() as usize + 1);
        levels.push(leaves.iter().map(|l| leaf_sum(l)).collect::<Vec<_>>());
        while levels.last().expect("at least one level").len() > 1 {
            let prev = levels.last().expect("at least one level");
            let next = prev
                .chunks(2)
                .map(|pair| node_sum(&pair[0], &pair[1]))
                .collect();
            levels.push(next);
        }
        Self { leaves, levels }
    }

    /// Number of leaves.
    #[inline]
    pub fn nb_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Root hash.
    #[inline]
    pub fn root(&self) -> [u8; HASH_SIZE] {
        self.levels.last().expect("at least one level")[0]
    }

    /// Leaf hash at `index` (the value a sibling proof set carries).
    #[inline]
    pub fn leaf_hash(&self, index: usize) -> [u8; HASH_SIZE] {
        self.levels[0][index]
    }

    /// Proof set for the leaf at `index`: raw leaf bytes, then the sibling
    /// hash at each level from the bottom up.
    pub fn prove(&self, index: usize) -> Vec<Vec<u8>> {
        assert!(index < self.leaves.len());
        let mut proof_set = Vec::with_capacity(self.levels.len());
        proof_set.push(self.leaves[index].clone());
        let mut i = index;
        for level in &self.levels[..self.levels.len() - 1] {
            proof_set.push(level[i ^ 1].to_vec());
            i >>= 1;
        }
        proof_set
    }
}

/// Verify a proof set against `root` for the leaf at `index` in a tree with
/// `nb_leaves` leaves. Returns `false` on any shape or hash mismatch.
pub fn verify_proof(root: &[u8], proof_set: &[Vec<u8>], index: u64, nb_leaves: u64) -> bool {
    if nb_leaves == 0 || !nb_leaves.is_power_of_two() || index >= nb_leaves {
        return false;
    }
    let height = nb_leaves.trailing_zeros() as usize;
    if proof_set.len() != height + 1 {
        return false;
    }
    let mut acc = leaf_sum(&proof_set[0]);
    let mut i = index;
    for sibling in &proof_set[1..] {
        let sib: [u8; HASH_SIZE] = match sibling.as_slice().try_into() {
            Ok(s) => s,
            Err(_) => return false,
        };
        acc = if i & 1 == 0 {
            node_sum(&acc, &sib)
        } else {
            node_sum(&sib, &acc)
        };
        i >>= 1;
    }
    acc == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i as u8; 7]).collect()
    }

    #[test]
    fn prove_and_verify_all_indices() {
        let tree = MerkleTree::new(sample_leaves(16));
        let root = tree.root();
        for i in 0..16 {
            let proof_set = tree.prove(i);
            assert_eq!(proof_set.len(), 5);
            assert!(verify_proof(&root, &proof_set, i as u64, 16));
        }
    }

    #[test]
    fn tampering_breaks_verification() {
        let tree = MerkleTree::new(sample_leaves(8));
        let root = tree.root();
        let mut proof_set = tree.prove(3);
        proof_set[0][0] ^= 1;
        assert!(!verify_proof(&root, &proof_set, 3, 8));

        let proof_set = tree.prove(3);
        assert!(!verify_proof(&root, &proof_set, 2, 8)); // wrong index
        assert!(!verify_proof(&root, &proof_set[..4], 3, 8)); // truncated
    }

    #[test]
    fn sibling_proof_by_prefix_swap() {
        // A proof for leaf 2i+1 can be rebuilt from the proof for 2i by
        // replacing the first two entries with (sibling leaf, leaf hash).
        let leaves = sample_leaves(8);
        let tree = MerkleTree::new(leaves.clone());
        let root = tree.root();
        let full = tree.prove(4);
        let mut sibling_set = full.clone();
        sibling_set[0] = leaves[5].clone();
        sibling_set[1] = tree.leaf_hash(4).to_vec();
        assert!(verify_proof(&root, &sibling_set, 5, 8));
    }
}
