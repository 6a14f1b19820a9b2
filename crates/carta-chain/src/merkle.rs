//! Binary hash tree with inclusion proofs.
//!
//! The tree is built bottom-up over SHA-256 leaf hashes. With an odd number
//! of nodes at a level, the last node is combined with itself rather than
//! carried up, so every leaf contributes to the root at every level and
//! proof generation stays uniform.
//!
//! ```text
//!             root
//!            /    \
//!          h01    h22        h22 = combine(h2, h2)
//!         /   \   /  \
//!        h0   h1 h2  (h2)
//! ```

use sha2::{Digest, Sha256};

use crate::error::{ChainError, ChainResult};

// ============================================================================
// Constants
// ============================================================================

/// Length of a tree hash in bytes (SHA-256).
pub const HASH_LENGTH: usize = 32;

// ============================================================================
// TreeHash
// ============================================================================

/// A 32-byte SHA-256 node hash.
///
/// SHA-256 is used so version roots land on the same compliance path as
/// content hashes and ledger anchors.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TreeHash([u8; HASH_LENGTH]);

impl TreeHash {
    /// Returns the hash as a byte array reference.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Renders the hash as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; HASH_LENGTH]> for TreeHash {
    fn from(value: [u8; HASH_LENGTH]) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for TreeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TreeHash({:016x}...)",
            u64::from_le_bytes(self.0[..8].try_into().unwrap())
        )
    }
}

// ============================================================================
// Hash Rules
// ============================================================================

/// Hashes a leaf value.
pub fn leaf_hash(value: &str) -> TreeHash {
    let digest: [u8; HASH_LENGTH] = Sha256::digest(value.as_bytes()).into();
    TreeHash(digest)
}

/// The node-combination rule: SHA-256 over the left hash followed by the
/// right hash.
///
/// An unpaired node at the end of a level is combined with itself
/// (`combine(h, h)`), never dropped.
pub fn combine(left: &TreeHash, right: &TreeHash) -> TreeHash {
    let mut hasher = Sha256::new();
    hasher.update(left.0);
    hasher.update(right.0);
    let digest: [u8; HASH_LENGTH] = hasher.finalize().into();
    TreeHash(digest)
}

// ============================================================================
// InclusionProof
// ============================================================================

/// Which side a sibling hash sits on when recomputing toward the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One step of an inclusion proof: the sibling hash and its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep {
    pub hash: TreeHash,
    pub side: Side,
}

/// An ordered inclusion proof from leaf to root.
pub type InclusionProof = Vec<ProofStep>;

/// Verifies an inclusion proof by folding the leaf hash with each step in
/// order and comparing the result against `expected_root`.
///
/// Returns `false` for a corrupted proof, a foreign leaf, or an empty proof
/// over a multi-leaf tree.
pub fn verify_proof(leaf_value: &str, proof: &InclusionProof, expected_root: TreeHash) -> bool {
    let mut current = leaf_hash(leaf_value);

    for step in proof {
        current = match step.side {
            Side::Left => combine(&step.hash, &current),
            Side::Right => combine(&current, &step.hash),
        };
    }

    current == expected_root
}

// ============================================================================
// MerkleTree
// ============================================================================

/// A balanced binary hash tree over a sequence of leaf values.
///
/// Levels are stored bottom-up: `levels[0]` holds the leaf hashes and the
/// last level holds the single root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    leaves: Vec<String>,
    levels: Vec<Vec<TreeHash>>,
}

impl MerkleTree {
    /// Builds a tree bottom-up from leaf values.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::EmptyInput`] for zero leaves.
    pub fn build(leaf_data: &[String]) -> ChainResult<Self> {
        if leaf_data.is_empty() {
            return Err(ChainError::EmptyInput);
        }

        let mut levels: Vec<Vec<TreeHash>> =
            vec![leaf_data.iter().map(|leaf| leaf_hash(leaf)).collect()];

        while levels.last().expect("at least the leaf level").len() > 1 {
            let below = levels.last().expect("at least the leaf level");
            let mut above = Vec::with_capacity(below.len().div_ceil(2));

            for pair in below.chunks(2) {
                let parent = match pair {
                    [left, right] => combine(left, right),
                    // Odd node count: the unpaired node pairs with itself.
                    [last] => combine(last, last),
                    _ => unreachable!("chunks(2) yields one- or two-element slices"),
                };
                above.push(parent);
            }

            levels.push(above);
        }

        Ok(Self {
            leaves: leaf_data.to_vec(),
            levels,
        })
    }

    /// The root hash summarizing all leaves.
    pub fn root(&self) -> TreeHash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .expect("a built tree always has a root")
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Total number of nodes across all levels.
    pub fn node_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Number of edges from root to leaf level.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Generates an inclusion proof for `leaf_value`.
    ///
    /// Returns an empty proof if the leaf is not in the tree; for any tree
    /// with more than one leaf, [`verify_proof`] rejects an empty proof.
    pub fn generate_proof(&self, leaf_value: &str) -> InclusionProof {
        let Some(mut index) = self.leaves.iter().position(|leaf| leaf == leaf_value) else {
            return Vec::new();
        };

        let mut proof = Vec::with_capacity(self.depth());

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
            // An unpaired node's sibling is itself.
            let sibling = *level.get(sibling_index).unwrap_or(&level[index]);

            let side = if index % 2 == 0 { Side::Right } else { Side::Left };
            proof.push(ProofStep { hash: sibling, side });

            index /= 2;
        }

        proof
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_input_is_rejected() {
        let result = MerkleTree::build(&[]);

        assert_eq!(result.unwrap_err(), ChainError::EmptyInput);
    }

    #[test]
    fn single_leaf_root_is_leaf_hash() {
        let tree = MerkleTree::build(&leaves(&["only"])).unwrap();

        assert_eq!(tree.root(), leaf_hash("only"));
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn build_is_deterministic() {
        let data = leaves(&["a", "b", "c", "d"]);

        let tree1 = MerkleTree::build(&data).unwrap();
        let tree2 = MerkleTree::build(&data).unwrap();

        assert_eq!(tree1.root(), tree2.root());
    }

    #[test]
    fn any_leaf_change_changes_root() {
        let base = MerkleTree::build(&leaves(&["a", "b", "c", "d"])).unwrap();

        for i in 0..4 {
            let mut mutated = leaves(&["a", "b", "c", "d"]);
            mutated[i] = format!("{}-mutated", mutated[i]);
            let tree = MerkleTree::build(&mutated).unwrap();

            assert_ne!(tree.root(), base.root(), "mutating leaf {i} kept the root");
        }
    }

    #[test]
    fn leaf_order_matters() {
        let ab = MerkleTree::build(&leaves(&["a", "b"])).unwrap();
        let ba = MerkleTree::build(&leaves(&["b", "a"])).unwrap();

        assert_ne!(ab.root(), ba.root());
    }

    #[test]
    fn two_leaf_root_matches_combine() {
        let tree = MerkleTree::build(&leaves(&["left", "right"])).unwrap();

        let expected = combine(&leaf_hash("left"), &leaf_hash("right"));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn odd_leaf_duplicates_last() {
        let tree = MerkleTree::build(&leaves(&["a", "b", "c"])).unwrap();

        let h_ab = combine(&leaf_hash("a"), &leaf_hash("b"));
        let h_cc = combine(&leaf_hash("c"), &leaf_hash("c"));
        assert_eq!(tree.root(), combine(&h_ab, &h_cc));
    }

    #[test]
    fn every_leaf_has_a_verifying_proof() {
        // Odd and even counts, including the unpaired last leaf
        for values in [
            leaves(&["a"]),
            leaves(&["a", "b"]),
            leaves(&["a", "b", "c"]),
            leaves(&["a", "b", "c", "d", "e"]),
            leaves(&["a", "b", "c", "d", "e", "f", "g", "h"]),
        ] {
            let tree = MerkleTree::build(&values).unwrap();

            for leaf in &values {
                let proof = tree.generate_proof(leaf);
                assert!(
                    verify_proof(leaf, &proof, tree.root()),
                    "no verifying proof for leaf {leaf:?} in {} leaves",
                    values.len()
                );
            }
        }
    }

    #[test]
    fn absent_leaf_yields_empty_non_verifying_proof() {
        let tree = MerkleTree::build(&leaves(&["a", "b", "c"])).unwrap();

        let proof = tree.generate_proof("zz");

        assert!(proof.is_empty());
        assert!(!verify_proof("zz", &proof, tree.root()));
    }

    #[test]
    fn corrupted_proof_fails_verification() {
        let tree = MerkleTree::build(&leaves(&["a", "b", "c", "d"])).unwrap();
        let mut proof = tree.generate_proof("b");

        proof[0].hash = leaf_hash("corrupted");

        assert!(!verify_proof("b", &proof, tree.root()));
    }

    #[test]
    fn flipped_proof_side_fails_verification() {
        let tree = MerkleTree::build(&leaves(&["a", "b", "c", "d"])).unwrap();
        let mut proof = tree.generate_proof("a");

        proof[0].side = match proof[0].side {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        };

        assert!(!verify_proof("a", &proof, tree.root()));
    }

    #[test]
    fn structural_queries() {
        let tree = MerkleTree::build(&leaves(&["a", "b", "c", "d", "e"])).unwrap();

        // Levels: 5 -> 3 -> 2 -> 1
        assert_eq!(tree.leaf_count(), 5);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.node_count(), 5 + 3 + 2 + 1);
    }

    #[test]
    fn combine_is_order_sensitive() {
        let a = leaf_hash("a");
        let b = leaf_hash("b");

        assert_ne!(combine(&a, &b), combine(&b, &a));
    }
}
