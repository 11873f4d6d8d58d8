//! Merkle Tree for Note Commitments
//!
//! The ledger owns the real note-commitment tree. This module provides the
//! hashing rules, the witness interface a transaction builder consumes, and
//! an in-memory [`NoteTree`] that produces witnesses.
//!
//! ```text
//!                    Root                     depth 31
//!                   /    \
//!                 H01    H23                  depth 1
//!                /  \   /   \
//!               H0  H1 H2   H3                depth 0
//!               |   |   |    |
//!              C0  C1  C2   C3  (Note Commitments)
//! ```
//!
//! A parent at depth `d` is `combine_hash(d, left, right)`, so identical
//! children hash differently at different heights.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use ark_bls12_381::Fr;
use serde::{Deserialize, Serialize};

use crate::commitment::Commitment;
use crate::error::{PrivacyError, Result};
use crate::poseidon;

/// Tree depth (supports 2^32 notes)
pub const TREE_DEPTH: usize = 32;

const MERKLE_DOMAIN: u64 = 0x4d524b4c; // "MRKL"
const EMPTY_LEAF_DOMAIN: u64 = 0x454d5054; // "EMPT"

/// A node hash in the note-commitment tree (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MerkleNoteHash(#[serde(with = "hex::serde")] pub [u8; 32]);

impl MerkleNoteHash {
    pub fn from_field(f: Fr) -> Self {
        Self(poseidon::field_to_bytes(f))
    }

    pub fn to_field(&self) -> Fr {
        poseidon::bytes_to_field(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<Commitment> for MerkleNoteHash {
    fn from(commitment: Commitment) -> Self {
        Self(commitment.0)
    }
}

impl fmt::Debug for MerkleNoteHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MerkleNoteHash")
            .field(&hex::encode(self.0))
            .finish()
    }
}

/// Hash two children at `depth` into their parent. Total over all inputs.
pub fn combine_hash(depth: usize, left: &MerkleNoteHash, right: &MerkleNoteHash) -> MerkleNoteHash {
    MerkleNoteHash::from_field(poseidon::hash(
        MERKLE_DOMAIN,
        &[Fr::from(depth as u64), left.to_field(), right.to_field()],
    ))
}

static EMPTY_HASHES: LazyLock<Vec<MerkleNoteHash>> = LazyLock::new(|| {
    let mut hashes = Vec::with_capacity(TREE_DEPTH + 1);
    let mut current = MerkleNoteHash::from_field(poseidon::hash(EMPTY_LEAF_DOMAIN, &[Fr::from(0u64)]));
    hashes.push(current);
    for depth in 0..TREE_DEPTH {
        current = combine_hash(depth, &current, &current);
        hashes.push(current);
    }
    hashes
});

/// Root of an empty subtree of height `level` (0 = an empty leaf)
pub(crate) fn empty_hash(level: usize) -> MerkleNoteHash {
    EMPTY_HASHES[level]
}

/// Side the running hash occupies at one level of an authentication path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WitnessSide {
    /// Running hash is the left child; the sibling is on the right
    Left,
    /// Running hash is the right child; the sibling is on the left
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessNode {
    pub side: WitnessSide,
    pub sibling: MerkleNoteHash,
}

/// Recompute the root reached by walking `path` up from `leaf`.
pub fn root_from_path(leaf: &MerkleNoteHash, path: &[WitnessNode]) -> MerkleNoteHash {
    path.iter()
        .enumerate()
        .fold(*leaf, |current, (depth, node)| match node.side {
            WitnessSide::Left => combine_hash(depth, &current, &node.sibling),
            WitnessSide::Right => combine_hash(depth, &node.sibling, &current),
        })
}

/// Proof that a leaf is included in the tree at some historical size.
///
/// Implemented by whatever tracks the tree (a ledger, a wallet cache, a test
/// double). The builder only reads these three values.
pub trait MerkleWitness {
    /// Sibling hashes from leaf to root
    fn authentication_path(&self) -> &[WitnessNode];

    /// Number of leaves when the witness was taken
    fn tree_size(&self) -> u32;

    /// Root of the tree at `tree_size`
    fn root_hash(&self) -> MerkleNoteHash;

    /// Check that `leaf` hashes up to [`Self::root_hash`]
    fn verify(&self, leaf: &MerkleNoteHash) -> bool {
        root_from_path(leaf, self.authentication_path()) == self.root_hash()
    }

    /// Leaf index encoded by the path sides
    fn position(&self) -> u64 {
        self.authentication_path()
            .iter()
            .enumerate()
            .filter(|(_, node)| node.side == WitnessSide::Right)
            .fold(0u64, |acc, (depth, _)| acc | (1u64 << depth))
    }
}

/// Owned snapshot of a witness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    path: Vec<WitnessNode>,
    tree_size: u32,
    root_hash: MerkleNoteHash,
}

impl Witness {
    pub fn new(path: Vec<WitnessNode>, tree_size: u32, root_hash: MerkleNoteHash) -> Self {
        Self {
            path,
            tree_size,
            root_hash,
        }
    }

    /// Copy the three witness values out of any implementation
    pub fn snapshot<W: MerkleWitness + ?Sized>(witness: &W) -> Self {
        Self::new(
            witness.authentication_path().to_vec(),
            witness.tree_size(),
            witness.root_hash(),
        )
    }

    /// Structural checks: full-depth path, non-empty tree, and a leaf
    /// position below the tree size.
    pub fn check_shape(&self) -> Result<()> {
        if self.path.len() != TREE_DEPTH {
            return Err(PrivacyError::InvalidWitness(format!(
                "authentication path has {} nodes, expected {TREE_DEPTH}",
                self.path.len()
            )));
        }
        if self.tree_size == 0 {
            return Err(PrivacyError::InvalidWitness("tree size is zero".into()));
        }
        let position = self.position();
        if position >= u64::from(self.tree_size) {
            return Err(PrivacyError::InvalidWitness(format!(
                "leaf position {position} is not below tree size {}",
                self.tree_size
            )));
        }
        Ok(())
    }
}

impl MerkleWitness for Witness {
    fn authentication_path(&self) -> &[WitnessNode] {
        &self.path
    }

    fn tree_size(&self) -> u32 {
        self.tree_size
    }

    fn root_hash(&self) -> MerkleNoteHash {
        self.root_hash
    }
}

/// Append-only in-memory note tree
///
/// Uses lazy evaluation - only stores non-empty nodes.
#[derive(Debug, Clone)]
pub struct NoteTree {
    /// Non-empty nodes: (level, index) -> hash
    nodes: HashMap<(usize, u64), MerkleNoteHash>,
    size: u32,
    root: MerkleNoteHash,
}

impl NoteTree {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            size: 0,
            root: empty_hash(TREE_DEPTH),
        }
    }

    pub fn root(&self) -> MerkleNoteHash {
        self.root
    }

    /// Number of leaves
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Append a leaf and return its position
    pub fn add(&mut self, leaf: MerkleNoteHash) -> Result<u64> {
        let next = self
            .size
            .checked_add(1)
            .ok_or_else(|| PrivacyError::InvalidWitness("note tree is full".into()))?;

        let position = u64::from(self.size);
        self.nodes.insert((0, position), leaf);

        // Update path to root
        let mut index = position;
        let mut current = leaf;
        for level in 0..TREE_DEPTH {
            let is_right = index & 1 == 1;
            let sibling = self.node(level, index ^ 1);

            current = if is_right {
                combine_hash(level, &sibling, &current)
            } else {
                combine_hash(level, &current, &sibling)
            };
            index /= 2;
            self.nodes.insert((level + 1, index), current);
        }

        self.root = current;
        self.size = next;
        Ok(position)
    }

    /// Witness for the leaf at `position` against the current root
    pub fn witness(&self, position: u64) -> Option<Witness> {
        if position >= u64::from(self.size) {
            return None;
        }

        let mut path = Vec::with_capacity(TREE_DEPTH);
        let mut index = position;
        for level in 0..TREE_DEPTH {
            let side = if index & 1 == 1 {
                WitnessSide::Right
            } else {
                WitnessSide::Left
            };
            path.push(WitnessNode {
                side,
                sibling: self.node(level, index ^ 1),
            });
            index /= 2;
        }

        Some(Witness::new(path, self.size, self.root))
    }

    /// Leaf at `position`
    pub fn get(&self, position: u64) -> Option<MerkleNoteHash> {
        self.nodes.get(&(0, position)).copied()
    }

    fn node(&self, level: usize, index: u64) -> MerkleNoteHash {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or_else(|| empty_hash(level))
    }
}

impl Default for NoteTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(b: u8) -> MerkleNoteHash {
        MerkleNoteHash([b; 32])
    }

    #[test]
    fn test_empty_tree() {
        let tree = NoteTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), empty_hash(TREE_DEPTH));
    }

    #[test]
    fn test_combine_hash_depends_on_depth() {
        let (l, r) = (leaf(1), leaf(2));
        assert_ne!(combine_hash(0, &l, &r), combine_hash(1, &l, &r));
        assert_ne!(combine_hash(0, &l, &r), combine_hash(0, &r, &l));
        assert_eq!(combine_hash(5, &l, &r), combine_hash(5, &l, &r));
    }

    #[test]
    fn test_insert_and_witness() {
        let mut tree = NoteTree::new();

        assert_eq!(tree.add(leaf(1)).unwrap(), 0);
        assert_eq!(tree.add(leaf(2)).unwrap(), 1);
        assert_eq!(tree.add(leaf(3)).unwrap(), 2);

        for (position, b) in [(0u64, 1u8), (1, 2), (2, 3)] {
            let witness = tree.witness(position).unwrap();
            assert_eq!(witness.position(), position);
            assert_eq!(witness.tree_size(), 3);
            assert_eq!(witness.authentication_path().len(), TREE_DEPTH);
            assert!(witness.verify(&leaf(b)));
            witness.check_shape().unwrap();
        }

        assert!(tree.witness(3).is_none());
    }

    #[test]
    fn test_witness_rejects_wrong_leaf() {
        let mut tree = NoteTree::new();
        tree.add(leaf(1)).unwrap();

        let witness = tree.witness(0).unwrap();
        assert!(!witness.verify(&leaf(99)));
    }

    #[test]
    fn test_old_witness_keeps_old_root() {
        let mut tree = NoteTree::new();
        tree.add(leaf(1)).unwrap();
        let witness = tree.witness(0).unwrap();
        let root1 = tree.root();

        tree.add(leaf(2)).unwrap();
        assert_ne!(tree.root(), root1, "root should change after each insert");
        assert_eq!(witness.root_hash(), root1);
        assert!(witness.verify(&leaf(1)));
    }

    #[test]
    fn test_check_shape() {
        let mut tree = NoteTree::new();
        tree.add(leaf(1)).unwrap();
        let good = tree.witness(0).unwrap();

        let short = Witness::new(good.authentication_path()[1..].to_vec(), 1, good.root_hash());
        assert!(matches!(short.check_shape(), Err(PrivacyError::InvalidWitness(_))));

        let empty = Witness::new(good.authentication_path().to_vec(), 0, good.root_hash());
        assert!(matches!(empty.check_shape(), Err(PrivacyError::InvalidWitness(_))));

        let mut path = good.authentication_path().to_vec();
        path[0].side = WitnessSide::Right;
        let beyond = Witness::new(path, 1, good.root_hash());
        assert!(matches!(beyond.check_shape(), Err(PrivacyError::InvalidWitness(_))));
    }

    #[test]
    fn test_snapshot_copies_values() {
        let mut tree = NoteTree::new();
        tree.add(leaf(7)).unwrap();
        let witness = tree.witness(0).unwrap();
        assert_eq!(Witness::snapshot(&witness), witness);
    }
}
