//! Nullifiers
//!
//! Implements nullifier derivation for double-spend prevention.
//!
//! ```text
//! Nullifier = PRF_nk(commitment || position)
//! ```
//!
//! Once a nullifier is published, the corresponding note cannot be spent again.
//! Keeping the nullifier set is the ledger's job; this module only derives them.

use ark_bls12_381::Fr;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::commitment::Commitment;
use crate::poseidon;

const NULLIFIER_DOMAIN: u64 = 0x4e554c4c; // "NULL"

/// A nullifier (32 bytes) - unique tag for a spent note
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nullifier(#[serde(with = "hex::serde")] pub [u8; 32]);

impl Nullifier {
    /// Create from field element
    pub fn from_field(f: Fr) -> Self {
        Self(poseidon::field_to_bytes(f))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Nullifier").field(&hex::encode(self.0)).finish()
    }
}

impl AsRef<[u8]> for Nullifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Nullifier derivation key.
///
/// Derived from the spending key; knowledge of it is required to compute
/// the nullifier of a note.
#[derive(Clone)]
pub struct NullifierKey {
    key: [u8; 32],
}

impl NullifierKey {
    /// Create from raw bytes
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive a nullifier for a note
    ///
    /// # Arguments
    /// * `commitment` - The note commitment
    /// * `position` - The note's position in the Merkle tree (prevents nullifier grinding)
    pub fn derive_nullifier(&self, commitment: &Commitment, position: u64) -> Nullifier {
        let [key_lo, key_hi] = poseidon::limbs(&self.key);
        let result = poseidon::hash(
            NULLIFIER_DOMAIN,
            &[key_lo, key_hi, commitment.to_field(), Fr::from(position)],
        );
        Nullifier::from_field(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullifier_deterministic() {
        let key = NullifierKey::from_bytes([1u8; 32]);
        let commitment = Commitment([2u8; 32]);
        let position = 100u64;

        let n1 = key.derive_nullifier(&commitment, position);
        let n2 = key.derive_nullifier(&commitment, position);

        assert_eq!(n1, n2, "same inputs should produce same nullifier");
    }

    #[test]
    fn test_nullifier_unique_per_note() {
        let key = NullifierKey::from_bytes([1u8; 32]);
        let c1 = Commitment([1u8; 32]);
        let c2 = Commitment([2u8; 32]);

        let n1 = key.derive_nullifier(&c1, 0);
        let n2 = key.derive_nullifier(&c2, 0);

        assert_ne!(n1, n2, "different notes should have different nullifiers");
    }

    #[test]
    fn test_nullifier_requires_key() {
        let key1 = NullifierKey::from_bytes([1u8; 32]);
        let key2 = NullifierKey::from_bytes([2u8; 32]);
        let commitment = Commitment([3u8; 32]);

        let n1 = key1.derive_nullifier(&commitment, 0);
        let n2 = key2.derive_nullifier(&commitment, 0);

        assert_ne!(n1, n2, "different keys should produce different nullifiers");
    }

    #[test]
    fn test_position_affects_nullifier() {
        let key = NullifierKey::from_bytes([1u8; 32]);
        let commitment = Commitment([2u8; 32]);

        let n1 = key.derive_nullifier(&commitment, 0);
        let n2 = key.derive_nullifier(&commitment, 1);

        assert_ne!(
            n1, n2,
            "different positions should produce different nullifiers"
        );
    }
}
