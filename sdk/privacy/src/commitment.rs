//! Note Commitments
//!
//! Implements Poseidon-based commitments for notes.
//!
//! ```text
//! digest     = Poseidon("NTD" || owner_lo || owner_hi || memo_lo || memo_hi || randomness)
//! Commitment = Poseidon("CMT" || cv_lo || cv_hi || digest)
//! ```
//!
//! `cv` is the note's value commitment, derived from its value and
//! randomness, so anyone holding an output's `cv` and digest can check it
//! against the published note commitment without learning the value.

use ark_bls12_381::Fr;
use serde::{Deserialize, Serialize};

use crate::poseidon;

const COMMITMENT_DOMAIN: u64 = 0x434d54; // "CMT"
const DIGEST_DOMAIN: u64 = 0x4e5444; // "NTD"

/// A note commitment (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "hex::serde")] pub [u8; 32]);

impl Commitment {
    /// Create commitment from field element
    pub fn from_field(f: Fr) -> Self {
        Self(poseidon::field_to_bytes(f))
    }

    /// Convert to field element
    pub fn to_field(&self) -> Fr {
        poseidon::bytes_to_field(&self.0)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash the parts of a note that stay private: owner, memo and randomness.
    pub fn note_digest(owner: &[u8; 32], memo: &[u8; 32], randomness: &[u8; 32]) -> [u8; 32] {
        let [owner_lo, owner_hi] = poseidon::limbs(owner);
        let [memo_lo, memo_hi] = poseidon::limbs(memo);

        let result = poseidon::hash(
            DIGEST_DOMAIN,
            &[
                owner_lo,
                owner_hi,
                memo_lo,
                memo_hi,
                poseidon::bytes_to_field(randomness),
            ],
        );
        poseidon::field_to_bytes(result)
    }

    /// Commit to a note through its value commitment and digest.
    ///
    /// # Arguments
    /// * `value_commitment` - Encoded Pedersen commitment to the note value
    /// * `digest` - Output of [`Commitment::note_digest`]
    pub fn commit(value_commitment: &[u8; 32], digest: &[u8; 32]) -> Self {
        let [cv_lo, cv_hi] = poseidon::limbs(value_commitment);

        let result = poseidon::hash(
            COMMITMENT_DOMAIN,
            &[cv_lo, cv_hi, poseidon::bytes_to_field(digest)],
        );
        Commitment::from_field(result)
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueCommitment;

    fn commit(value: u64, memo: [u8; 32], randomness: [u8; 32]) -> Commitment {
        let cv = ValueCommitment::derive(value, &randomness).to_bytes();
        Commitment::commit(&cv, &Commitment::note_digest(&[1u8; 32], &memo, &randomness))
    }

    #[test]
    fn test_commitment_deterministic() {
        let c1 = commit(1000, [0u8; 32], [42u8; 32]);
        let c2 = commit(1000, [0u8; 32], [42u8; 32]);

        assert_eq!(c1, c2, "same inputs should produce same commitment");
    }

    #[test]
    fn test_commitment_hiding() {
        let c1 = commit(1000, [0u8; 32], [1u8; 32]);
        let c2 = commit(1000, [0u8; 32], [2u8; 32]);

        assert_ne!(
            c1, c2,
            "different randomness should produce different commitments"
        );
    }

    #[test]
    fn test_commitment_binding() {
        let c1 = commit(1000, [0u8; 32], [42u8; 32]);
        let c2 = commit(2000, [0u8; 32], [42u8; 32]);
        let c3 = commit(1000, [9u8; 32], [42u8; 32]);

        assert_ne!(c1, c2, "different values should produce different commitments");
        assert_ne!(c1, c3, "memo is bound into the commitment");
    }

    #[test]
    fn test_commitment_binds_value_commitment() {
        let digest = Commitment::note_digest(&[1u8; 32], &[0u8; 32], &[42u8; 32]);
        let honest = ValueCommitment::derive(1000, &[42u8; 32]).to_bytes();
        let other = ValueCommitment::new(1000, &mut rand::thread_rng()).to_bytes();

        assert_ne!(
            Commitment::commit(&honest, &digest),
            Commitment::commit(&other, &digest)
        );
    }
}
