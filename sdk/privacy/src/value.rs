//! Value Commitments
//!
//! Homomorphic Pedersen commitments to note values on the Jubjub curve.
//!
//! ```text
//! cv = value * G_v + rcv * G_r
//!
//! Σ cv_spends - Σ cv_outputs - fee * G_v = (Σ rcv_spends - Σ rcv_outputs) * G_r
//!                                        = bsk * G_r
//! ```
//!
//! The right-hand side only holds when values balance, so a signature under
//! `bsk` (the binding signature) proves value conservation without revealing
//! any individual value.

use std::sync::LazyLock;

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bls12_381::{EdwardsAffine, EdwardsProjective, Fr};
use ark_ff::{PrimeField, UniformRand};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, RngCore};

/// Scalar field of the Jubjub curve.
pub type Scalar = Fr;

/// Size of a compressed point or a scalar.
pub const ENCODED_SIZE: usize = 32;

const NOTE_RANDOMNESS_CONTEXT: &str = "shroud 2024 note value commitment randomness v1";

static VALUE_GENERATOR: LazyLock<EdwardsAffine> =
    LazyLock::new(|| group_hash(b"shroud/value-commitment-generator/v1"));

/// Generator multiplied by the committed value.
pub fn value_generator() -> EdwardsAffine {
    *VALUE_GENERATOR
}

/// Generator multiplied by commitment randomness; also the base of every
/// Schnorr key in the crate.
pub fn randomness_generator() -> EdwardsAffine {
    EdwardsAffine::generator()
}

/// Hash into the prime-order subgroup: try successive candidate encodings
/// until one decompresses, then clear the cofactor.
fn group_hash(personal: &[u8]) -> EdwardsAffine {
    let mut counter = 0u32;
    loop {
        let mut hasher = blake3::Hasher::new();
        hasher.update(personal);
        hasher.update(&counter.to_le_bytes());
        let candidate = hasher.finalize();

        if let Ok(point) = EdwardsAffine::deserialize_compressed_unchecked(&candidate.as_bytes()[..])
        {
            let point = point.clear_cofactor();
            if !point.is_zero() {
                return point;
            }
        }
        counter += 1;
    }
}

pub(crate) fn point_to_bytes(point: &EdwardsAffine) -> [u8; 32] {
    let mut bytes = [0u8; ENCODED_SIZE];
    point
        .serialize_compressed(&mut bytes[..])
        .expect("compressed jubjub point is 32 bytes");
    bytes
}

/// Decode a compressed point, rejecting off-curve and small-order encodings.
pub(crate) fn point_from_bytes(bytes: &[u8; 32]) -> Option<EdwardsAffine> {
    EdwardsAffine::deserialize_compressed(&bytes[..]).ok()
}

pub(crate) fn scalar_to_bytes(scalar: &Scalar) -> [u8; 32] {
    let mut bytes = [0u8; ENCODED_SIZE];
    scalar
        .serialize_compressed(&mut bytes[..])
        .expect("jubjub scalar is 32 bytes");
    bytes
}

/// Decode a canonical scalar encoding.
pub(crate) fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    Scalar::deserialize_compressed(&bytes[..]).ok()
}

/// Wide hash of `parts` reduced into the scalar field.
pub(crate) fn hash_to_scalar(context: &str, parts: &[&[u8]]) -> Scalar {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    hasher.finalize_xof().fill(&mut wide);
    Scalar::from_le_bytes_mod_order(&wide)
}

pub(crate) fn signed_scalar(value: i64) -> Scalar {
    let magnitude = Scalar::from(value.unsigned_abs());
    if value < 0 { -magnitude } else { magnitude }
}

/// Opening of a value commitment, kept by the builder until posting.
#[derive(Clone, Debug)]
pub struct ValueCommitment {
    value: u64,
    randomness: Scalar,
}

impl ValueCommitment {
    /// Commit to `value` with fresh randomness
    pub fn new<R: RngCore + CryptoRng>(value: u64, rng: &mut R) -> Self {
        Self {
            value,
            randomness: Scalar::rand(rng),
        }
    }

    /// Commit to `value` with randomness derived from a note's randomness.
    ///
    /// This is the commitment a note commitment binds, so an output's
    /// published `cv` can be checked against the note it encrypts.
    pub fn derive(value: u64, note_randomness: &[u8; 32]) -> Self {
        Self {
            value,
            randomness: hash_to_scalar(NOTE_RANDOMNESS_CONTEXT, &[note_randomness]),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn randomness(&self) -> Scalar {
        self.randomness
    }

    /// The commitment point `value * G_v + rcv * G_r`
    pub fn commitment(&self) -> EdwardsAffine {
        let point: EdwardsProjective = value_generator() * Scalar::from(self.value)
            + randomness_generator() * self.randomness;
        point.into_affine()
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        point_to_bytes(&self.commitment())
    }
}
