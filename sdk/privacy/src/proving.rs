//! Proving engine
//!
//! The transaction builder never does proof arithmetic itself. It hands each
//! spend and each output to a [`ProvingEngine`] and gets back an opaque proof
//! plus the public data the proof is bound to. A Groth16 backend plugs in
//! here; the crate ships [`ReferenceEngine`].
//!
//! ```text
//! Opening proof (96 bytes) for cv = v * G_v + rcv * G_r:
//!   T  = a * G_v + b * G_r                   (random a, b)
//!   c  = H(T || public data)
//!   z1 = a + c * v,   z2 = b + c * rcv
//!   proof = T || z1 || z2
//! verify: z1 * G_v + z2 * G_r == T + c * cv
//!
//! Output proof (128 bytes) = digest || opening proof
//! verify: Commitment(cv, digest) == note commitment, then the opening
//! ```

use std::fmt;

use ark_ec::CurveGroup;
use ark_ff::UniformRand;

use crate::commitment::Commitment;
use crate::error::{PrivacyError, Result};
use crate::keys::SpendingKey;
use crate::merkle::{MerkleNoteHash, MerkleWitness, Witness};
use crate::note::Note;
use crate::nullifier::Nullifier;
use crate::signature::{Signature, SigningKey, VerificationKey};
use crate::value::{
    Scalar, ValueCommitment, hash_to_scalar, point_from_bytes, point_to_bytes,
    randomness_generator, scalar_from_bytes, scalar_to_bytes, value_generator,
};

pub const PROOF_SIZE: usize = 96;
pub const OUTPUT_PROOF_SIZE: usize = 32 + PROOF_SIZE;

const PROOF_CONTEXT: &str = "shroud 2024 spend proof challenge v1";
const OUTPUT_PROOF_CONTEXT: &str = "shroud 2024 output proof challenge v1";

/// Private inputs of one spend
pub struct SpendCircuit<'a> {
    pub spending_key: &'a SpendingKey,
    pub note: &'a Note,
    pub witness: &'a Witness,
    pub value_commitment: &'a ValueCommitment,
    /// Randomizer applied to the authorizing key for this spend
    pub randomizer: Scalar,
}

/// Public data a spend proof is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendPublicData {
    pub value_commitment: [u8; 32],
    pub randomized_public_key: [u8; 32],
    pub root_hash: MerkleNoteHash,
    pub tree_size: u32,
    pub nullifier: Nullifier,
}

impl SpendPublicData {
    pub const SIZE: usize = 32 + 32 + 32 + 4 + 32;

    /// Wire order: `cv | rk | root | tree_size (u32 LE) | nullifier`
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..32].copy_from_slice(&self.value_commitment);
        out[32..64].copy_from_slice(&self.randomized_public_key);
        out[64..96].copy_from_slice(self.root_hash.as_bytes());
        out[96..100].copy_from_slice(&self.tree_size.to_le_bytes());
        out[100..].copy_from_slice(self.nullifier.as_bytes());
        out
    }
}

/// Opaque proof bytes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SpendProof(pub [u8; PROOF_SIZE]);

impl fmt::Debug for SpendProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SpendProof").field(&hex::encode(self.0)).finish()
    }
}

/// Private inputs of one output
pub struct OutputCircuit<'a> {
    pub note: &'a Note,
    pub value_commitment: &'a ValueCommitment,
}

/// Public data an output proof is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPublicData {
    pub value_commitment: [u8; 32],
    pub note_commitment: Commitment,
}

impl OutputPublicData {
    pub const SIZE: usize = 64;

    /// Wire order: `cv | note commitment`
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..32].copy_from_slice(&self.value_commitment);
        out[32..].copy_from_slice(self.note_commitment.as_bytes());
        out
    }
}

/// Output proof bytes: `note digest | opening proof`
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OutputProof(pub [u8; OUTPUT_PROOF_SIZE]);

impl OutputProof {
    pub fn note_digest(&self) -> [u8; 32] {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&self.0[..32]);
        digest
    }
}

impl fmt::Debug for OutputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OutputProof").field(&hex::encode(self.0)).finish()
    }
}

/// Spend and output proving and signing backend
pub trait ProvingEngine: Send + Sync {
    /// Prove one spend. Fails with `ProvingFailure` if the inputs are not a
    /// valid spend of the note.
    fn prove(&self, circuit: &SpendCircuit<'_>) -> Result<(SpendProof, SpendPublicData)>;

    /// Verify a proof against its public data
    fn verify(&self, proof: &SpendProof, public: &SpendPublicData) -> bool;

    /// Prove that an output's value commitment is the one its note
    /// commitment binds. Fails with `ProvingFailure` otherwise.
    fn prove_output(&self, circuit: &OutputCircuit<'_>) -> Result<(OutputProof, OutputPublicData)>;

    fn verify_output(&self, proof: &OutputProof, public: &OutputPublicData) -> bool;

    fn sign(&self, digest: &[u8], key: &SigningKey) -> Result<Signature>;

    fn verify_signature(&self, digest: &[u8], key: &VerificationKey, sig: &Signature) -> bool;
}

/// In-tree engine.
///
/// `prove` refuses a spend unless the key owns the note, the witness
/// authenticates its commitment and `cv` opens to its value. `verify` only
/// checks the proof of knowledge of the `cv` opening, bound to the public
/// data: it does not show the nullifier, root or `rk` were derived from a
/// note in the tree. That soundness needs a SNARK backend behind this trait.
///
/// Output proofs are fully checked by `verify_output`: the revealed digest
/// and the published `cv` must hash to the note commitment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEngine;

impl ReferenceEngine {
    /// Build an output proof for whatever `cv` the circuit carries. Callers
    /// check that it is the note's own value commitment first.
    pub(crate) fn output_proof_unchecked(
        circuit: &OutputCircuit<'_>,
    ) -> (OutputProof, OutputPublicData) {
        let public = OutputPublicData {
            value_commitment: circuit.value_commitment.to_bytes(),
            note_commitment: circuit.note.commitment(),
        };
        let digest = circuit.note.digest();
        let opening = prove_opening(
            OUTPUT_PROOF_CONTEXT,
            circuit.value_commitment,
            &[&public.to_bytes()[..], &digest[..]],
        );

        let mut proof = [0u8; OUTPUT_PROOF_SIZE];
        proof[..32].copy_from_slice(&digest);
        proof[32..].copy_from_slice(&opening);
        (OutputProof(proof), public)
    }
}

/// Schnorr-style proof of knowledge of `(v, rcv)` with `cv = v * G_v + rcv * G_r`
fn prove_opening(context: &str, cv: &ValueCommitment, bound: &[&[u8]]) -> [u8; PROOF_SIZE] {
    let mut rng = rand::thread_rng();
    let a = Scalar::rand(&mut rng);
    let b = Scalar::rand(&mut rng);
    let t = (value_generator() * a + randomness_generator() * b).into_affine();
    let t_bytes = point_to_bytes(&t);

    let c = challenge(context, &t_bytes, bound);
    let z1 = a + c * Scalar::from(cv.value());
    let z2 = b + c * cv.randomness();

    let mut proof = [0u8; PROOF_SIZE];
    proof[..32].copy_from_slice(&t_bytes);
    proof[32..64].copy_from_slice(&scalar_to_bytes(&z1));
    proof[64..].copy_from_slice(&scalar_to_bytes(&z2));
    proof
}

fn verify_opening(context: &str, proof: &[u8], cv: &[u8; 32], bound: &[&[u8]]) -> bool {
    if proof.len() != PROOF_SIZE {
        return false;
    }
    let mut t_bytes = [0u8; 32];
    let mut z1_bytes = [0u8; 32];
    let mut z2_bytes = [0u8; 32];
    t_bytes.copy_from_slice(&proof[..32]);
    z1_bytes.copy_from_slice(&proof[32..64]);
    z2_bytes.copy_from_slice(&proof[64..]);

    let (Some(t), Some(z1), Some(z2), Some(cv)) = (
        point_from_bytes(&t_bytes),
        scalar_from_bytes(&z1_bytes),
        scalar_from_bytes(&z2_bytes),
        point_from_bytes(cv),
    ) else {
        return false;
    };

    let c = challenge(context, &t_bytes, bound);
    let lhs = value_generator() * z1 + randomness_generator() * z2;
    let rhs = cv * c + t;
    lhs.into_affine() == rhs.into_affine()
}

fn challenge(context: &str, commitment: &[u8; 32], bound: &[&[u8]]) -> Scalar {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(bound.len() + 1);
    parts.push(commitment);
    parts.extend_from_slice(bound);
    hash_to_scalar(context, &parts)
}

impl ProvingEngine for ReferenceEngine {
    fn prove(&self, circuit: &SpendCircuit<'_>) -> Result<(SpendProof, SpendPublicData)> {
        let note = circuit.note;
        let witness = circuit.witness;

        if note.owner() != circuit.spending_key.public_address() {
            return Err(PrivacyError::ProvingFailure(
                "spending key does not own the note".into(),
            ));
        }
        let commitment = note.commitment();
        if !witness.verify(&MerkleNoteHash::from(commitment)) {
            return Err(PrivacyError::ProvingFailure(
                "witness does not authenticate the note commitment".into(),
            ));
        }
        if circuit.value_commitment.value() != note.value() {
            return Err(PrivacyError::ProvingFailure(
                "value commitment does not open to the note value".into(),
            ));
        }

        let rk = circuit
            .spending_key
            .proof_authorizing_key()
            .randomize(&circuit.randomizer);

        let public = SpendPublicData {
            value_commitment: circuit.value_commitment.to_bytes(),
            randomized_public_key: rk.to_bytes(),
            root_hash: witness.root_hash(),
            tree_size: witness.tree_size(),
            nullifier: note.nullifier(circuit.spending_key, witness.position()),
        };

        let proof = prove_opening(
            PROOF_CONTEXT,
            circuit.value_commitment,
            &[&public.to_bytes()[..]],
        );

        log::debug!("proved spend with nullifier {:?}", public.nullifier);
        Ok((SpendProof(proof), public))
    }

    fn verify(&self, proof: &SpendProof, public: &SpendPublicData) -> bool {
        verify_opening(
            PROOF_CONTEXT,
            &proof.0,
            &public.value_commitment,
            &[&public.to_bytes()[..]],
        )
    }

    fn prove_output(&self, circuit: &OutputCircuit<'_>) -> Result<(OutputProof, OutputPublicData)> {
        let expected = circuit.note.value_commitment();
        if circuit.value_commitment.value() != circuit.note.value()
            || circuit.value_commitment.to_bytes() != expected.to_bytes()
        {
            return Err(PrivacyError::ProvingFailure(
                "output value commitment is not the note's".into(),
            ));
        }
        Ok(Self::output_proof_unchecked(circuit))
    }

    fn verify_output(&self, proof: &OutputProof, public: &OutputPublicData) -> bool {
        let digest = proof.note_digest();
        if Commitment::commit(&public.value_commitment, &digest) != public.note_commitment {
            return false;
        }
        verify_opening(
            OUTPUT_PROOF_CONTEXT,
            &proof.0[32..],
            &public.value_commitment,
            &[&public.to_bytes()[..], &digest[..]],
        )
    }

    fn sign(&self, digest: &[u8], key: &SigningKey) -> Result<Signature> {
        Ok(key.sign(digest, &mut rand::thread_rng()))
    }

    fn verify_signature(&self, digest: &[u8], key: &VerificationKey, sig: &Signature) -> bool {
        key.verify(digest, sig)
    }
}
