//! Finalized Transactions
//!
//! ```text
//! version (u8) | spends_len (u64 LE) | notes_len (u64 LE) | fee (i64 LE) |
//! spends[spends_len] | outputs[notes_len] | binding_signature[64]
//!
//! output = encrypted_note[264] | output_proof[128]
//! ```
//!
//! `transaction_hash` covers the version, the fee, every spend's public data
//! and proof, and every output with its proof. Both the spend-authorizing
//! signatures and the binding signature sign it.

use std::collections::HashSet;
use std::io::{Read, Write};

use ark_ec::CurveGroup;
use ark_ed_on_bls12_381::EdwardsProjective;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;

use crate::TRANSACTION_VERSION;
use crate::encryption::{ENCRYPTED_NOTE_SIZE, EncryptedNote};
use crate::error::{PrivacyError, Result};
use crate::nullifier::Nullifier;
use crate::proving::{
    OUTPUT_PROOF_SIZE, OutputProof, OutputPublicData, ProvingEngine, ReferenceEngine, SpendProof,
    SpendPublicData,
};
use crate::signature::{SIGNATURE_SIZE, Signature, VerificationKey};
use crate::spend::{SPEND_DESCRIPTION_SIZE, SpendDescription, SpendProofDescriptor};
use crate::value::{point_from_bytes, signed_scalar, value_generator};

const HEADER_SIZE: usize = 1 + 8 + 8 + 8;

/// Encoded size of one output: encrypted note and its proof
pub const OUTPUT_DESCRIPTION_SIZE: usize = ENCRYPTED_NOTE_SIZE + OUTPUT_PROOF_SIZE;
const TRANSACTION_HASH_CONTEXT: &str = "shroud 2024 transaction hash v1";

/// Digest signed by every signature in a transaction
pub(crate) fn transaction_hash<'a>(
    fee: i64,
    spends: impl IntoIterator<Item = (&'a SpendPublicData, &'a SpendProof)>,
    outputs: impl IntoIterator<Item = (&'a EncryptedNote, &'a OutputProof)>,
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(TRANSACTION_HASH_CONTEXT);
    hasher.update(&[TRANSACTION_VERSION]);
    hasher.update(&fee.to_le_bytes());
    for (public, proof) in spends {
        hasher.update(&public.to_bytes());
        hasher.update(&proof.0);
    }
    for (note, proof) in outputs {
        hasher.update(&note.to_bytes());
        hasher.update(&proof.0);
    }
    *hasher.finalize().as_bytes()
}

/// `Σ cv_spend - Σ cv_output - fee * G_v`, or `None` if any commitment
/// does not decode.
pub(crate) fn binding_verification_key<'a>(
    spend_cvs: impl IntoIterator<Item = &'a [u8; 32]>,
    output_cvs: impl IntoIterator<Item = &'a [u8; 32]>,
    fee: i64,
) -> Option<VerificationKey> {
    let mut total = EdwardsProjective::default();
    for cv in spend_cvs {
        total += point_from_bytes(cv)?;
    }
    for cv in output_cvs {
        total -= point_from_bytes(cv)?;
    }
    total -= value_generator() * signed_scalar(fee);
    Some(VerificationKey::from_point(total.into_affine()))
}

/// A posted transaction, ready for transmission or ledger inclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTransaction {
    fee: i64,
    spends: Vec<SpendDescription>,
    notes: Vec<EncryptedNote>,
    output_proofs: Vec<OutputProof>,
    binding_signature: Signature,
    hash: [u8; 32],
}

impl FinalizedTransaction {
    pub(crate) fn from_parts(
        fee: i64,
        spends: Vec<SpendDescription>,
        notes: Vec<EncryptedNote>,
        output_proofs: Vec<OutputProof>,
        binding_signature: Signature,
    ) -> Self {
        debug_assert_eq!(notes.len(), output_proofs.len());
        let hash = transaction_hash(
            fee,
            spends.iter().map(|s| (s.public_data(), s.proof())),
            notes.iter().zip(&output_proofs),
        );
        Self {
            fee,
            spends,
            notes,
            output_proofs,
            binding_signature,
            hash,
        }
    }

    /// Signed fee; negative for a miner's-fee transaction
    pub fn fee(&self) -> i64 {
        self.fee
    }

    pub fn transaction_hash(&self) -> [u8; 32] {
        self.hash
    }

    /// The binding signature
    pub fn transaction_signature(&self) -> Signature {
        self.binding_signature
    }

    pub fn spends_len(&self) -> usize {
        self.spends.len()
    }

    pub fn notes_len(&self) -> usize {
        self.notes.len()
    }

    pub fn spends(&self) -> &[SpendDescription] {
        &self.spends
    }

    pub fn notes(&self) -> &[EncryptedNote] {
        &self.notes
    }

    /// Proofs tying each output's `cv` to its note commitment, in note order
    pub fn output_proofs(&self) -> &[OutputProof] {
        &self.output_proofs
    }

    pub fn nullifiers(&self) -> Vec<Nullifier> {
        self.spends.iter().map(SpendDescription::nullifier).collect()
    }

    /// Output note at `index`, in the order outputs were added
    pub fn get_note(&self, index: usize) -> Result<&EncryptedNote> {
        self.notes.get(index).ok_or(PrivacyError::IndexOutOfRange {
            index,
            len: self.notes.len(),
        })
    }

    /// Ledger-facing data of the spend at `index`, in the order spends were added
    pub fn get_spend(&self, index: usize) -> Result<SpendProofDescriptor> {
        self.spends
            .get(index)
            .map(SpendDescription::descriptor)
            .ok_or(PrivacyError::IndexOutOfRange {
                index,
                len: self.spends.len(),
            })
    }

    /// No spends and a single output paid for by a non-positive fee. A
    /// zero-value reward has fee zero.
    pub fn is_miners_fee(&self) -> bool {
        self.spends.is_empty() && self.notes.len() == 1 && self.fee <= 0
    }

    /// Verify with the in-tree [`ReferenceEngine`]
    pub fn verify(&self) -> bool {
        self.verify_with(&ReferenceEngine)
    }

    /// Check every proof and signature. Invalid transactions are an expected
    /// input, so the answer is a `bool`, never an error.
    ///
    /// What a spend proof establishes depends on `engine`; see
    /// [`ReferenceEngine`] for what the in-tree engine checks.
    pub fn verify_with<E: ProvingEngine>(&self, engine: &E) -> bool {
        let mut seen = HashSet::with_capacity(self.spends.len());
        if !self.spends.iter().all(|spend| seen.insert(spend.nullifier())) {
            log::warn!("transaction spends the same nullifier twice");
            return false;
        }

        if !self
            .spends
            .par_iter()
            .all(|spend| spend.verify_with(engine, &self.hash))
        {
            return false;
        }

        if !self
            .notes
            .par_iter()
            .zip(self.output_proofs.par_iter())
            .all(|(note, proof)| {
                let public = OutputPublicData {
                    value_commitment: *note.value_commitment(),
                    note_commitment: note.note_commitment(),
                };
                engine.verify_output(proof, &public)
            })
        {
            log::warn!("output proof rejected");
            return false;
        }

        let Some(bvk) = binding_verification_key(
            self.spends.iter().map(|s| &s.public_data().value_commitment),
            self.notes.iter().map(EncryptedNote::value_commitment),
            self.fee,
        ) else {
            log::warn!("transaction carries an undecodable value commitment");
            return false;
        };

        if !engine.verify_signature(&self.hash, &bvk, &self.binding_signature) {
            log::warn!("binding signature rejected");
            return false;
        }
        true
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u8(TRANSACTION_VERSION)?;
        writer.write_u64::<LittleEndian>(self.spends.len() as u64)?;
        writer.write_u64::<LittleEndian>(self.notes.len() as u64)?;
        writer.write_i64::<LittleEndian>(self.fee)?;
        for spend in &self.spends {
            spend.write(&mut writer)?;
        }
        for (note, proof) in self.notes.iter().zip(&self.output_proofs) {
            note.write(&mut writer)?;
            writer.write_all(&proof.0)?;
        }
        writer.write_all(self.binding_signature.as_bytes())?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            HEADER_SIZE
                + self.spends.len() * SPEND_DESCRIPTION_SIZE
                + self.notes.len() * OUTPUT_DESCRIPTION_SIZE
                + SIGNATURE_SIZE,
        );
        self.write(&mut bytes)
            .expect("writing to a Vec cannot fail");
        bytes
    }

    /// Decode a transaction. The input must be exactly one transaction.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let eof = |e| PrivacyError::from_read(e, "transaction header");

        let version = reader.read_u8().map_err(eof)?;
        if version != TRANSACTION_VERSION {
            return Err(PrivacyError::MalformedEncoding(format!(
                "unsupported transaction version {version}"
            )));
        }
        let spends_len = reader.read_u64::<LittleEndian>().map_err(eof)?;
        let notes_len = reader.read_u64::<LittleEndian>().map_err(eof)?;
        let fee = reader.read_i64::<LittleEndian>().map_err(eof)?;

        // Counts are checked against the input before anything is allocated
        let expected = u128::from(spends_len) * SPEND_DESCRIPTION_SIZE as u128
            + u128::from(notes_len) * OUTPUT_DESCRIPTION_SIZE as u128
            + SIGNATURE_SIZE as u128;
        if expected != reader.len() as u128 {
            return Err(PrivacyError::MalformedEncoding(format!(
                "{spends_len} spends and {notes_len} notes need {expected} bytes, {} remain",
                reader.len()
            )));
        }

        let spends = (0..spends_len)
            .map(|_| SpendDescription::read(&mut reader))
            .collect::<Result<Vec<_>>>()?;
        let mut notes = Vec::with_capacity(notes_len as usize);
        let mut output_proofs = Vec::with_capacity(notes_len as usize);
        for _ in 0..notes_len {
            notes.push(EncryptedNote::read(&mut reader)?);
            let mut proof = [0u8; OUTPUT_PROOF_SIZE];
            reader
                .read_exact(&mut proof)
                .map_err(|e| PrivacyError::from_read(e, "output proof"))?;
            output_proofs.push(OutputProof(proof));
        }

        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(reader);

        Ok(Self::from_parts(
            fee,
            spends,
            notes,
            output_proofs,
            Signature(signature),
        ))
    }
}
