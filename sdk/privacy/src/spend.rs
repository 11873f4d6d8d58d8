//! Spend descriptions
//!
//! One entry per spent note in a finalized transaction.
//!
//! ```text
//! cv[32] | rk[32] | root_hash[32] | tree_size (u32 LE) | nullifier[32] |
//! proof[96] | authorizing_signature[64]                        = 292 bytes
//! ```

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use crate::error::{PrivacyError, Result};
use crate::merkle::MerkleNoteHash;
use crate::nullifier::Nullifier;
use crate::proving::{PROOF_SIZE, ProvingEngine, SpendProof, SpendPublicData};
use crate::signature::{SIGNATURE_SIZE, Signature, VerificationKey};

pub const SPEND_DESCRIPTION_SIZE: usize = SpendPublicData::SIZE + PROOF_SIZE + SIGNATURE_SIZE;

/// The ledger-facing view of a spend: what to check against the nullifier
/// set and the root history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpendProofDescriptor {
    pub nullifier: Nullifier,
    pub root_hash: MerkleNoteHash,
    pub tree_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendDescription {
    public: SpendPublicData,
    proof: SpendProof,
    authorizing_signature: Signature,
}

impl SpendDescription {
    pub(crate) fn new(
        public: SpendPublicData,
        proof: SpendProof,
        authorizing_signature: Signature,
    ) -> Self {
        Self {
            public,
            proof,
            authorizing_signature,
        }
    }

    pub fn public_data(&self) -> &SpendPublicData {
        &self.public
    }

    pub fn proof(&self) -> &SpendProof {
        &self.proof
    }

    pub fn authorizing_signature(&self) -> &Signature {
        &self.authorizing_signature
    }

    pub fn nullifier(&self) -> Nullifier {
        self.public.nullifier
    }

    pub fn descriptor(&self) -> SpendProofDescriptor {
        SpendProofDescriptor {
            nullifier: self.public.nullifier,
            root_hash: self.public.root_hash,
            tree_size: self.public.tree_size,
        }
    }

    /// Check the proof and the spend-authorizing signature over `digest`.
    pub(crate) fn verify_with<E: ProvingEngine>(&self, engine: &E, digest: &[u8]) -> bool {
        let Some(rk) = VerificationKey::from_bytes(&self.public.randomized_public_key) else {
            log::warn!("spend {:?}: undecodable randomized key", self.public.nullifier);
            return false;
        };
        if !engine.verify(&self.proof, &self.public) {
            log::warn!("spend {:?}: proof rejected", self.public.nullifier);
            return false;
        }
        if !engine.verify_signature(digest, &rk, &self.authorizing_signature) {
            log::warn!("spend {:?}: authorizing signature rejected", self.public.nullifier);
            return false;
        }
        true
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.public.value_commitment)?;
        writer.write_all(&self.public.randomized_public_key)?;
        writer.write_all(self.public.root_hash.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.public.tree_size)?;
        writer.write_all(self.public.nullifier.as_bytes())?;
        writer.write_all(&self.proof.0)?;
        writer.write_all(self.authorizing_signature.as_bytes())?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let eof = |e| PrivacyError::from_read(e, "spend description");

        let mut value_commitment = [0u8; 32];
        reader.read_exact(&mut value_commitment).map_err(eof)?;
        let mut randomized_public_key = [0u8; 32];
        reader.read_exact(&mut randomized_public_key).map_err(eof)?;
        let mut root_hash = [0u8; 32];
        reader.read_exact(&mut root_hash).map_err(eof)?;
        let tree_size = reader.read_u32::<LittleEndian>().map_err(eof)?;
        let mut nullifier = [0u8; 32];
        reader.read_exact(&mut nullifier).map_err(eof)?;
        let mut proof = [0u8; PROOF_SIZE];
        reader.read_exact(&mut proof).map_err(eof)?;
        let mut signature = [0u8; SIGNATURE_SIZE];
        reader.read_exact(&mut signature).map_err(eof)?;

        Ok(Self {
            public: SpendPublicData {
                value_commitment,
                randomized_public_key,
                root_hash: MerkleNoteHash(root_hash),
                tree_size,
                nullifier: Nullifier(nullifier),
            },
            proof: SpendProof(proof),
            authorizing_signature: Signature(signature),
        })
    }
}
