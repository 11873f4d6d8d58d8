//! Note Encryption
//!
//! Encrypts note data for the recipient using ECDH + ChaCha20-Poly1305, and a
//! second copy of the key material for the sender.
//!
//! ```text
//! Flow:
//! 1. Sender generates ephemeral keypair (esk, epk)
//! 2. Shared secret = ECDH(esk, owner_address)
//! 3. Note key = KDF(shared_secret || epk)
//! 4. encrypted_note = ChaCha20-Poly1305(note key, value || randomness || memo)
//! 5. Outgoing key = KDF(ovk || cv || cm || epk)
//! 6. note_encryption_keys = ChaCha20-Poly1305(outgoing key, owner || esk)
//! ```
//!
//! Every key is used for exactly one message, so the nonce is fixed at zero.
//!
//! Wire format (264 bytes):
//! `cv[32] | cm[32] | epk[32] | encrypted_note[88] | note_encryption_keys[80]`

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::MAX_NOTE_VALUE;
use crate::commitment::Commitment;
use crate::error::{PrivacyError, Result};
use crate::keys::{IncomingViewKey, OutgoingViewKey, PublicAddress};
use crate::merkle::MerkleNoteHash;
use crate::note::{MEMO_SIZE, Memo, Note};
use crate::value::ValueCommitment;

const TAG_SIZE: usize = 16;
const NOTE_PLAINTEXT_SIZE: usize = 8 + 32 + MEMO_SIZE;
const KEYS_PLAINTEXT_SIZE: usize = 32 + 32;

pub const ENCRYPTED_NOTE_CIPHERTEXT_SIZE: usize = NOTE_PLAINTEXT_SIZE + TAG_SIZE;
pub const NOTE_ENCRYPTION_KEYS_SIZE: usize = KEYS_PLAINTEXT_SIZE + TAG_SIZE;
pub const ENCRYPTED_NOTE_SIZE: usize =
    32 + 32 + 32 + ENCRYPTED_NOTE_CIPHERTEXT_SIZE + NOTE_ENCRYPTION_KEYS_SIZE;

const NOTE_KEY_CONTEXT: &str = "shroud 2024 note encryption key v1";
const OUTGOING_KEY_CONTEXT: &str = "shroud 2024 outgoing cipher key v1";

/// An encrypted note (sent on-chain)
///
/// Equality is byte equality of the encoded form, not of the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedNote {
    value_commitment: [u8; 32],
    note_commitment: Commitment,
    ephemeral_public_key: [u8; 32],
    encrypted_note: [u8; ENCRYPTED_NOTE_CIPHERTEXT_SIZE],
    note_encryption_keys: [u8; NOTE_ENCRYPTION_KEYS_SIZE],
}

impl EncryptedNote {
    /// Encrypt `note` to its owner, and to the holder of `ovk`.
    ///
    /// Publishes the note's own value commitment alongside its commitment.
    pub fn new(note: &Note, ovk: &OutgoingViewKey) -> Self {
        Self::with_value_commitment(note, &note.value_commitment(), ovk)
    }

    /// Encrypt `note` publishing `value_commitment` as its `cv`. The builder
    /// passes the opening it proved; only its point is published.
    pub(crate) fn with_value_commitment(
        note: &Note,
        value_commitment: &ValueCommitment,
        ovk: &OutgoingViewKey,
    ) -> Self {
        let esk = StaticSecret::random_from_rng(rand::thread_rng());
        let epk = PublicKey::from(&esk);

        let shared_secret = esk.diffie_hellman(&note.owner().to_public_key());
        let note_key = derive_note_key(shared_secret.as_bytes(), epk.as_bytes());

        let mut plaintext = Vec::with_capacity(NOTE_PLAINTEXT_SIZE);
        plaintext.extend_from_slice(&note.value().to_le_bytes());
        plaintext.extend_from_slice(note.randomness());
        plaintext.extend_from_slice(note.memo().as_bytes());

        let cv = value_commitment.to_bytes();
        let cm = note.commitment();
        let outgoing_key = derive_outgoing_key(ovk, &cv, &cm, epk.as_bytes());

        let mut keys = Vec::with_capacity(KEYS_PLAINTEXT_SIZE);
        keys.extend_from_slice(note.owner().as_bytes());
        keys.extend_from_slice(esk.as_bytes());

        Self {
            value_commitment: cv,
            note_commitment: cm,
            ephemeral_public_key: *epk.as_bytes(),
            encrypted_note: seal(&note_key, &plaintext),
            note_encryption_keys: seal(&outgoing_key, &keys),
        }
    }

    /// Compressed value commitment point of this output
    pub fn value_commitment(&self) -> &[u8; 32] {
        &self.value_commitment
    }

    pub fn note_commitment(&self) -> Commitment {
        self.note_commitment
    }

    pub fn ephemeral_public_key(&self) -> &[u8; 32] {
        &self.ephemeral_public_key
    }

    /// Leaf stored in the note-commitment tree
    pub fn merkle_hash(&self) -> MerkleNoteHash {
        MerkleNoteHash::from(self.note_commitment)
    }

    /// Decrypt as the note's owner.
    ///
    /// A note for someone else yields `Ok(None)`, as does a plaintext that
    /// authenticates but does not describe the published commitments.
    pub fn decrypt_note_for_owner(&self, ivk: &IncomingViewKey) -> Result<Option<Note>> {
        let epk = PublicKey::from(self.ephemeral_public_key);
        let shared_secret = ivk.secret().diffie_hellman(&epk);
        if !shared_secret.was_contributory() {
            return Ok(None);
        }

        let note_key = derive_note_key(shared_secret.as_bytes(), &self.ephemeral_public_key);
        let Some(plaintext) = open(&note_key, &self.encrypted_note) else {
            return Ok(None);
        };
        self.recover(ivk.public_address(), &plaintext)
    }

    /// Decrypt as the sender that created the note.
    pub fn decrypt_note_for_spender(&self, ovk: &OutgoingViewKey) -> Result<Option<Note>> {
        let outgoing_key = derive_outgoing_key(
            ovk,
            &self.value_commitment,
            &self.note_commitment,
            &self.ephemeral_public_key,
        );
        let Some(keys) = open(&outgoing_key, &self.note_encryption_keys) else {
            return Ok(None);
        };

        let mut owner = [0u8; 32];
        let mut esk_bytes = [0u8; 32];
        owner.copy_from_slice(&keys[..32]);
        esk_bytes.copy_from_slice(&keys[32..]);

        let esk = StaticSecret::from(esk_bytes);
        if PublicKey::from(&esk).as_bytes() != &self.ephemeral_public_key {
            return Ok(None);
        }

        let owner = PublicAddress(owner);
        let shared_secret = esk.diffie_hellman(&owner.to_public_key());
        let note_key = derive_note_key(shared_secret.as_bytes(), &self.ephemeral_public_key);
        let Some(plaintext) = open(&note_key, &self.encrypted_note) else {
            return Ok(None);
        };
        self.recover(owner, &plaintext)
    }

    fn recover(&self, owner: PublicAddress, plaintext: &[u8]) -> Result<Option<Note>> {
        let mut reader = plaintext;
        let value = reader
            .read_u64::<LittleEndian>()
            .map_err(|e| PrivacyError::from_read(e, "note plaintext"))?;
        let mut randomness = [0u8; 32];
        reader
            .read_exact(&mut randomness)
            .map_err(|e| PrivacyError::from_read(e, "note plaintext"))?;
        let memo = Memo::from_bytes(reader);

        if value > MAX_NOTE_VALUE {
            log::warn!("decrypted note value {value} exceeds {MAX_NOTE_VALUE}");
            return Ok(None);
        }

        let note = Note::with_randomness(owner, value, memo, randomness)?;
        if note.commitment() != self.note_commitment {
            log::warn!("decrypted note does not match its commitment");
            return Ok(None);
        }
        if note.value_commitment().to_bytes() != self.value_commitment {
            log::warn!("decrypted note does not match its value commitment");
            return Ok(None);
        }
        Ok(Some(note))
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.value_commitment)?;
        writer.write_all(self.note_commitment.as_bytes())?;
        writer.write_all(&self.ephemeral_public_key)?;
        writer.write_all(&self.encrypted_note)?;
        writer.write_all(&self.note_encryption_keys)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut value_commitment = [0u8; 32];
        let mut note_commitment = [0u8; 32];
        let mut ephemeral_public_key = [0u8; 32];
        let mut encrypted_note = [0u8; ENCRYPTED_NOTE_CIPHERTEXT_SIZE];
        let mut note_encryption_keys = [0u8; NOTE_ENCRYPTION_KEYS_SIZE];

        for buf in [
            &mut value_commitment[..],
            &mut note_commitment[..],
            &mut ephemeral_public_key[..],
            &mut encrypted_note[..],
            &mut note_encryption_keys[..],
        ] {
            reader
                .read_exact(buf)
                .map_err(|e| PrivacyError::from_read(e, "encrypted note"))?;
        }

        Ok(Self {
            value_commitment,
            note_commitment: Commitment(note_commitment),
            ephemeral_public_key,
            encrypted_note,
            note_encryption_keys,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENCRYPTED_NOTE_SIZE);
        self.write(&mut bytes)
            .expect("writing to a Vec cannot fail");
        bytes
    }

    /// Decode exactly [`ENCRYPTED_NOTE_SIZE`] bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENCRYPTED_NOTE_SIZE {
            return Err(PrivacyError::MalformedEncoding(format!(
                "encrypted note must be {ENCRYPTED_NOTE_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        Self::read(bytes)
    }
}

/// Derive the note key from the ECDH shared secret
fn derive_note_key(shared_secret: &[u8], ephemeral_pk: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(NOTE_KEY_CONTEXT);
    hasher.update(shared_secret);
    hasher.update(ephemeral_pk);
    *hasher.finalize().as_bytes()
}

fn derive_outgoing_key(
    ovk: &OutgoingViewKey,
    value_commitment: &[u8; 32],
    note_commitment: &Commitment,
    ephemeral_pk: &[u8; 32],
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(OUTGOING_KEY_CONTEXT);
    hasher.update(ovk.as_bytes());
    hasher.update(value_commitment);
    hasher.update(note_commitment.as_bytes());
    hasher.update(ephemeral_pk);
    *hasher.finalize().as_bytes()
}

fn seal<const N: usize>(key: &[u8; 32], plaintext: &[u8]) -> [u8; N] {
    let cipher = ChaCha20Poly1305::new(key.into());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&[0u8; 12]), plaintext)
        .expect("encryption should not fail");

    let mut out = [0u8; N];
    out.copy_from_slice(&ciphertext);
    out
}

fn open(key: &[u8; 32], ciphertext: &[u8]) -> Option<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(&[0u8; 12]), ciphertext)
        .ok()
}
