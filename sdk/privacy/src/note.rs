//! Shielded Notes
//!
//! A Note represents value held privately by the owner of a public address.
//!
//! ```text
//! Note = {
//!     owner: [u8; 32],      // Owner's public address
//!     value: u64,           // Amount in the smallest unit, at most MAX_NOTE_VALUE
//!     randomness: [u8; 32], // Blinding factor
//!     memo: [u8; 32],       // Fixed-width memo
//! }
//! ```
//!
//! Wire format (104 bytes): `owner | value (u64 LE) | randomness | memo`.

use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::RngCore;

use crate::MAX_NOTE_VALUE;
use crate::commitment::Commitment;
use crate::error::{PrivacyError, Result};
use crate::keys::{PublicAddress, SpendingKey};
use crate::nullifier::Nullifier;
use crate::value::ValueCommitment;

pub const MEMO_SIZE: usize = 32;
pub const NOTE_SIZE: usize = 32 + 8 + 32 + MEMO_SIZE;

/// Fixed-width memo. Longer input is truncated, shorter input zero padded.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Memo(pub [u8; MEMO_SIZE]);

impl Memo {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut memo = [0u8; MEMO_SIZE];
        let len = bytes.len().min(MEMO_SIZE);
        memo[..len].copy_from_slice(&bytes[..len]);
        Self(memo)
    }

    pub fn as_bytes(&self) -> &[u8; MEMO_SIZE] {
        &self.0
    }

    /// Memo contents up to the zero padding, decoded lossily as UTF-8
    pub fn to_text(&self) -> String {
        let end = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl From<&str> for Memo {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<&[u8]> for Memo {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Memo").field(&self.to_text()).finish()
    }
}

pub(crate) fn check_value(value: u64) -> Result<u64> {
    if value > MAX_NOTE_VALUE {
        return Err(PrivacyError::InvalidValue {
            value: value as i128,
            max: MAX_NOTE_VALUE,
        });
    }
    Ok(value)
}

/// A shielded note representing privately held value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    owner: PublicAddress,
    value: u64,
    randomness: [u8; 32],
    memo: Memo,
}

impl Note {
    /// Create a new note with random blinding
    pub fn new(owner: PublicAddress, value: u64, memo: impl Into<Memo>) -> Result<Self> {
        let mut randomness = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut randomness);
        Self::with_randomness(owner, value, memo, randomness)
    }

    /// Create a note with explicit randomness (for testing/recovery)
    pub fn with_randomness(
        owner: PublicAddress,
        value: u64,
        memo: impl Into<Memo>,
        randomness: [u8; 32],
    ) -> Result<Self> {
        Ok(Self {
            owner,
            value: check_value(value)?,
            randomness,
            memo: memo.into(),
        })
    }

    pub fn owner(&self) -> PublicAddress {
        self.owner
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn randomness(&self) -> &[u8; 32] {
        &self.randomness
    }

    /// Value commitment derived from this note's value and randomness
    pub fn value_commitment(&self) -> ValueCommitment {
        ValueCommitment::derive(self.value, &self.randomness)
    }

    /// Hash of owner, memo and randomness, revealed by output proofs
    pub fn digest(&self) -> [u8; 32] {
        Commitment::note_digest(self.owner.as_bytes(), self.memo.as_bytes(), &self.randomness)
    }

    /// Compute the commitment for this note
    pub fn commitment(&self) -> Commitment {
        Commitment::commit(&self.value_commitment().to_bytes(), &self.digest())
    }

    /// Derive the nullifier for spending this note from tree position `position`
    pub fn nullifier(&self, spending_key: &SpendingKey, position: u64) -> Nullifier {
        spending_key
            .nullifier_key()
            .derive_nullifier(&self.commitment(), position)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(self.owner.as_bytes())?;
        writer.write_u64::<LittleEndian>(self.value)?;
        writer.write_all(&self.randomness)?;
        writer.write_all(self.memo.as_bytes())?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut owner = [0u8; 32];
        reader
            .read_exact(&mut owner)
            .map_err(|e| PrivacyError::from_read(e, "note owner"))?;
        let value = reader
            .read_u64::<LittleEndian>()
            .map_err(|e| PrivacyError::from_read(e, "note value"))?;
        let mut randomness = [0u8; 32];
        reader
            .read_exact(&mut randomness)
            .map_err(|e| PrivacyError::from_read(e, "note randomness"))?;
        let mut memo = [0u8; MEMO_SIZE];
        reader
            .read_exact(&mut memo)
            .map_err(|e| PrivacyError::from_read(e, "note memo"))?;

        if value > MAX_NOTE_VALUE {
            return Err(PrivacyError::MalformedEncoding(format!(
                "note value {value} exceeds {MAX_NOTE_VALUE}"
            )));
        }

        Ok(Self {
            owner: PublicAddress(owner),
            value,
            randomness,
            memo: Memo(memo),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NOTE_SIZE);
        self.write(&mut bytes)
            .expect("writing to a Vec cannot fail");
        bytes
    }

    /// Decode exactly [`NOTE_SIZE`] bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NOTE_SIZE {
            return Err(PrivacyError::MalformedEncoding(format!(
                "note must be {NOTE_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        Self::read(bytes)
    }
}
