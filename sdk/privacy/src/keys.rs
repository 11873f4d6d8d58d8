//! Shielded Key Material
//!
//! Every key is derived from a single 32-byte spending key.
//!
//! ```text
//! SpendingKey (sk)
//!   ├── ask = H_s("authorizing key", sk)       Jubjub scalar, signs spends
//!   │     └── ak = ask * G                     randomized per spend to rk
//!   ├── nk  = H("nullifier key", sk)           nullifier PRF key
//!   ├── ivk = H("incoming view key", sk)       X25519 secret, decrypts received notes
//!   │     └── PublicAddress = ivk * B          X25519 public key, note owner
//!   └── ovk = H("outgoing view key", sk)       decrypts notes the holder sent
//! ```

use std::fmt;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{PrivacyError, Result};
use crate::nullifier::NullifierKey;
use crate::signature::{SigningKey, VerificationKey};
use crate::value::hash_to_scalar;

const AUTHORIZING_KEY_CONTEXT: &str = "shroud 2024 spend authorizing key v1";
const NULLIFIER_KEY_CONTEXT: &str = "shroud 2024 nullifier key v1";
const INCOMING_VIEW_KEY_CONTEXT: &str = "shroud 2024 incoming view key v1";
const OUTGOING_VIEW_KEY_CONTEXT: &str = "shroud 2024 outgoing view key v1";

/// Parse a 64-character hex string into 32 bytes.
fn decode_hex32(what: &str, s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.trim())
        .map_err(|e| PrivacyError::InvalidKey(format!("{what}: {e}")))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        PrivacyError::InvalidKey(format!("{what}: expected 32 bytes, got {}", b.len()))
    })
}

/// Spending key - allows spending notes
///
/// This is the most sensitive key. Loss = loss of funds.
/// Compromise = theft of funds.
#[derive(Clone, PartialEq, Eq)]
pub struct SpendingKey {
    key: [u8; 32],
}

impl SpendingKey {
    /// Generate a random spending key
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        Self { key }
    }

    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_hex32("spending key", s).map(Self::from_bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }

    /// Scalar that signs spend authorizations (after randomization)
    pub fn authorizing_key(&self) -> SigningKey {
        SigningKey::from_scalar(hash_to_scalar(AUTHORIZING_KEY_CONTEXT, &[&self.key]))
    }

    /// Public counterpart of [`Self::authorizing_key`]
    pub fn proof_authorizing_key(&self) -> VerificationKey {
        self.authorizing_key().verification_key()
    }

    pub fn nullifier_key(&self) -> NullifierKey {
        NullifierKey::from_bytes(blake3::derive_key(NULLIFIER_KEY_CONTEXT, &self.key))
    }

    pub fn incoming_view_key(&self) -> IncomingViewKey {
        IncomingViewKey::from_bytes(blake3::derive_key(INCOMING_VIEW_KEY_CONTEXT, &self.key))
    }

    pub fn outgoing_view_key(&self) -> OutgoingViewKey {
        OutgoingViewKey::from_bytes(blake3::derive_key(OUTGOING_VIEW_KEY_CONTEXT, &self.key))
    }

    /// The address notes for this key are sent to
    pub fn public_address(&self) -> PublicAddress {
        self.incoming_view_key().public_address()
    }
}

impl fmt::Debug for SpendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SpendingKey(..)")
    }
}

/// Incoming view key - decrypts notes sent to the matching address
#[derive(Clone)]
pub struct IncomingViewKey {
    secret: StaticSecret,
}

impl IncomingViewKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_hex32("incoming view key", s).map(Self::from_bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn public_address(&self) -> PublicAddress {
        PublicAddress(PublicKey::from(&self.secret).to_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl fmt::Debug for IncomingViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IncomingViewKey(..)")
    }
}

/// Outgoing view key - lets a sender recover the notes it created
#[derive(Clone, PartialEq, Eq)]
pub struct OutgoingViewKey {
    key: [u8; 32],
}

impl OutgoingViewKey {
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_hex32("outgoing view key", s).map(Self::from_bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }
}

impl fmt::Debug for OutgoingViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OutgoingViewKey(..)")
    }
}

/// Public address (X25519 public key) identifying the owner of a note
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicAddress(#[serde(with = "hex::serde")] pub [u8; 32]);

impl PublicAddress {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_hex32("public address", s).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn to_public_key(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl fmt::Display for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicAddress").field(&self.to_hex()).finish()
    }
}

/// Full key bundle for a shielded address
#[derive(Debug, Clone)]
pub struct ShieldedKeyBundle {
    /// Spending key (secret - allows spending)
    pub spending_key: SpendingKey,
    /// Decrypts notes received at `public_address`
    pub incoming_view_key: IncomingViewKey,
    /// Decrypts notes sent from this bundle
    pub outgoing_view_key: OutgoingViewKey,
    /// Address (can be shared publicly)
    pub public_address: PublicAddress,
}

impl ShieldedKeyBundle {
    /// Generate a new random key bundle
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_spending_key(SpendingKey::random(rng))
    }

    /// Restore from spending key
    pub fn from_spending_key(spending_key: SpendingKey) -> Self {
        let incoming_view_key = spending_key.incoming_view_key();
        let outgoing_view_key = spending_key.outgoing_view_key();
        let public_address = incoming_view_key.public_address();

        Self {
            spending_key,
            incoming_view_key,
            outgoing_view_key,
            public_address,
        }
    }

    pub fn export(&self) -> ExportedKeys {
        ExportedKeys {
            spending_key: self.spending_key.to_hex(),
            incoming_view_key: self.incoming_view_key.to_hex(),
            outgoing_view_key: self.outgoing_view_key.to_hex(),
            public_address: self.public_address.to_hex(),
        }
    }
}

/// Hex-encoded key bundle, the form keys take in files and on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedKeys {
    pub spending_key: String,
    pub incoming_view_key: String,
    pub outgoing_view_key: String,
    pub public_address: String,
}

impl ExportedKeys {
    /// Parse back into a bundle. The derived keys must agree with the
    /// spending key.
    pub fn to_bundle(&self) -> Result<ShieldedKeyBundle> {
        let bundle = ShieldedKeyBundle::from_spending_key(SpendingKey::from_hex(&self.spending_key)?);

        let ivk = IncomingViewKey::from_hex(&self.incoming_view_key)?;
        let ovk = OutgoingViewKey::from_hex(&self.outgoing_view_key)?;
        let address = PublicAddress::from_hex(&self.public_address)?;

        if ivk.to_bytes() != bundle.incoming_view_key.to_bytes()
            || ovk != bundle.outgoing_view_key
            || address != bundle.public_address
        {
            return Err(PrivacyError::InvalidKey(
                "exported keys do not derive from the spending key".into(),
            ));
        }
        Ok(bundle)
    }
}

/// Generate a fresh key bundle in exported form.
pub fn generate_key() -> ExportedKeys {
    ShieldedKeyBundle::random(&mut rand::thread_rng()).export()
}

/// Re-derive every key (including the public address) from a hex spending key.
pub fn generate_public_address(spending_key: &str) -> Result<ExportedKeys> {
    let spending_key = SpendingKey::from_hex(spending_key)?;
    Ok(ShieldedKeyBundle::from_spending_key(spending_key).export())
}
