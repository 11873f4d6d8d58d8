//! Schnorr signatures over Jubjub
//!
//! Used for spend authorization (under a randomized spend key) and for the
//! binding signature (under the sum of value-commitment randomness).
//!
//! ```text
//! sign:   R = k * G,  c = H(R || vk || msg),  s = k + c * sk
//! verify: s * G == R + c * vk
//! ```

use std::fmt;

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bls12_381::EdwardsAffine;
use rand::{CryptoRng, RngCore};

use crate::value::{
    Scalar, hash_to_scalar, point_from_bytes, point_to_bytes, randomness_generator,
    scalar_from_bytes, scalar_to_bytes,
};

pub const SIGNATURE_SIZE: usize = 64;

const CHALLENGE_CONTEXT: &str = "shroud 2024 schnorr challenge v1";
const NONCE_CONTEXT: &str = "shroud 2024 schnorr nonce v1";

/// A 64-byte signature: `R` (compressed point) followed by `s` (scalar)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    fn split(&self) -> ([u8; 32], [u8; 32]) {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&self.0[..32]);
        s.copy_from_slice(&self.0[32..]);
        (r, s)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature").field(&hex::encode(self.0)).finish()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Secret scalar of a Schnorr key pair
#[derive(Clone)]
pub struct SigningKey(Scalar);

impl SigningKey {
    pub fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar)
    }

    pub fn scalar(&self) -> Scalar {
        self.0
    }

    pub fn verification_key(&self) -> VerificationKey {
        VerificationKey((randomness_generator() * self.0).into_affine())
    }

    /// Re-randomize by adding `alpha`; pairs with [`VerificationKey::randomize`].
    pub fn randomize(&self, alpha: &Scalar) -> Self {
        Self(self.0 + alpha)
    }

    /// Sign `msg`. The nonce is derived from the key, the message and fresh
    /// randomness so a weak RNG alone cannot leak the key.
    pub fn sign<R: RngCore + CryptoRng>(&self, msg: &[u8], rng: &mut R) -> Signature {
        let mut entropy = [0u8; 32];
        rng.fill_bytes(&mut entropy);
        let k = hash_to_scalar(NONCE_CONTEXT, &[&scalar_to_bytes(&self.0), msg, &entropy]);

        let r_bytes = point_to_bytes(&(randomness_generator() * k).into_affine());
        let vk_bytes = self.verification_key().to_bytes();
        let c = challenge(&r_bytes, &vk_bytes, msg);
        let s = k + c * self.0;

        let mut sig = [0u8; SIGNATURE_SIZE];
        sig[..32].copy_from_slice(&r_bytes);
        sig[32..].copy_from_slice(&scalar_to_bytes(&s));
        Signature(sig)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Public point of a Schnorr key pair
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VerificationKey(EdwardsAffine);

impl VerificationKey {
    pub fn from_point(point: EdwardsAffine) -> Self {
        Self(point)
    }

    pub fn point(&self) -> EdwardsAffine {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        point_to_bytes(&self.0)
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        point_from_bytes(bytes).map(Self)
    }

    /// `vk + alpha * G`
    pub fn randomize(&self, alpha: &Scalar) -> Self {
        Self((randomness_generator() * *alpha + self.0).into_affine())
    }

    /// Check `sig` over `msg`. Malformed signatures verify as `false`.
    pub fn verify(&self, msg: &[u8], sig: &Signature) -> bool {
        let (r_bytes, s_bytes) = sig.split();
        let (Some(r), Some(s)) = (point_from_bytes(&r_bytes), scalar_from_bytes(&s_bytes)) else {
            return false;
        };

        let c = challenge(&r_bytes, &self.to_bytes(), msg);
        let lhs = randomness_generator() * s;
        let rhs = self.0 * c + r;
        lhs.into_affine() == rhs.into_affine()
    }
}

fn challenge(r: &[u8; 32], vk: &[u8; 32], msg: &[u8]) -> Scalar {
    hash_to_scalar(CHALLENGE_CONTEXT, &[r, vk, msg])
}
