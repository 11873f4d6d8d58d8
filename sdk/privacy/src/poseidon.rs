//! Poseidon sponge shared by commitments, nullifiers and Merkle hashing.
//!
//! Field: BLS12-381 Fr (255 bits)
//! Rate: 2, Capacity: 1
//! Security: 128 bits

use std::sync::LazyLock;

use ark_bls12_381::Fr;
use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};
use ark_ff::{BigInteger, PrimeField};

static CONFIG: LazyLock<PoseidonConfig<Fr>> = LazyLock::new(poseidon_config);

fn poseidon_config() -> PoseidonConfig<Fr> {
    let prime_bits: u64 = 255;
    let rate: usize = 2;
    let capacity: usize = 1;
    let full_rounds: u64 = 8;
    let partial_rounds: u64 = 57;
    let alpha: u64 = 5;
    let skip_matrices: u64 = 0;

    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        rate,
        full_rounds,
        partial_rounds,
        skip_matrices,
    );

    PoseidonConfig::new(
        full_rounds as usize,
        partial_rounds as usize,
        alpha,
        mds,
        ark,
        rate,
        capacity,
    )
}

/// Absorb `inputs` after a domain tag and squeeze a single element.
pub(crate) fn hash(domain: u64, inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(&CONFIG);
    sponge.absorb(&Fr::from(domain));
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

pub(crate) fn field_to_bytes(f: Fr) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_le();
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

pub(crate) fn bytes_to_field(bytes: &[u8; 32]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

/// Split 32 bytes into two 128-bit limbs so no input bits are lost to the
/// modular reduction.
pub(crate) fn limbs(bytes: &[u8; 32]) -> [Fr; 2] {
    [
        Fr::from_le_bytes_mod_order(&bytes[..16]),
        Fr::from_le_bytes_mod_order(&bytes[16..]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_separates() {
        let input = [Fr::from(7u64)];
        assert_ne!(hash(1, &input), hash(2, &input));
    }

    #[test]
    fn test_field_bytes_roundtrip() {
        let f = hash(3, &[Fr::from(11u64)]);
        assert_eq!(bytes_to_field(&field_to_bytes(f)), f);
    }

    #[test]
    fn test_limbs_keep_high_bits() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[31] = 0x80;
        b[31] = 0x00;
        assert_ne!(limbs(&a), limbs(&b));
    }
}
