//! Error taxonomy shared by every operation in the crate.
//!
//! Structural problems with caller input are reported here, at the call that
//! received the input. Cryptographic invalidity of a finished transaction is
//! not an error: `FinalizedTransaction::verify` answers it with a `bool`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivacyError {
    #[error("invalid value {value}: must be between 0 and {max}")]
    InvalidValue { value: i128, max: u64 },

    #[error("invalid note: {0}")]
    InvalidNote(String),

    #[error("invalid witness: {0}")]
    InvalidWitness(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid miner's fee transaction: {spends} spends, {outputs} outputs")]
    InvalidMinerFee { spends: usize, outputs: usize },

    #[error("unbalanced transaction: {0}")]
    UnbalancedTransaction(String),

    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("proving failure: {0}")]
    ProvingFailure(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrivacyError {
    /// Map a short read on a fixed-layout decoder to `MalformedEncoding`.
    pub(crate) fn from_read(err: std::io::Error, what: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            PrivacyError::MalformedEncoding(format!("{what}: unexpected end of input"))
        } else {
            PrivacyError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, PrivacyError>;
