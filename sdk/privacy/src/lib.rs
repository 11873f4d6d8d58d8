//! Shroud Privacy SDK
//!
//! Note-based shielded transactions: build, prove, post and verify transfers
//! without revealing which notes were spent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Finalized Transaction                        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │    Spends    │  │    Notes     │  │   Binding Signature   │ │
//! │  │ (nullifier,  │  │ (encrypted,  │  │ (Σ cv balances with   │ │
//! │  │  root, size) │  │  commitment) │  │  the fee)             │ │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘ │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Proving Engine                              │   │
//! │  │  • Note ownership and tree membership                    │   │
//! │  │  • Value commitment opening, for spends and outputs      │   │
//! │  │  • Spend authorization under a randomized key            │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger that stores the commitment tree and the nullifier set lives
//! elsewhere. [`SpendProofDescriptor`] is the data it checks.

pub mod commitment;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod merkle;
pub mod note;
pub mod nullifier;
mod poseidon;
pub mod posted;
pub mod proving;
#[cfg(feature = "async")]
pub mod service;
pub mod signature;
pub mod spend;
pub mod transaction;
pub mod value;

/// Largest value a note, fee or change output may carry
pub const MAX_NOTE_VALUE: u64 = i64::MAX as u64;

/// First byte of every serialized [`FinalizedTransaction`]
pub const TRANSACTION_VERSION: u8 = 2;

pub use commitment::Commitment;
pub use encryption::{ENCRYPTED_NOTE_SIZE, EncryptedNote};
pub use error::{PrivacyError, Result};
pub use keys::{
    ExportedKeys, IncomingViewKey, OutgoingViewKey, PublicAddress, ShieldedKeyBundle,
    SpendingKey, generate_key, generate_public_address,
};
pub use merkle::{
    MerkleNoteHash, MerkleWitness, NoteTree, TREE_DEPTH, Witness, WitnessNode, WitnessSide,
    combine_hash,
};
pub use note::{MEMO_SIZE, Memo, NOTE_SIZE, Note};
pub use nullifier::{Nullifier, NullifierKey};
pub use posted::{FinalizedTransaction, OUTPUT_DESCRIPTION_SIZE};
pub use proving::{
    OUTPUT_PROOF_SIZE, OutputCircuit, OutputProof, OutputPublicData, ProvingEngine,
    ReferenceEngine, SpendCircuit, SpendProof, SpendPublicData,
};
#[cfg(feature = "async")]
pub use service::PostingService;
pub use signature::{Signature, SigningKey, VerificationKey};
pub use spend::{SpendDescription, SpendProofDescriptor};
pub use transaction::{BindingRef, ProposedTransaction, SimpleTransaction};
pub use value::ValueCommitment;
