//! Transaction builder
//!
//! Collects spends and outputs for one spender key, checks that value is
//! conserved, and posts a [`FinalizedTransaction`].
//!
//! ```text
//! Σ spends - Σ outputs - fee - change = 0
//! ```
//!
//! `change` becomes an extra output to the change address. A miner's-fee
//! transaction has no spends, a single output and `fee = -output.value`.
//!
//! Every output publishes its note's own value commitment, with a proof that
//! the note commitment binds it, so the binding signature balances the
//! values the recipients actually receive.

use std::fmt;

use ark_ec::CurveGroup;
use ark_ff::UniformRand;

use crate::MAX_NOTE_VALUE;
use crate::encryption::EncryptedNote;
use crate::error::{PrivacyError, Result};
use crate::keys::{PublicAddress, SpendingKey};
use crate::merkle::{MerkleWitness, Witness};
use crate::note::{Memo, Note, check_value};
use crate::posted::{FinalizedTransaction, binding_verification_key, transaction_hash};
use crate::proving::{OutputCircuit, ProvingEngine, ReferenceEngine, SpendCircuit};
use crate::signature::{Signature, SigningKey};
use crate::spend::SpendDescription;
use crate::value::{Scalar, ValueCommitment, randomness_generator};

/// Handle to the value commitment of one spend or output
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingRef(pub [u8; 32]);

impl fmt::Display for BindingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BindingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BindingRef").field(&hex::encode(self.0)).finish()
    }
}

#[derive(Debug, Clone)]
struct ProposedSpend {
    note: Note,
    witness: Witness,
    value_commitment: ValueCommitment,
}

#[derive(Debug, Clone)]
struct ProposedOutput {
    note: Note,
    value_commitment: ValueCommitment,
}

impl ProposedOutput {
    fn new(note: Note) -> Self {
        let value_commitment = note.value_commitment();
        Self {
            note,
            value_commitment,
        }
    }
}

/// A transaction under construction
///
/// Spends and outputs keep their insertion order in the posted transaction.
#[derive(Debug, Clone)]
pub struct ProposedTransaction<E: ProvingEngine = ReferenceEngine> {
    spender_key: SpendingKey,
    spends: Vec<ProposedSpend>,
    outputs: Vec<ProposedOutput>,
    engine: E,
}

impl ProposedTransaction {
    pub fn new(spender_key: SpendingKey) -> Self {
        Self::with_engine(spender_key, ReferenceEngine)
    }
}

impl<E: ProvingEngine> ProposedTransaction<E> {
    pub fn with_engine(spender_key: SpendingKey, engine: E) -> Self {
        Self {
            spender_key,
            spends: Vec::new(),
            outputs: Vec::new(),
            engine,
        }
    }

    pub fn spender_key(&self) -> &SpendingKey {
        &self.spender_key
    }

    pub fn spends_len(&self) -> usize {
        self.spends.len()
    }

    pub fn outputs_len(&self) -> usize {
        self.outputs.len()
    }

    /// Spend `note`, proven present in the tree by `witness`
    pub fn spend<W: MerkleWitness + ?Sized>(&mut self, note: Note, witness: &W) -> Result<BindingRef> {
        let witness = Witness::snapshot(witness);
        witness.check_shape()?;

        if note.owner() != self.spender_key.public_address() {
            return Err(PrivacyError::InvalidNote(
                "note is not owned by the spender key".into(),
            ));
        }

        let value_commitment = ValueCommitment::new(note.value(), &mut rand::thread_rng());
        let binding = BindingRef(value_commitment.to_bytes());
        log::debug!(
            "spend #{}: value {} at position {}",
            self.spends.len(),
            note.value(),
            witness.position()
        );

        self.spends.push(ProposedSpend {
            note,
            witness,
            value_commitment,
        });
        Ok(binding)
    }

    /// Add an output note
    pub fn receive(&mut self, note: Note) -> Result<BindingRef> {
        if note.value() > MAX_NOTE_VALUE {
            return Err(PrivacyError::InvalidNote(format!(
                "output value {} exceeds {MAX_NOTE_VALUE}",
                note.value()
            )));
        }

        let output = ProposedOutput::new(note);
        let binding = BindingRef(output.value_commitment.to_bytes());
        log::debug!("output #{}: value {}", self.outputs.len(), output.note.value());

        self.outputs.push(output);
        Ok(binding)
    }

    /// Balance the transaction and produce the proofs and signatures.
    ///
    /// Leftover value goes to `change_goes_to`. The builder is left untouched,
    /// so after an `UnbalancedTransaction` error the caller may add spends and
    /// post again.
    pub fn post(
        &self,
        change_goes_to: Option<PublicAddress>,
        intended_fee: u64,
    ) -> Result<FinalizedTransaction> {
        let fee = check_value(intended_fee)?;

        let spent: i128 = self.spends.iter().map(|s| i128::from(s.note.value())).sum();
        let received: i128 = self.outputs.iter().map(|o| i128::from(o.note.value())).sum();
        let change = spent - received - i128::from(fee);

        if change < 0 {
            return Err(PrivacyError::UnbalancedTransaction(format!(
                "spends total {spent}, outputs total {received}, fee {fee}: short by {}",
                -change
            )));
        }

        let mut outputs = self.outputs.clone();
        if change > 0 {
            let Some(address) = change_goes_to else {
                return Err(PrivacyError::UnbalancedTransaction(format!(
                    "change of {change} needs a change address"
                )));
            };
            let change = u64::try_from(change).map_err(|_| PrivacyError::InvalidValue {
                value: change,
                max: MAX_NOTE_VALUE,
            })?;
            outputs.push(ProposedOutput::new(Note::new(address, change, Memo::default())?));
        }

        // fee <= MAX_NOTE_VALUE = i64::MAX
        self.finalize(&outputs, fee as i64)
    }

    /// Post a transaction that mints its single output as the block reward
    pub fn post_miners_fee(&self) -> Result<FinalizedTransaction> {
        if !self.spends.is_empty() || self.outputs.len() != 1 {
            return Err(PrivacyError::InvalidMinerFee {
                spends: self.spends.len(),
                outputs: self.outputs.len(),
            });
        }
        let fee = -(self.outputs[0].note.value() as i64);
        self.finalize(&self.outputs, fee)
    }

    fn finalize(&self, outputs: &[ProposedOutput], fee: i64) -> Result<FinalizedTransaction> {
        let mut rng = rand::thread_rng();
        let authorizing_key = self.spender_key.authorizing_key();

        let mut proven = Vec::with_capacity(self.spends.len());
        for spend in &self.spends {
            let randomizer = Scalar::rand(&mut rng);
            let circuit = SpendCircuit {
                spending_key: &self.spender_key,
                note: &spend.note,
                witness: &spend.witness,
                value_commitment: &spend.value_commitment,
                randomizer,
            };
            let (proof, public) = self.engine.prove(&circuit)?;
            proven.push((public, proof, randomizer));
        }

        let ovk = self.spender_key.outgoing_view_key();
        let mut notes = Vec::with_capacity(outputs.len());
        let mut output_proofs = Vec::with_capacity(outputs.len());
        for output in outputs {
            let circuit = OutputCircuit {
                note: &output.note,
                value_commitment: &output.value_commitment,
            };
            let (proof, _) = self.engine.prove_output(&circuit)?;
            notes.push(EncryptedNote::with_value_commitment(
                &output.note,
                &output.value_commitment,
                &ovk,
            ));
            output_proofs.push(proof);
        }

        // The digest covers public data and proofs only, so it exists
        // before the authorizing signatures do.
        let digest = transaction_hash(
            fee,
            proven.iter().map(|(public, proof, _)| (public, proof)),
            notes.iter().zip(&output_proofs),
        );

        let mut spends = Vec::with_capacity(proven.len());
        for (public, proof, randomizer) in proven {
            let rsk = authorizing_key.randomize(&randomizer);
            let signature = self.engine.sign(&digest, &rsk)?;
            spends.push(SpendDescription::new(public, proof, signature));
        }

        let binding_signature = self.binding_signature(outputs, &spends, &notes, fee, &digest)?;
        let transaction =
            FinalizedTransaction::from_parts(fee, spends, notes, output_proofs, binding_signature);

        log::info!(
            "posted transaction {}: {} spends, {} outputs, fee {}",
            hex::encode(transaction.transaction_hash()),
            transaction.spends_len(),
            transaction.notes_len(),
            fee
        );
        Ok(transaction)
    }

    fn binding_signature(
        &self,
        outputs: &[ProposedOutput],
        spends: &[SpendDescription],
        notes: &[EncryptedNote],
        fee: i64,
        digest: &[u8; 32],
    ) -> Result<Signature> {
        let spent: Scalar = self.spends.iter().map(|s| s.value_commitment.randomness()).sum();
        let received: Scalar = outputs.iter().map(|o| o.value_commitment.randomness()).sum();
        let bsk = SigningKey::from_scalar(spent - received);

        let bvk = binding_verification_key(
            spends.iter().map(|s| &s.public_data().value_commitment),
            notes.iter().map(EncryptedNote::value_commitment),
            fee,
        )
        .ok_or_else(|| PrivacyError::ProvingFailure("undecodable value commitment".into()))?;

        if (randomness_generator() * bsk.scalar()).into_affine() != bvk.point() {
            return Err(PrivacyError::ProvingFailure(
                "value commitments do not balance".into(),
            ));
        }

        self.engine.sign(digest, &bsk)
    }
}

/// A transaction whose change always returns to the spender
#[derive(Debug, Clone)]
pub struct SimpleTransaction<E: ProvingEngine = ReferenceEngine> {
    inner: ProposedTransaction<E>,
    intended_fee: u64,
}

impl SimpleTransaction {
    pub fn new(spender_key: SpendingKey, intended_fee: u64) -> Self {
        Self {
            inner: ProposedTransaction::new(spender_key),
            intended_fee,
        }
    }
}

impl<E: ProvingEngine> SimpleTransaction<E> {
    pub fn with_engine(spender_key: SpendingKey, intended_fee: u64, engine: E) -> Self {
        Self {
            inner: ProposedTransaction::with_engine(spender_key, engine),
            intended_fee,
        }
    }

    pub fn spend<W: MerkleWitness + ?Sized>(&mut self, note: Note, witness: &W) -> Result<BindingRef> {
        self.inner.spend(note, witness)
    }

    pub fn receive(&mut self, note: Note) -> Result<BindingRef> {
        self.inner.receive(note)
    }

    pub fn post(&self) -> Result<FinalizedTransaction> {
        let change = self.inner.spender_key().public_address();
        self.inner.post(Some(change), self.intended_fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ShieldedKeyBundle;
    use crate::merkle::{NoteTree, WitnessNode, WitnessSide};
    use crate::proving::{OutputProof, OutputPublicData, SpendProof, SpendPublicData};
    use crate::signature::VerificationKey;

    /// Reference engine that proves outputs without checking their `cv`
    #[derive(Debug, Clone, Copy, Default)]
    struct UncheckedOutputs;

    impl ProvingEngine for UncheckedOutputs {
        fn prove(&self, circuit: &SpendCircuit<'_>) -> Result<(SpendProof, SpendPublicData)> {
            ReferenceEngine.prove(circuit)
        }

        fn verify(&self, proof: &SpendProof, public: &SpendPublicData) -> bool {
            ReferenceEngine.verify(proof, public)
        }

        fn prove_output(
            &self,
            circuit: &OutputCircuit<'_>,
        ) -> Result<(OutputProof, OutputPublicData)> {
            Ok(ReferenceEngine::output_proof_unchecked(circuit))
        }

        fn verify_output(&self, proof: &OutputProof, public: &OutputPublicData) -> bool {
            ReferenceEngine.verify_output(proof, public)
        }

        fn sign(&self, digest: &[u8], key: &SigningKey) -> Result<Signature> {
            ReferenceEngine.sign(digest, key)
        }

        fn verify_signature(&self, digest: &[u8], key: &VerificationKey, sig: &Signature) -> bool {
            ReferenceEngine.verify_signature(digest, key, sig)
        }
    }

    /// Output whose `cv` commits to `committed` while the note holds `value`
    fn understated_output(owner: PublicAddress, value: u64, committed: u64) -> ProposedOutput {
        ProposedOutput {
            note: Note::new(owner, value, "").unwrap(),
            value_commitment: ValueCommitment::new(committed, &mut rand::thread_rng()),
        }
    }

    fn funded(values: &[u64]) -> (ShieldedKeyBundle, ProposedTransaction) {
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let mut tree = NoteTree::new();
        let mut notes = Vec::new();
        for value in values {
            let note = Note::new(owner.public_address, *value, "").unwrap();
            let position = tree.add(note.commitment().into()).unwrap();
            notes.push((note, position));
        }

        let mut tx = ProposedTransaction::new(owner.spending_key.clone());
        for (note, position) in notes {
            let witness = tree.witness(position).unwrap();
            tx.spend(note, &witness).unwrap();
        }
        (owner, tx)
    }

    #[test]
    fn test_spend_rejects_foreign_note() {
        let (_, mut tx) = funded(&[]);
        let stranger = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let note = Note::new(stranger.public_address, 10, "").unwrap();

        let mut tree = NoteTree::new();
        tree.add(note.commitment().into()).unwrap();
        let witness = tree.witness(0).unwrap();

        assert!(matches!(
            tx.spend(note, &witness),
            Err(PrivacyError::InvalidNote(_))
        ));
        assert_eq!(tx.spends_len(), 0);
    }

    #[test]
    fn test_spend_rejects_malformed_witness() {
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let note = Note::new(owner.public_address, 10, "").unwrap();
        let mut tree = NoteTree::new();
        tree.add(note.commitment().into()).unwrap();
        let witness = tree.witness(0).unwrap();
        let path = witness.authentication_path().to_vec();

        let mut tx = ProposedTransaction::new(owner.spending_key.clone());

        let short = Witness::new(path[..path.len() - 1].to_vec(), 1, witness.root_hash());
        assert!(matches!(
            tx.spend(note.clone(), &short),
            Err(PrivacyError::InvalidWitness(_))
        ));

        // Position 1 in a tree of one leaf
        let mut beyond = path.clone();
        beyond[0] = WitnessNode {
            side: WitnessSide::Right,
            ..beyond[0]
        };
        let beyond = Witness::new(beyond, 1, witness.root_hash());
        assert!(matches!(
            tx.spend(note.clone(), &beyond),
            Err(PrivacyError::InvalidWitness(_))
        ));

        let empty = Witness::new(path, 0, witness.root_hash());
        assert!(matches!(
            tx.spend(note, &empty),
            Err(PrivacyError::InvalidWitness(_))
        ));
        assert_eq!(tx.spends_len(), 0);
    }

    #[test]
    fn test_output_commitment_must_match_note() {
        let (owner, mut tx) = funded(&[100]);
        tx.outputs
            .push(understated_output(owner.public_address, 1_000_000, 100));

        assert!(matches!(
            tx.finalize(&tx.outputs, 0),
            Err(PrivacyError::ProvingFailure(_))
        ));
    }

    #[test]
    fn test_understated_output_fails_verification() {
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let note = Note::new(owner.public_address, 100, "").unwrap();
        let mut tree = NoteTree::new();
        tree.add(note.commitment().into()).unwrap();

        let mut tx = ProposedTransaction::with_engine(owner.spending_key.clone(), UncheckedOutputs);
        tx.spend(note, &tree.witness(0).unwrap()).unwrap();
        tx.outputs
            .push(understated_output(owner.public_address, 1_000_000, 100));

        // The cv points balance, so only the output proof catches it
        let posted = tx.finalize(&tx.outputs, 0).unwrap();
        let decoded = FinalizedTransaction::from_bytes(&posted.to_bytes()).unwrap();
        assert!(!posted.verify());
        assert!(!decoded.verify());
        assert!(!decoded.verify_with(&UncheckedOutputs));
        assert!(decoded
            .get_note(0)
            .unwrap()
            .decrypt_note_for_owner(&owner.incoming_view_key)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_understated_miners_fee_fails_verification() {
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let mut tx = ProposedTransaction::with_engine(owner.spending_key.clone(), UncheckedOutputs);
        tx.outputs
            .push(understated_output(owner.public_address, 1_000_000, 1));

        let posted = tx.finalize(&tx.outputs, -1).unwrap();
        assert!(posted.is_miners_fee());
        assert!(!posted.verify());
    }

    #[test]
    fn test_zero_value_miners_fee() {
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let mut tx = ProposedTransaction::new(owner.spending_key.clone());
        tx.receive(Note::new(owner.public_address, 0, "").unwrap())
            .unwrap();

        let posted = tx.post_miners_fee().unwrap();
        assert_eq!(posted.fee(), 0);
        assert!(posted.is_miners_fee());
        assert!(posted.verify());
    }

    #[test]
    fn test_change_requires_address() {
        let (_, tx) = funded(&[100]);
        assert!(matches!(
            tx.post(None, 10),
            Err(PrivacyError::UnbalancedTransaction(_))
        ));
    }

    #[test]
    fn test_exact_spend_needs_no_change_address() {
        let (owner, mut tx) = funded(&[100]);
        tx.receive(Note::new(owner.public_address, 90, "").unwrap())
            .unwrap();

        let posted = tx.post(None, 10).unwrap();
        assert_eq!(posted.notes_len(), 1);
        assert_eq!(posted.fee(), 10);
        assert!(posted.verify());
    }

    #[test]
    fn test_fee_above_max_rejected() {
        let (_, tx) = funded(&[1]);
        assert!(matches!(
            tx.post(None, MAX_NOTE_VALUE + 1),
            Err(PrivacyError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_failed_post_leaves_builder_usable() {
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let mut tree = NoteTree::new();
        let first = Note::new(owner.public_address, 40, "").unwrap();
        let second = Note::new(owner.public_address, 60, "").unwrap();
        tree.add(first.commitment().into()).unwrap();
        tree.add(second.commitment().into()).unwrap();

        let mut tx = ProposedTransaction::new(owner.spending_key.clone());
        tx.spend(first, &tree.witness(0).unwrap()).unwrap();
        tx.receive(Note::new(owner.public_address, 90, "").unwrap())
            .unwrap();
        assert!(tx.post(None, 0).is_err());

        tx.spend(second, &tree.witness(1).unwrap()).unwrap();
        let posted = tx.post(Some(owner.public_address), 0).unwrap();
        assert_eq!(posted.notes_len(), 2);
        assert!(posted.verify());
    }

    #[test]
    fn test_simple_transaction_returns_change_to_spender() {
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let recipient = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let note = Note::new(owner.public_address, 50, "").unwrap();
        let mut tree = NoteTree::new();
        tree.add(note.commitment().into()).unwrap();

        let mut tx = SimpleTransaction::new(owner.spending_key.clone(), 2);
        tx.spend(note, &tree.witness(0).unwrap()).unwrap();
        tx.receive(Note::new(recipient.public_address, 20, "").unwrap())
            .unwrap();

        let posted = tx.post().unwrap();
        assert!(posted.verify());

        let change = posted
            .get_note(1)
            .unwrap()
            .decrypt_note_for_owner(&owner.incoming_view_key)
            .unwrap()
            .expect("change note belongs to the spender");
        assert_eq!(change.value(), 28);
    }

    #[test]
    fn test_binding_refs_are_distinct() {
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());
        let mut tx = ProposedTransaction::new(owner.spending_key.clone());
        let a = tx
            .receive(Note::new(owner.public_address, 5, "").unwrap())
            .unwrap();
        let b = tx
            .receive(Note::new(owner.public_address, 5, "").unwrap())
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 64);
    }
}
