use shroud_privacy::{
    FinalizedTransaction, MEMO_SIZE, Note, NoteTree, ProposedTransaction, ShieldedKeyBundle,
};

fn keys() -> ShieldedKeyBundle {
    ShieldedKeyBundle::random(&mut rand::thread_rng())
}

fn transfer() -> FinalizedTransaction {
    let sender = keys();
    let recipient = keys();

    let mut tree = NoteTree::new();
    let note = Note::new(sender.public_address, 100, "salary").unwrap();
    let position = tree.add(note.commitment().into()).unwrap();

    let mut tx = ProposedTransaction::new(sender.spending_key.clone());
    tx.spend(note, &tree.witness(position).unwrap()).unwrap();
    tx.receive(Note::new(recipient.public_address, 60, "lunch").unwrap())
        .unwrap();
    tx.post(Some(sender.public_address), 5).unwrap()
}

#[test]
fn note_roundtrip_keeps_owner_value_memo() {
    let owner = keys().public_address;
    for (value, memo) in [(0u64, ""), (1, "a"), (u32::MAX as u64, "exactly thirty-two bytes long!!!")] {
        let note = Note::new(owner, value, memo).unwrap();
        let decoded = Note::from_bytes(&note.to_bytes()).unwrap();

        assert_eq!(decoded.owner(), owner);
        assert_eq!(decoded.value(), value);
        assert_eq!(decoded.memo(), note.memo());
        assert_eq!(decoded.memo().as_bytes().len(), MEMO_SIZE);
    }
}

#[test]
fn transaction_roundtrip_preserves_verification() {
    let tx = transfer();
    let bytes = tx.to_bytes();
    let decoded = FinalizedTransaction::from_bytes(&bytes).unwrap();

    assert_eq!(decoded, tx);
    assert_eq!(decoded.verify(), tx.verify());
    assert!(decoded.verify());
    assert_eq!(decoded.to_bytes(), bytes);
    assert_eq!(decoded.transaction_hash(), tx.transaction_hash());
    assert_eq!(decoded.transaction_signature(), tx.transaction_signature());
    assert_eq!(decoded.fee(), 5);
}

#[test]
fn outputs_keep_insertion_order() {
    let sender = keys();
    let a = keys();
    let b = keys();

    let mut tree = NoteTree::new();
    let note = Note::new(sender.public_address, 10, "").unwrap();
    tree.add(note.commitment().into()).unwrap();

    let mut tx = ProposedTransaction::new(sender.spending_key.clone());
    tx.spend(note, &tree.witness(0).unwrap()).unwrap();
    tx.receive(Note::new(a.public_address, 3, "").unwrap()).unwrap();
    tx.receive(Note::new(b.public_address, 7, "").unwrap()).unwrap();
    let posted = tx.post(None, 0).unwrap();

    let first = posted.get_note(0).unwrap();
    let second = posted.get_note(1).unwrap();
    assert_eq!(
        first
            .decrypt_note_for_owner(&a.incoming_view_key)
            .unwrap()
            .map(|n| n.value()),
        Some(3)
    );
    assert_eq!(
        second
            .decrypt_note_for_owner(&b.incoming_view_key)
            .unwrap()
            .map(|n| n.value()),
        Some(7)
    );
}
