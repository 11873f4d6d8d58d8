use shroud_privacy::{EncryptedNote, Note, ShieldedKeyBundle};

fn keys() -> ShieldedKeyBundle {
    ShieldedKeyBundle::random(&mut rand::thread_rng())
}

#[test]
fn wrong_incoming_key_yields_no_note() {
    let sender = keys();
    let a = keys();
    let b = keys();

    let note = Note::new(a.public_address, 11, "for a").unwrap();
    let encrypted = EncryptedNote::new(&note, &sender.outgoing_view_key);

    assert_eq!(
        encrypted.decrypt_note_for_owner(&a.incoming_view_key).unwrap(),
        Some(note.clone())
    );
    assert_eq!(
        encrypted.decrypt_note_for_owner(&b.incoming_view_key).unwrap(),
        None
    );
    assert_eq!(
        encrypted
            .decrypt_note_for_spender(&sender.outgoing_view_key)
            .unwrap(),
        Some(note)
    );
}

#[test]
fn equality_is_over_ciphertext() {
    let sender = keys();
    let owner = keys();
    let note = Note::new(owner.public_address, 3, "").unwrap();

    let first = EncryptedNote::new(&note, &sender.outgoing_view_key);
    let second = EncryptedNote::new(&note, &sender.outgoing_view_key);

    // Same plaintext, fresh ephemeral key
    assert_ne!(first, second);
    assert_eq!(first.merkle_hash(), second.merkle_hash());
    assert_eq!(first.value_commitment(), second.value_commitment());
    assert_eq!(*first.value_commitment(), note.value_commitment().to_bytes());
    assert_eq!(EncryptedNote::from_bytes(&first.to_bytes()).unwrap(), first);
}
