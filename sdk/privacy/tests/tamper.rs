use shroud_privacy::{
    ENCRYPTED_NOTE_SIZE, FinalizedTransaction, Note, NoteTree, OUTPUT_DESCRIPTION_SIZE,
    OUTPUT_PROOF_SIZE, PrivacyError, ProposedTransaction, ShieldedKeyBundle,
};

const HEADER_SIZE: usize = 25;
const SPEND_PUBLIC_SIZE: usize = 164;
const PROOF_SIZE: usize = 96;
const SIGNATURE_SIZE: usize = 64;

fn one_spend_one_output() -> FinalizedTransaction {
    let sender = ShieldedKeyBundle::random(&mut rand::thread_rng());
    let recipient = ShieldedKeyBundle::random(&mut rand::thread_rng());

    let note = Note::new(sender.public_address, 40, "").unwrap();
    let mut tree = NoteTree::new();
    tree.add(note.commitment().into()).unwrap();

    let mut tx = ProposedTransaction::new(sender.spending_key.clone());
    tx.spend(note, &tree.witness(0).unwrap()).unwrap();
    tx.receive(Note::new(recipient.public_address, 39, "").unwrap())
        .unwrap();
    tx.post(None, 1).unwrap()
}

fn flipped(bytes: &[u8], index: usize) -> Vec<u8> {
    let mut bytes = bytes.to_vec();
    bytes[index] ^= 0x01;
    bytes
}

fn assert_rejected(bytes: &[u8]) {
    match FinalizedTransaction::from_bytes(bytes) {
        Ok(tx) => assert!(!tx.verify()),
        Err(e) => assert!(matches!(e, PrivacyError::MalformedEncoding(_))),
    }
}

#[test]
fn flipped_proof_fails_verification() {
    let bytes = one_spend_one_output().to_bytes();
    let start = HEADER_SIZE + SPEND_PUBLIC_SIZE;
    for index in start..start + PROOF_SIZE {
        assert_rejected(&flipped(&bytes, index));
    }
}

#[test]
fn flipped_signatures_fail_verification() {
    let bytes = one_spend_one_output().to_bytes();

    let auth = HEADER_SIZE + SPEND_PUBLIC_SIZE + PROOF_SIZE;
    for index in auth..auth + SIGNATURE_SIZE {
        assert_rejected(&flipped(&bytes, index));
    }

    let binding = bytes.len() - SIGNATURE_SIZE;
    for index in binding..bytes.len() {
        assert_rejected(&flipped(&bytes, index));
    }
}

#[test]
fn flipped_public_data_fails_verification() {
    let bytes = one_spend_one_output().to_bytes();
    for index in HEADER_SIZE..HEADER_SIZE + SPEND_PUBLIC_SIZE {
        assert_rejected(&flipped(&bytes, index));
    }
}

#[test]
fn flipped_output_fails_verification() {
    let bytes = one_spend_one_output().to_bytes();
    let start = bytes.len() - SIGNATURE_SIZE - OUTPUT_DESCRIPTION_SIZE;
    for index in (start..start + ENCRYPTED_NOTE_SIZE).step_by(7) {
        assert_rejected(&flipped(&bytes, index));
    }
}

#[test]
fn flipped_output_proof_fails_verification() {
    let bytes = one_spend_one_output().to_bytes();
    let start = bytes.len() - SIGNATURE_SIZE - OUTPUT_PROOF_SIZE;
    for index in start..start + OUTPUT_PROOF_SIZE {
        assert_rejected(&flipped(&bytes, index));
    }
}

#[test]
fn fee_change_fails_verification() {
    let tx = one_spend_one_output();
    let mut bytes = tx.to_bytes();
    bytes[17..25].copy_from_slice(&0i64.to_le_bytes());
    assert_rejected(&bytes);
}

#[test]
fn corrupt_framing_is_malformed() {
    let bytes = one_spend_one_output().to_bytes();

    let mut counts = bytes.clone();
    counts[1] = 2;
    assert!(matches!(
        FinalizedTransaction::from_bytes(&counts),
        Err(PrivacyError::MalformedEncoding(_))
    ));

    assert!(matches!(
        FinalizedTransaction::from_bytes(&bytes[..bytes.len() - 1]),
        Err(PrivacyError::MalformedEncoding(_))
    ));

    let mut version = bytes.clone();
    version[0] = 0;
    assert!(matches!(
        FinalizedTransaction::from_bytes(&version),
        Err(PrivacyError::MalformedEncoding(_))
    ));
}
