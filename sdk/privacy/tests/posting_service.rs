#![cfg(feature = "async")]

use shroud_privacy::{
    Note, NoteTree, PostingService, ProposedTransaction, ReferenceEngine, ShieldedKeyBundle,
};

#[tokio::test]
async fn posts_concurrently_without_blocking() {
    let service = PostingService::<ReferenceEngine>::start(4);
    let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());

    let mut tree = NoteTree::new();
    let mut proposals = Vec::new();
    for value in [10u64, 20, 30] {
        let note = Note::new(owner.public_address, value, "").unwrap();
        tree.add(note.commitment().into()).unwrap();
        proposals.push(note);
    }

    let mut handles = Vec::new();
    for (position, note) in proposals.into_iter().enumerate() {
        let mut tx = ProposedTransaction::new(owner.spending_key.clone());
        tx.spend(note, &tree.witness(position as u64).unwrap())
            .unwrap();
        let service = service.clone();
        let change = owner.public_address;
        handles.push(tokio::spawn(async move {
            service.post(tx, Some(change), 1).await
        }));
    }

    for handle in handles {
        let posted = handle.await.unwrap().unwrap();
        assert!(posted.verify());
        assert_eq!(posted.fee(), 1);
    }
}
