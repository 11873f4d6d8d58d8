//! In-memory walkthrough
//!
//! Mints a note for Alice, records it in a [`NoteTree`], has Alice pay Bob
//! with change and a fee through the [`PostingService`], then verifies the
//! transfer and decrypts every output for its owner and for Alice.

use anyhow::Context;
use shroud_config::ShroudConfig;
use shroud_privacy::{
    MerkleWitness, Note, NoteTree, PostingService, ProposedTransaction, ShieldedKeyBundle,
};

const MINTED: u64 = 100;
const PAYMENT: u64 = 60;

pub async fn run(config: &ShroudConfig) -> anyhow::Result<()> {
    let alice = ShieldedKeyBundle::random(&mut rand::thread_rng());
    let bob = ShieldedKeyBundle::random(&mut rand::thread_rng());
    let fee = config.transaction.default_fee;

    println!("👤 Alice: {}", alice.public_address);
    println!("👤 Bob:   {}", bob.public_address);

    let service: PostingService = PostingService::start(config.prover.queue_depth);

    // 1. Mint
    let mut mint = ProposedTransaction::new(alice.spending_key.clone());
    mint.receive(Note::new(alice.public_address, MINTED, "block reward")?)?;
    let minted = service.post_miners_fee(mint).await?;
    anyhow::ensure!(minted.verify(), "minted transaction failed verification");
    println!("⛏️  Minted {} to Alice (fee {})", MINTED, minted.fee());

    let mut tree = NoteTree::new();
    let reward = minted.get_note(0)?;
    let position = tree.add(reward.merkle_hash())?;
    let note = reward
        .decrypt_note_for_owner(&alice.incoming_view_key)?
        .context("Alice cannot read her own reward")?;
    let witness = tree
        .witness(position)
        .context("witness for the minted note")?;
    println!(
        "🌳 Note at position {} (tree size {})",
        witness.position(),
        witness.tree_size()
    );

    // 2. Transfer
    let mut transfer = ProposedTransaction::new(alice.spending_key.clone());
    transfer.spend(note, &witness)?;
    transfer.receive(Note::new(bob.public_address, PAYMENT, "for the coffee")?)?;
    println!("⏳ Posting transfer of {} to Bob...", PAYMENT);
    let posted = service
        .post(transfer, Some(alice.public_address), fee)
        .await?;

    // 3. Verify
    anyhow::ensure!(posted.verify(), "transfer failed verification");
    let spend = posted.get_spend(0)?;
    anyhow::ensure!(
        spend.root_hash == tree.root(),
        "transfer anchors to an unknown root"
    );
    println!(
        "✅ Transfer {} verified: {} spend, {} outputs, fee {}",
        hex::encode(posted.transaction_hash()),
        posted.spends_len(),
        posted.notes_len(),
        posted.fee()
    );
    println!("🚫 Nullifier: {}", hex::encode(spend.nullifier.as_bytes()));

    // 4. Decrypt
    for (index, encrypted) in posted.notes().iter().enumerate() {
        for (name, keys) in [("Alice", &alice), ("Bob", &bob)] {
            if let Some(received) = encrypted.decrypt_note_for_owner(&keys.incoming_view_key)? {
                println!(
                    "📥 {} received note {}: {} ({:?})",
                    name,
                    index,
                    received.value(),
                    received.memo().to_text()
                );
            }
        }
        let sent = encrypted
            .decrypt_note_for_spender(&alice.outgoing_view_key)?
            .context("Alice cannot read a note she sent")?;
        println!("📤 Alice sent note {}: {} to {}", index, sent.value(), sent.owner());
    }

    Ok(())
}
