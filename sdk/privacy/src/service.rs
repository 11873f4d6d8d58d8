//! Posting service
//!
//! Proving is CPU-bound and can take seconds per spend. The service runs it
//! on a dedicated thread fed by a bounded channel so async callers never
//! block the runtime.

use tokio::sync::{mpsc, oneshot};

use crate::error::{PrivacyError, Result};
use crate::keys::PublicAddress;
use crate::posted::FinalizedTransaction;
use crate::proving::{ProvingEngine, ReferenceEngine};
use crate::transaction::ProposedTransaction;

/// Default channel size
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

enum PostKind {
    Transfer {
        change_goes_to: Option<PublicAddress>,
        intended_fee: u64,
    },
    MinersFee,
}

struct PostRequest<E: ProvingEngine> {
    proposal: ProposedTransaction<E>,
    kind: PostKind,
    reply: oneshot::Sender<Result<FinalizedTransaction>>,
}

/// Handle to the proving thread. Cloning shares the thread.
pub struct PostingService<E: ProvingEngine = ReferenceEngine> {
    request_tx: mpsc::Sender<PostRequest<E>>,
}

impl<E: ProvingEngine> Clone for PostingService<E> {
    fn clone(&self) -> Self {
        Self {
            request_tx: self.request_tx.clone(),
        }
    }
}

impl<E: ProvingEngine + 'static> PostingService<E> {
    /// Start the proving thread. It exits once every handle is dropped.
    pub fn start(queue_depth: usize) -> Self {
        let (request_tx, mut request_rx) = mpsc::channel::<PostRequest<E>>(queue_depth.max(1));

        // Spawn proving thread (separate from tokio runtime for CPU-intensive work)
        std::thread::spawn(move || {
            while let Some(request) = request_rx.blocking_recv() {
                let result = match request.kind {
                    PostKind::Transfer {
                        change_goes_to,
                        intended_fee,
                    } => request.proposal.post(change_goes_to, intended_fee),
                    PostKind::MinersFee => request.proposal.post_miners_fee(),
                };
                if let Err(e) = &result {
                    log::warn!("posting failed: {e}");
                }
                let _ = request.reply.send(result);
            }
            log::debug!("posting service stopped");
        });

        Self { request_tx }
    }

    /// Post `proposal` on the proving thread
    pub async fn post(
        &self,
        proposal: ProposedTransaction<E>,
        change_goes_to: Option<PublicAddress>,
        intended_fee: u64,
    ) -> Result<FinalizedTransaction> {
        self.submit(
            proposal,
            PostKind::Transfer {
                change_goes_to,
                intended_fee,
            },
        )
        .await
    }

    /// Post a miner's-fee `proposal` on the proving thread
    pub async fn post_miners_fee(
        &self,
        proposal: ProposedTransaction<E>,
    ) -> Result<FinalizedTransaction> {
        self.submit(proposal, PostKind::MinersFee).await
    }

    async fn submit(
        &self,
        proposal: ProposedTransaction<E>,
        kind: PostKind,
    ) -> Result<FinalizedTransaction> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.request_tx
            .send(PostRequest {
                proposal,
                kind,
                reply: reply_tx,
            })
            .await
            .map_err(|_| PrivacyError::ProvingFailure("posting service unavailable".into()))?;

        reply_rx
            .await
            .map_err(|_| PrivacyError::ProvingFailure("posting thread crashed".into()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ShieldedKeyBundle;
    use crate::merkle::NoteTree;
    use crate::note::Note;

    #[tokio::test]
    async fn test_post_miners_fee() {
        let service = PostingService::<ReferenceEngine>::start(DEFAULT_QUEUE_DEPTH);
        let miner = ShieldedKeyBundle::random(&mut rand::thread_rng());

        let mut proposal = ProposedTransaction::new(miner.spending_key.clone());
        proposal
            .receive(Note::new(miner.public_address, 20, "reward").unwrap())
            .unwrap();

        let posted = service.post_miners_fee(proposal).await.unwrap();
        assert_eq!(posted.fee(), -20);
        assert!(posted.verify());
    }

    #[tokio::test]
    async fn test_post_transfer_and_errors() {
        let service = PostingService::<ReferenceEngine>::start(1);
        let owner = ShieldedKeyBundle::random(&mut rand::thread_rng());

        let note = Note::new(owner.public_address, 30, "").unwrap();
        let mut tree = NoteTree::new();
        tree.add(note.commitment().into()).unwrap();

        let mut proposal = ProposedTransaction::new(owner.spending_key.clone());
        proposal.spend(note, &tree.witness(0).unwrap()).unwrap();

        let short = service.post(proposal.clone(), None, 31).await;
        assert!(matches!(short, Err(PrivacyError::UnbalancedTransaction(_))));

        let posted = service
            .post(proposal, Some(owner.public_address), 1)
            .await
            .unwrap();
        assert_eq!(posted.notes_len(), 1);
        assert!(posted.verify());
    }
}
