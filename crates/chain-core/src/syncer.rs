//! Block sync state machine (§4.6).
//!
//! Drives `REQ_BLOCK_FORWARD`/`REQ_BLOCK_BACKWARD` requests over the sync
//! channel and waits for `REQ_BLOCK_RESP` replies, which `Chain` routes back
//! in via [`Syncer::add_block_synced`] after decrypting and validating them.
//! Generic over [`ChainHandle`] rather than holding a `Chain` directly (§9).

use crate::chain_handle::{ChainHandle, SyncOutcome};
use crate::errors::SyncerError;
use crate::scheduled_task::ScheduledTask;
use parking_lot::Mutex;
use shared_types::{Block, TrxType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// How long a sync round waits for a response before giving up or, if
/// forward progress was made, declaring the round complete.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// The syncer's current round state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncerState {
    /// Not running a sync round.
    Idle,
    /// Catching up from the known tip forward.
    SyncingForward,
    /// Filling a gap behind a block whose parent is missing.
    SyncingBackward,
    /// The round's response timer fired with no progress made.
    SyncFailed,
    /// Internal: the round just finished, about to return to `Idle`.
    LocalSyncFinished,
}

/// Drives one group's block-sync rounds.
pub struct Syncer<H: ChainHandle> {
    handle: Arc<H>,
    state: Arc<Mutex<SyncerState>>,
    progressed: Arc<AtomicBool>,
    timer: ScheduledTask,
    timeout: Duration,
}

impl<H: ChainHandle + 'static> Syncer<H> {
    /// Build a syncer bound to `handle`, idle until `sync_forward`/`sync_backward`
    /// is called.
    #[must_use]
    pub fn new(handle: Arc<H>) -> Self {
        Self {
            handle,
            state: Arc::new(Mutex::new(SyncerState::Idle)),
            progressed: Arc::new(AtomicBool::new(false)),
            timer: ScheduledTask::new(),
            timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// The current round state.
    #[must_use]
    pub fn state(&self) -> SyncerState {
        *self.state.lock()
    }

    /// True while mid-round or failed-but-not-yet-reset, matching
    /// `ChainHandle::is_syncer_busy` (§9).
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state(),
            SyncerState::SyncingForward | SyncerState::SyncingBackward | SyncerState::SyncFailed
        )
    }

    /// Start a forward-catchup round requesting the block after `top_block_id`.
    #[instrument(name = "syncer", skip(self))]
    pub async fn sync_forward(&self, top_block_id: String) -> Result<(), SyncerError> {
        self.start_round(SyncerState::SyncingForward, TrxType::ReqBlockForward, top_block_id)
            .await
    }

    /// Start a backward-fill round requesting the parent of `block`.
    #[instrument(name = "syncer", skip(self, block), fields(block_id = %block.block_id))]
    pub async fn sync_backward(&self, block: Block) -> Result<(), SyncerError> {
        let reference = block.prev_block_id.clone();
        self.start_round(SyncerState::SyncingBackward, TrxType::ReqBlockBackward, reference)
            .await
    }

    async fn start_round(
        &self,
        next_state: SyncerState,
        trx_type: TrxType,
        reference_block_id: String,
    ) -> Result<(), SyncerError> {
        {
            let mut state = self.state.lock();
            if *state != SyncerState::Idle {
                return Err(SyncerError::AlreadySyncing);
            }
            *state = next_state;
        }
        self.progressed.store(false, Ordering::SeqCst);
        self.request(trx_type, &reference_block_id).await?;
        self.arm_timeout();
        Ok(())
    }

    async fn request(&self, trx_type: TrxType, reference_block_id: &str) -> Result<(), SyncerError> {
        let trx_mgr = self.handle.get_sync_trx_mgr().await;
        trx_mgr
            .publish_trx(trx_type, reference_block_id.as_bytes())
            .await
            .map_err(|e| SyncerError::PublishFailed(e.to_string()))?;
        Ok(())
    }

    fn arm_timeout(&self) {
        let state = self.state.clone();
        let progressed = self.progressed.clone();
        self.timer.reset(self.timeout, move || {
            let mut guard = state.lock();
            if !matches!(*guard, SyncerState::SyncingForward | SyncerState::SyncingBackward) {
                return;
            }
            *guard = if progressed.load(Ordering::SeqCst) {
                SyncerState::LocalSyncFinished
            } else {
                SyncerState::SyncFailed
            };
            if *guard == SyncerState::LocalSyncFinished {
                *guard = SyncerState::Idle;
            }
        });
    }

    /// Reset a failed or finished round back to idle, allowing a fresh
    /// `sync_forward`/`sync_backward` call.
    pub fn reset(&self) {
        self.timer.cancel();
        *self.state.lock() = SyncerState::Idle;
    }

    /// Handle a `REQ_BLOCK_RESP` block delivered for the in-flight round.
    /// Stray responses received while idle (duplicate delivery, a response
    /// to a round that already timed out) are dropped silently.
    #[instrument(name = "syncer", skip(self, block), fields(block_id = %block.block_id))]
    pub async fn add_block_synced(&self, block: Block) -> Result<(), SyncerError> {
        if !self.is_busy() {
            warn!(block_id = %block.block_id, "dropping sync response outside an active round");
            return Ok(());
        }

        let outcome = self
            .handle
            .add_synced_block(block)
            .await
            .map_err(|e| SyncerError::PublishFailed(e.to_string()))?;
        self.progressed.store(true, Ordering::SeqCst);

        match outcome {
            SyncOutcome::Done => {
                self.timer.cancel();
                *self.state.lock() = SyncerState::Idle;
            }
            SyncOutcome::Continue {
                next_reference_block_id,
            } => {
                let trx_type = match self.state() {
                    SyncerState::SyncingBackward => TrxType::ReqBlockBackward,
                    _ => TrxType::ReqBlockForward,
                };
                self.request(trx_type, &next_reference_block_id).await?;
                self.arm_timeout();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trx_mgr::TrxMgr;
    use async_trait::async_trait;
    use keystore::{InMemoryKeystore, KeyPurpose};
    use pubsub_conn::{InMemoryPubSubConn, PubSubHub};
    use shared_crypto::CipherKey;
    use shared_types::ChainError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    struct MockHandle {
        sync_trx_mgr: Arc<TrxMgr>,
        synced_blocks: StdMutex<Vec<Block>>,
        next_outcome: StdMutex<Vec<SyncOutcome>>,
        add_synced_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainHandle for MockHandle {
        fn group_id(&self) -> &str {
            "g1"
        }
        fn node_version(&self) -> u16 {
            1
        }
        fn user_sign_pubkey(&self) -> &str {
            "user-pub"
        }
        async fn get_user_trx_mgr(&self) -> Arc<TrxMgr> {
            self.sync_trx_mgr.clone()
        }
        async fn get_sync_trx_mgr(&self) -> Arc<TrxMgr> {
            self.sync_trx_mgr.clone()
        }
        async fn get_producer_trx_mgr(&self) -> Arc<TrxMgr> {
            self.sync_trx_mgr.clone()
        }
        async fn upd_chain_info(&self, _height: i64, _block_id: &str) -> Result<(), ChainError> {
            Ok(())
        }
        async fn upd_producer_list(&self) -> Result<(), ChainError> {
            Ok(())
        }
        async fn create_consensus(&self) -> Result<(), ChainError> {
            Ok(())
        }
        fn is_syncer_busy(&self) -> bool {
            false
        }
        async fn sync_backward(&self, _block: Block) -> Result<(), ChainError> {
            Ok(())
        }
        async fn add_synced_block(&self, block: Block) -> Result<SyncOutcome, ChainError> {
            self.add_synced_calls.fetch_add(1, Ordering::SeqCst);
            self.synced_blocks.lock().unwrap().push(block);
            let mut queue = self.next_outcome.lock().unwrap();
            Ok(if queue.is_empty() {
                SyncOutcome::Done
            } else {
                queue.remove(0)
            })
        }
    }

    struct NoopInbound;

    #[async_trait]
    impl crate::inbound::ChainInbound for NoopInbound {
        async fn handle_trx(&self, _trx: shared_types::Trx) {}
        async fn handle_block(&self, _block: Block) {}
    }

    fn new_trx_mgr() -> Arc<TrxMgr> {
        let hub = PubSubHub::new();
        let pubsub: Arc<dyn pubsub_conn::PubSubConn> = Arc::new(InMemoryPubSubConn::new(hub));
        let keystore = Arc::new(InMemoryKeystore::new());
        keystore.new_key("g1-sign", KeyPurpose::Sign, "").unwrap();
        let inbound: Arc<dyn crate::inbound::ChainInbound> = Arc::new(NoopInbound);
        Arc::new(TrxMgr::new(
            "sync_channel_g1_user-pub",
            "g1",
            1,
            "g1-sign",
            "user-pub",
            CipherKey::generate(),
            pubsub,
            keystore,
            Arc::downgrade(&inbound),
        ))
    }

    fn block(id: &str, prev: &str) -> Block {
        Block {
            block_id: id.into(),
            producer_pubkey: "prod".into(),
            prev_block_id: prev.into(),
            trxs: vec![],
            producer_sign: vec![],
        }
    }

    #[tokio::test]
    async fn sync_backward_transitions_to_syncing_backward_and_publishes_request() {
        let handle = Arc::new(MockHandle {
            sync_trx_mgr: new_trx_mgr(),
            synced_blocks: StdMutex::new(vec![]),
            next_outcome: StdMutex::new(vec![]),
            add_synced_calls: AtomicUsize::new(0),
        });
        let syncer = Syncer::new(handle);

        assert_eq!(syncer.state(), SyncerState::Idle);
        syncer.sync_backward(block("b5", "b4")).await.unwrap();
        assert_eq!(syncer.state(), SyncerState::SyncingBackward);
        assert!(syncer.is_busy());
    }

    #[tokio::test]
    async fn cannot_start_a_round_while_already_busy() {
        let handle = Arc::new(MockHandle {
            sync_trx_mgr: new_trx_mgr(),
            synced_blocks: StdMutex::new(vec![]),
            next_outcome: StdMutex::new(vec![]),
            add_synced_calls: AtomicUsize::new(0),
        });
        let syncer = Syncer::new(handle);
        syncer.sync_forward("tip".into()).await.unwrap();

        let err = syncer.sync_forward("tip2".into()).await.unwrap_err();
        assert_eq!(err, SyncerError::AlreadySyncing);
    }

    #[tokio::test]
    async fn add_block_synced_done_returns_to_idle() {
        let handle = Arc::new(MockHandle {
            sync_trx_mgr: new_trx_mgr(),
            synced_blocks: StdMutex::new(vec![]),
            next_outcome: StdMutex::new(vec![]),
            add_synced_calls: AtomicUsize::new(0),
        });
        let syncer = Syncer::new(handle.clone());
        syncer.sync_backward(block("b5", "b4")).await.unwrap();

        syncer.add_block_synced(block("b4", "b3")).await.unwrap();
        assert_eq!(syncer.state(), SyncerState::Idle);
        assert_eq!(handle.add_synced_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn add_block_synced_continue_requests_the_next_block() {
        let handle = Arc::new(MockHandle {
            sync_trx_mgr: new_trx_mgr(),
            synced_blocks: StdMutex::new(vec![]),
            next_outcome: StdMutex::new(vec![SyncOutcome::Continue {
                next_reference_block_id: "b3".into(),
            }]),
            add_synced_calls: AtomicUsize::new(0),
        });
        let syncer = Syncer::new(handle.clone());
        syncer.sync_backward(block("b5", "b4")).await.unwrap();

        syncer.add_block_synced(block("b4", "b3")).await.unwrap();
        assert_eq!(syncer.state(), SyncerState::SyncingBackward);
    }

    #[tokio::test]
    async fn stray_response_while_idle_is_dropped() {
        let handle = Arc::new(MockHandle {
            sync_trx_mgr: new_trx_mgr(),
            synced_blocks: StdMutex::new(vec![]),
            next_outcome: StdMutex::new(vec![]),
            add_synced_calls: AtomicUsize::new(0),
        });
        let syncer = Syncer::new(handle.clone());

        syncer.add_block_synced(block("b1", "b0")).await.unwrap();
        assert_eq!(handle.add_synced_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_progress_marks_sync_failed() {
        let handle = Arc::new(MockHandle {
            sync_trx_mgr: new_trx_mgr(),
            synced_blocks: StdMutex::new(vec![]),
            next_outcome: StdMutex::new(vec![]),
            add_synced_calls: AtomicUsize::new(0),
        });
        let syncer = Syncer::new(handle);
        syncer.sync_forward("tip".into()).await.unwrap();

        tokio::time::advance(DEFAULT_RESPONSE_TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(syncer.state(), SyncerState::SyncFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_after_progress_returns_to_idle() {
        let handle = Arc::new(MockHandle {
            sync_trx_mgr: new_trx_mgr(),
            synced_blocks: StdMutex::new(vec![]),
            next_outcome: StdMutex::new(vec![SyncOutcome::Continue {
                next_reference_block_id: "tip2".into(),
            }]),
            add_synced_calls: AtomicUsize::new(0),
        });
        let syncer = Syncer::new(handle);
        syncer.sync_forward("tip".into()).await.unwrap();
        syncer.add_block_synced(block("tip2", "tip")).await.unwrap();

        tokio::time::advance(DEFAULT_RESPONSE_TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(syncer.state(), SyncerState::Idle);
    }
}
