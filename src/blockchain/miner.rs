use log::{info, warn};
use tokio::task::JoinHandle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::block::Block;
use super::chain::{Blockchain, LedgerError};
use super::crypto::Address;

/// Shared flag asking a running proof of work search to stop
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new unset flag
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal the search to stop. Once raised the flag stays raised.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn as_atomic(&self) -> &AtomicBool {
        &self.0
    }
}

/// A mining run executing on the blocking thread pool
#[derive(Debug)]
pub struct MiningHandle {
    cancel: CancelFlag,
    task: JoinHandle<Result<Block, LedgerError>>,
}

impl MiningHandle {
    /// Ask the search to stop; the ledger is left as it was before the run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to end
    pub async fn join(self) -> Result<Block, LedgerError> {
        flatten(self.task.await)
    }

    /// Wait for the run, cancelling it once `limit` has elapsed
    ///
    /// A block found while the cancellation is being delivered is still
    /// returned.
    pub async fn join_timeout(mut self, limit: Duration) -> Result<Block, LedgerError> {
        match tokio::time::timeout(limit, &mut self.task).await {
            Ok(result) => flatten(result),
            Err(_) => {
                warn!("Mining exceeded {:?}, cancelling", limit);
                self.cancel.cancel();

                match flatten(self.task.await) {
                    Err(LedgerError::MiningCancelled) => {
                        Err(LedgerError::MiningTimedOut(limit))
                    }
                    other => other,
                }
            }
        }
    }
}

fn flatten(
    result: Result<Result<Block, LedgerError>, tokio::task::JoinError>,
) -> Result<Block, LedgerError> {
    result.map_err(|e| LedgerError::MiningAborted(e.to_string()))?
}

/// Starts mining the ledger's pending transactions in the background
///
/// Must be called from within a tokio runtime.
pub fn spawn_mining(blockchain: Blockchain, reward_address: Address) -> MiningHandle {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();

    info!(
        "Starting background mining on ledger {} for {}",
        blockchain.id(),
        reward_address
    );

    let task = tokio::task::spawn_blocking(move || {
        blockchain.mine_pending_transactions_cancellable(&reward_address, &flag)
    });

    MiningHandle { cancel, task }
}
