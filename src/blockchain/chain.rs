use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard, RwLock};
use thiserror::Error;
use uuid::Uuid;

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::block::Block;
use super::crypto::Address;
use super::miner::CancelFlag;
use super::transaction::{Transaction, TransactionError};
use crate::config::LedgerConfig;

/// Fixed creation time of the genesis block, so its hash is reproducible.
pub const GENESIS_TIMESTAMP: i64 = 1_231_006_505;

/// Previous-hash marker of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// A SHA-256 hex digest has 64 characters, so no harder target can be met.
pub const MAX_DIFFICULTY: usize = 64;

/// How often a queued cancellable run rechecks its cancel flag.
const MINING_LOCK_POLL: Duration = Duration::from_millis(10);

pub const DEFAULT_DIFFICULTY: usize = 2;
pub const DEFAULT_MINING_REWARD: i64 = 100;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Transaction must include from and to address")]
    MissingAddress,

    #[error("Cannot add invalid transaction to chain")]
    InvalidSignature,

    #[error("Transaction amount should be higher than 0")]
    NonPositiveAmount,

    #[error("Difficulty must be at most {max}, got {got}")]
    InvalidDifficulty { max: usize, got: usize },

    #[error("Mining was cancelled")]
    MiningCancelled,

    #[error("Mining did not finish within {0:?}")]
    MiningTimedOut(Duration),

    #[error("Mining task aborted: {0}")]
    MiningAborted(String),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// The ledger: an append-only chain of blocks plus the pool of pending transfers
///
/// Clones share the same chain, pool and settings.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// Identifier of this ledger instance
    id: Uuid,

    /// The chain of blocks
    chain: Arc<RwLock<Vec<Block>>>,

    /// Pending transactions to be included in the next block
    pending_transactions: Arc<Mutex<Vec<Transaction>>>,

    /// Held for the whole proof of work search
    mining_lock: Arc<Mutex<()>>,

    /// Mining difficulty (number of leading zeros required in hash)
    difficulty: Arc<AtomicUsize>,

    /// Mining reward
    mining_reward: Arc<AtomicI64>,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block and default settings
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD)
    }

    /// Creates a new blockchain using the ledger section of the configuration
    pub fn with_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        check_difficulty(config.difficulty)?;
        Ok(Self::with_settings(config.difficulty, config.mining_reward))
    }

    fn with_settings(difficulty: usize, mining_reward: i64) -> Self {
        let blockchain = Blockchain {
            id: Uuid::new_v4(),
            chain: Arc::new(RwLock::new(vec![Self::create_genesis_block()])),
            pending_transactions: Arc::new(Mutex::new(Vec::new())),
            mining_lock: Arc::new(Mutex::new(())),
            difficulty: Arc::new(AtomicUsize::new(difficulty)),
            mining_reward: Arc::new(AtomicI64::new(mining_reward)),
        };

        debug!(
            "Created ledger {} (difficulty {}, reward {})",
            blockchain.id, difficulty, mining_reward
        );

        blockchain
    }

    /// Creates the genesis block (first block in the chain)
    pub fn create_genesis_block() -> Block {
        Block::new(
            0,
            GENESIS_TIMESTAMP,
            Vec::new(),
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty.load(Ordering::SeqCst)
    }

    /// Changes the difficulty used by the next mining run
    pub fn set_difficulty(&self, difficulty: usize) -> Result<(), LedgerError> {
        check_difficulty(difficulty)?;
        self.difficulty.store(difficulty, Ordering::SeqCst);
        info!("Ledger {} difficulty set to {}", self.id, difficulty);
        Ok(())
    }

    pub fn mining_reward(&self) -> i64 {
        self.mining_reward.load(Ordering::SeqCst)
    }

    /// Changes the reward paid by the next mined block
    pub fn set_mining_reward(&self, reward: i64) {
        self.mining_reward.store(reward, Ordering::SeqCst);
        info!("Ledger {} mining reward set to {}", self.id, reward);
    }

    /// Gets the last block in the chain
    pub fn get_latest_block(&self) -> Block {
        let chain = self.chain.read();
        // The chain always holds at least the genesis block
        chain[chain.len() - 1].clone()
    }

    /// Gets a block by its index
    pub fn get_block(&self, index: u64) -> Option<Block> {
        let index = usize::try_from(index).ok()?;
        self.chain.read().get(index).cloned()
    }

    /// Adds a signed transaction to the pending transactions
    ///
    /// # Arguments
    ///
    /// * `transaction` - The transaction to add
    pub fn add_transaction(&self, transaction: Transaction) -> Result<(), LedgerError> {
        let has_sender = transaction
            .from_address
            .as_ref()
            .is_some_and(|address| !address.is_empty());

        if !has_sender || transaction.to_address.is_empty() {
            return Err(LedgerError::MissingAddress);
        }

        if !transaction.is_valid()? {
            warn!("Rejected transaction {} with a bad signature", transaction.id);
            return Err(LedgerError::InvalidSignature);
        }

        if transaction.amount <= 0 {
            return Err(LedgerError::NonPositiveAmount);
        }

        debug!(
            "Transaction {} admitted to ledger {}",
            transaction.id, self.id
        );
        self.pending_transactions.lock().push(transaction);

        Ok(())
    }

    /// Mines the pending transactions into a new block, paying the reward
    /// to `reward_address`
    ///
    /// Blocks until a valid nonce is found.
    pub fn mine_pending_transactions(&self, reward_address: &Address) -> Block {
        let _mining = self.mining_lock.lock();

        let (mut block, packaged) = self.package_pending(reward_address);
        block.mine(self.difficulty());
        self.append_block(block, packaged)
    }

    /// Mines the pending transactions, giving up when `cancel` is raised
    ///
    /// A cancelled run leaves both the chain and the pending pool untouched,
    /// including one still queued behind another miner.
    pub fn mine_pending_transactions_cancellable(
        &self,
        reward_address: &Address,
        cancel: &CancelFlag,
    ) -> Result<Block, LedgerError> {
        let Some(_mining) = self.lock_mining(cancel) else {
            warn!("Mining on ledger {} cancelled while waiting for another run", self.id);
            return Err(LedgerError::MiningCancelled);
        };

        let (mut block, packaged) = self.package_pending(reward_address);
        if !block.mine_until(self.difficulty(), cancel.as_atomic()) {
            warn!("Mining of block {} cancelled, pool left untouched", block.index);
            return Err(LedgerError::MiningCancelled);
        }

        Ok(self.append_block(block, packaged))
    }

    /// Waits for the mining lock, giving up once `cancel` is raised
    fn lock_mining(&self, cancel: &CancelFlag) -> Option<MutexGuard<'_, ()>> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            if let Some(guard) = self.mining_lock.try_lock_for(MINING_LOCK_POLL) {
                return Some(guard);
            }
        }
    }

    /// Builds the next unmined block from a snapshot of the pool plus a
    /// reward transaction. Returns it with the number of pooled
    /// transactions it took.
    fn package_pending(&self, reward_address: &Address) -> (Block, usize) {
        let reward = Transaction::new_reward(reward_address.clone(), self.mining_reward());

        let mut transactions = self.pending_transactions.lock().clone();
        let packaged = transactions.len();
        transactions.push(reward);

        let latest = self.get_latest_block();
        let block = Block::new(
            latest.index + 1,
            Utc::now().timestamp(),
            transactions,
            latest.hash,
        );

        (block, packaged)
    }

    fn append_block(&self, block: Block, packaged: usize) -> Block {
        {
            let mut chain = self.chain.write();
            let mut pending = self.pending_transactions.lock();

            chain.push(block.clone());
            // Only the packaged prefix leaves the pool; later arrivals stay pending
            pending.drain(..packaged);
        }

        info!(
            "Block {} successfully mined with {} transactions",
            block.index,
            block.transactions.len()
        );

        block
    }

    /// Gets the balance of an address by scanning the whole chain
    ///
    /// Summed as `i128` so that any number of admitted `i64` amounts fits.
    pub fn get_balance_of_address(&self, address: &Address) -> i128 {
        let chain = self.chain.read();
        let mut balance: i128 = 0;

        for block in chain.iter() {
            for transaction in &block.transactions {
                if transaction.from_address.as_ref() == Some(address) {
                    balance -= i128::from(transaction.amount);
                }

                if &transaction.to_address == address {
                    balance += i128::from(transaction.amount);
                }
            }
        }

        balance
    }

    /// Gets every transaction sent or received by an address, in chain order
    pub fn get_all_transactions_for_wallet(&self, address: &Address) -> Vec<Transaction> {
        self.chain
            .read()
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|transaction| transaction.involves(address))
            .cloned()
            .collect()
    }

    /// Gets the entire blockchain
    pub fn get_chain(&self) -> Vec<Block> {
        self.chain.read().clone()
    }

    /// Gets the number of blocks in the chain
    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    /// Gets all pending transactions
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.pending_transactions.lock().clone()
    }

    /// Validates the blockchain
    ///
    /// # Returns
    ///
    /// true if the blockchain is valid, false otherwise
    pub fn is_chain_valid(&self) -> bool {
        let chain = self.chain.read();

        if chain[0].hash != Self::create_genesis_block().hash {
            warn!("Genesis block of ledger {} has been tampered with", self.id);
            return false;
        }

        for i in 1..chain.len() {
            let current_block = &chain[i];
            let previous_block = &chain[i - 1];

            if !current_block.has_valid_transactions() {
                warn!("Block {} holds an invalid transaction", current_block.index);
                return false;
            }

            // Check if the hash is correct
            if current_block.hash != current_block.calculate_hash() {
                warn!("Block {} hash does not match its contents", current_block.index);
                return false;
            }

            // Check if the previous hash is correct
            if current_block.previous_hash != previous_block.calculate_hash() {
                warn!("Block {} is not linked to its predecessor", current_block.index);
                return false;
            }
        }

        true
    }

    /// Runs `f` with mutable access to the chain
    #[cfg(test)]
    pub(crate) fn with_chain_mut<R>(&self, f: impl FnOnce(&mut Vec<Block>) -> R) -> R {
        f(&mut self.chain.write())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

fn check_difficulty(difficulty: usize) -> Result<(), LedgerError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(LedgerError::InvalidDifficulty {
            max: MAX_DIFFICULTY,
            got: difficulty,
        });
    }
    Ok(())
}
