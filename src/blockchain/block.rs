use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use std::sync::atomic::{AtomicBool, Ordering};

use super::transaction::Transaction;

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Creation time in Unix seconds
    pub timestamp: i64,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Proof of work counter
    pub nonce: u64,

    /// Hash of the current block (calculated)
    pub hash: String,
}

impl Block {
    /// Creates a new, unmined block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `timestamp` - Creation time in Unix seconds
    /// * `transactions` - The list of transactions to include in the block
    /// * `previous_hash` - The hash of the previous block
    pub fn new(
        index: u64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let mut block = Block {
            index,
            previous_hash,
            timestamp,
            transactions,
            nonce: 0,
            hash: String::new(),
        };

        block.hash = block.calculate_hash();
        block
    }

    /// Calculates the SHA-256 hash of `previous_hash ‖ timestamp ‖ transactions ‖ nonce`
    pub fn calculate_hash(&self) -> String {
        self.hash_with_nonce(&self.serialized_transactions(), self.nonce)
    }

    fn hash_with_nonce(&self, transactions: &str, nonce: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.timestamp.to_string().as_bytes());
        hasher.update(transactions.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Canonical JSON of the transaction list, with a debug rendering as fallback
    fn serialized_transactions(&self) -> String {
        serde_json::to_string(&self.transactions)
            .unwrap_or_else(|_| format!("{:?}", self.transactions))
    }

    /// Searches for a nonce whose hash has `difficulty` leading zeros
    pub fn mine(&mut self, difficulty: usize) {
        let never = AtomicBool::new(false);
        self.mine_until(difficulty, &never);
    }

    /// Like [`Block::mine`], but gives up as soon as `cancel` is raised
    ///
    /// Returns false if the search was cancelled. The block then holds the
    /// last nonce tried and its matching hash.
    pub fn mine_until(&mut self, difficulty: usize, cancel: &AtomicBool) -> bool {
        let transactions = self.serialized_transactions();

        while !meets_difficulty(&self.hash, difficulty) {
            if cancel.load(Ordering::Relaxed) {
                debug!("Mining of block {} cancelled at nonce {}", self.index, self.nonce);
                return false;
            }

            self.nonce += 1;
            self.hash = self.hash_with_nonce(&transactions, self.nonce);
        }

        info!("Block mined: {}", self.hash);
        true
    }

    /// Checks every transaction, stopping at the first invalid one
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions
            .iter()
            .all(|transaction| matches!(transaction.is_valid(), Ok(true)))
    }
}

/// Checks that a hash meets the proof of work target
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
