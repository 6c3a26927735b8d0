// Blockchain module
//
// This module contains the core ledger implementation:
// - Address and signature encoding, wallets and ECDSA helpers
// - Transaction structure
// - Block structure and proof of work search
// - Blockchain (ledger) structure
// - Background mining

pub mod block;
pub mod chain;
pub mod crypto;
pub mod miner;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, LedgerError};
pub use crypto::{Address, CryptoError, DigitalSignature, Wallet};
pub use miner::{spawn_mining, CancelFlag, MiningHandle};
pub use transaction::{Transaction, TransactionError};
