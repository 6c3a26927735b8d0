//! A minimal single-node proof-of-work ledger.
//!
//! Signed value transfers are queued in a pending pool and sealed into
//! blocks by a proof of work search. Balances and history are derived by
//! scanning the chain, and the whole chain can be re-verified at any time.
//!
//! ```no_run
//! use powledger::blockchain::{Address, Blockchain, Transaction, Wallet};
//!
//! let ledger = Blockchain::new();
//! let wallet = Wallet::new();
//!
//! let mut tx = Transaction::new(wallet.address().clone(), Address::from("bob"), 10);
//! tx.sign(wallet.secret_key()).unwrap();
//! ledger.add_transaction(tx).unwrap();
//!
//! ledger.mine_pending_transactions(wallet.address());
//! assert!(ledger.is_chain_valid());
//! ```

pub mod api;
pub mod blockchain;
pub mod config;

pub use blockchain::{Address, Block, Blockchain, LedgerError, Transaction, Wallet};
pub use config::Config;
