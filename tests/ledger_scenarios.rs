//! Integration tests for the ledger: admission, mining, balances and audits

use powledger::blockchain::chain::DEFAULT_MINING_REWARD;
use powledger::blockchain::{Address, Blockchain, LedgerError, Transaction, Wallet};
use powledger::config::LedgerConfig;

use std::thread;

/// Helper to build a signed transfer
fn transfer(sender: &Wallet, to: &Address, amount: i64) -> Transaction {
    let mut transaction = Transaction::new(sender.address().clone(), to.clone(), amount);
    transaction
        .sign(sender.secret_key())
        .expect("sender owns the address");
    transaction
}

#[test]
fn test_send_then_mine_scenario() {
    let blockchain = Blockchain::new();
    blockchain.set_mining_reward(100);
    assert_eq!(blockchain.len(), 1);

    let alice = Wallet::new();
    let bob = Wallet::new();

    blockchain
        .add_transaction(transfer(&alice, bob.address(), 100))
        .unwrap();

    let previous_hash = blockchain.get_latest_block().hash;
    let block = blockchain.mine_pending_transactions(alice.address());

    assert_eq!(blockchain.len(), 2);
    assert_eq!(block.previous_hash, previous_hash);
    assert!(block.hash.starts_with(&"0".repeat(blockchain.difficulty())));

    // -100 sent, +100 reward
    assert_eq!(blockchain.get_balance_of_address(alice.address()), 0);
    assert_eq!(blockchain.get_balance_of_address(bob.address()), 100);
    assert!(blockchain.is_chain_valid());
}

#[test]
fn test_signed_by_another_keypair_is_rejected() {
    let blockchain = Blockchain::new();
    let alice = Wallet::new();
    let mallory = Wallet::new();

    // Mallory signs her own transfer and relabels it as coming from Alice
    let mut forged = transfer(&mallory, &Address::from("mallory"), 10);
    forged.from_address = Some(alice.address().clone());

    let result = blockchain.add_transaction(forged);
    assert!(matches!(result, Err(LedgerError::InvalidSignature)));
    assert!(blockchain.get_pending_transactions().is_empty());
}

#[test]
fn test_reward_only_chain() {
    let blockchain = Blockchain::new();
    let miner = Address::from("miner");

    blockchain.mine_pending_transactions(&miner);

    assert_eq!(
        blockchain.get_balance_of_address(&miner),
        i128::from(DEFAULT_MINING_REWARD)
    );
    assert_eq!(blockchain.get_balance_of_address(&Address::from("other")), 0);

    let history = blockchain.get_all_transactions_for_wallet(&miner);
    assert_eq!(history.len(), 1);
    assert!(history[0].is_reward());
}

#[test]
fn test_history_is_in_chain_order() {
    let blockchain = Blockchain::with_config(&LedgerConfig {
        difficulty: 1,
        mining_reward: 5,
    })
    .unwrap();

    let alice = Wallet::new();
    let bob = Address::from("bob");

    for amount in [1, 2, 3] {
        blockchain
            .add_transaction(transfer(&alice, &bob, amount))
            .unwrap();
        blockchain.mine_pending_transactions(alice.address());
    }

    let amounts: Vec<i64> = blockchain
        .get_all_transactions_for_wallet(&bob)
        .iter()
        .map(|tx| tx.amount)
        .collect();
    assert_eq!(amounts, vec![1, 2, 3]);

    // 3 rewards of 5, minus 6 sent
    assert_eq!(blockchain.get_balance_of_address(alice.address()), 9);
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = Blockchain::with_config(&LedgerConfig {
        difficulty: 65,
        mining_reward: 1,
    });
    assert!(matches!(result, Err(LedgerError::InvalidDifficulty { .. })));
}

#[test]
fn test_readers_never_see_a_broken_chain() {
    let blockchain = Blockchain::new();
    blockchain.set_difficulty(1).unwrap();
    let miner = Wallet::new();

    thread::scope(|scope| {
        let writer = blockchain.clone();
        let miner = &miner;
        scope.spawn(move || {
            for amount in 1..=10 {
                writer
                    .add_transaction(transfer(miner, &Address::from("bob"), amount))
                    .unwrap();
                writer.mine_pending_transactions(miner.address());
            }
        });

        for _ in 0..4 {
            let reader = blockchain.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    assert!(reader.is_chain_valid());
                    let chain = reader.get_chain();
                    for pair in chain.windows(2) {
                        assert_eq!(pair[1].previous_hash, pair[0].hash);
                    }
                }
            });
        }
    });

    assert_eq!(blockchain.len(), 11);
    assert!(blockchain.get_pending_transactions().is_empty());
}

#[test]
fn test_concurrent_miners_extend_one_chain() {
    let blockchain = Blockchain::new();
    blockchain.set_difficulty(1).unwrap();

    thread::scope(|scope| {
        for i in 0..4 {
            let ledger = blockchain.clone();
            scope.spawn(move || {
                ledger.mine_pending_transactions(&Address(format!("miner-{}", i)));
            });
        }
    });

    let chain = blockchain.get_chain();
    assert_eq!(chain.len(), 5);
    for (index, block) in chain.iter().enumerate() {
        assert_eq!(block.index, index as u64);
    }
    assert!(blockchain.is_chain_valid());
}
