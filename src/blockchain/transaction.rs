use chrono::Utc;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::crypto::{
    derive_public_key, sign_message, verify_signature, Address, CryptoError, DigitalSignature,
};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("You cannot sign transactions for other wallets")]
    SignerMismatch,

    #[error("No signature in this transaction")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Represents a value transfer in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,

    /// Sender's address; absent for mining rewards
    pub from_address: Option<Address>,

    /// Recipient's address
    pub to_address: Address,

    /// Amount being transferred
    pub amount: i64,

    /// Creation time in Unix seconds
    pub timestamp: i64,

    /// Signature over the transaction hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transfer
    ///
    /// # Arguments
    ///
    /// * `from_address` - The address of the sender
    /// * `to_address` - The address of the recipient
    /// * `amount` - The amount to transfer
    pub fn new(from_address: Address, to_address: Address, amount: i64) -> Self {
        Self::build(Some(from_address), to_address, amount)
    }

    /// Creates a reward transaction minted by the system
    ///
    /// # Arguments
    ///
    /// * `to_address` - The address of the miner
    /// * `amount` - The reward amount
    pub fn new_reward(to_address: Address, amount: i64) -> Self {
        Self::build(None, to_address, amount)
    }

    fn build(from_address: Option<Address>, to_address: Address, amount: i64) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            from_address,
            to_address,
            amount,
            timestamp: Utc::now().timestamp(),
            signature: None,
        }
    }

    /// Calculates the SHA-256 hash over `from ‖ to ‖ amount ‖ timestamp`
    ///
    /// An absent sender contributes the empty string.
    pub fn calculate_hash(&self) -> String {
        let from = self.from_address.as_ref().map(Address::as_str).unwrap_or("");
        let preimage = format!(
            "{}{}{}{}",
            from, self.to_address, self.amount, self.timestamp
        );

        format!("{:x}", Sha256::digest(preimage.as_bytes()))
    }

    /// Signs the transaction with the key owning `from_address`
    ///
    /// # Arguments
    ///
    /// * `signing_key` - The sender's private key
    pub fn sign(&mut self, signing_key: &SecretKey) -> Result<(), TransactionError> {
        let signer = Address::from_public_key(&derive_public_key(signing_key));

        if self.from_address.as_ref() != Some(&signer) {
            return Err(TransactionError::SignerMismatch);
        }

        let hash = self.calculate_hash();
        self.signature = Some(sign_message(hash.as_bytes(), signing_key));

        Ok(())
    }

    /// Checks the signature against the sender's address
    ///
    /// Reward transactions are always valid.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let from_address = match &self.from_address {
            Some(address) => address,
            None => return Ok(true),
        };

        let signature = match &self.signature {
            Some(sig) if !sig.0.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        let public_key = from_address.to_public_key()?;
        let hash = self.calculate_hash();

        Ok(verify_signature(hash.as_bytes(), signature, &public_key)?)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// Checks if the address is the sender or recipient
    pub fn involves(&self, address: &Address) -> bool {
        self.from_address.as_ref() == Some(address) || &self.to_address == address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;

    fn signed_transfer(sender: &Wallet, amount: i64) -> Transaction {
        let mut transaction = Transaction::new(
            sender.address().clone(),
            Address::from("recipient"),
            amount,
        );
        transaction.sign(sender.secret_key()).unwrap();
        transaction
    }

    #[test]
    fn test_new_transaction() {
        let sender_wallet = Wallet::new();
        let recipient_wallet = Wallet::new();

        let transaction = Transaction::new(
            sender_wallet.address().clone(),
            recipient_wallet.address().clone(),
            10,
        );

        assert_eq!(transaction.from_address.as_ref(), Some(sender_wallet.address()));
        assert_eq!(transaction.to_address, *recipient_wallet.address());
        assert_eq!(transaction.amount, 10);
        assert!(!transaction.id.is_empty());
        assert!(transaction.signature.is_none());
    }

    #[test]
    fn test_hash_is_stable_and_field_sensitive() {
        let transaction = Transaction::new(Address::from("a"), Address::from("b"), 5);
        assert_eq!(transaction.calculate_hash(), transaction.calculate_hash());
        assert_eq!(transaction.calculate_hash().len(), 64);

        let mut changed = transaction.clone();
        changed.amount = 6;
        assert_ne!(changed.calculate_hash(), transaction.calculate_hash());

        let mut changed = transaction.clone();
        changed.timestamp += 1;
        assert_ne!(changed.calculate_hash(), transaction.calculate_hash());

        // The id does not take part in the hash
        let mut changed = transaction.clone();
        changed.id = "other".to_string();
        assert_eq!(changed.calculate_hash(), transaction.calculate_hash());
    }

    #[test]
    fn test_hash_preimage_format() {
        let mut transaction = Transaction::new(Address::from("alice"), Address::from("bob"), 100);
        transaction.timestamp = 1_600_000_000;

        let expected = format!("{:x}", Sha256::digest(b"alicebob1001600000000"));
        assert_eq!(transaction.calculate_hash(), expected);

        let mut reward = Transaction::new_reward(Address::from("bob"), 100);
        reward.timestamp = 1_600_000_000;
        let expected = format!("{:x}", Sha256::digest(b"bob1001600000000"));
        assert_eq!(reward.calculate_hash(), expected);
    }

    #[test]
    fn test_sign_transaction() {
        let sender_wallet = Wallet::new();
        let transaction = signed_transfer(&sender_wallet, 10);

        // Verify that the transaction is signed
        assert!(transaction.signature.is_some());

        // Verify the signature
        assert!(transaction.is_valid().unwrap());
    }

    #[test]
    fn test_sign_with_foreign_key_fails() {
        let sender_wallet = Wallet::new();
        let other_wallet = Wallet::new();

        let mut transaction = Transaction::new(
            sender_wallet.address().clone(),
            Address::from("recipient"),
            10,
        );

        let result = transaction.sign(other_wallet.secret_key());
        assert!(matches!(result, Err(TransactionError::SignerMismatch)));
        assert!(transaction.signature.is_none());
    }

    #[test]
    fn test_tampering_invalidates_signature() {
        let sender_wallet = Wallet::new();
        let transaction = signed_transfer(&sender_wallet, 10);

        let mut tampered = transaction.clone();
        tampered.amount = 1_000;
        assert!(!tampered.is_valid().unwrap());

        let mut tampered = transaction.clone();
        tampered.to_address = Address::from("thief");
        assert!(!tampered.is_valid().unwrap());

        let mut tampered = transaction.clone();
        tampered.timestamp -= 10;
        assert!(!tampered.is_valid().unwrap());

        // Claiming another real wallet as sender breaks verification too
        let mut tampered = transaction;
        tampered.from_address = Some(Wallet::new().address().clone());
        assert!(!tampered.is_valid().unwrap());
    }

    #[test]
    fn test_unsigned_transfer_is_rejected() {
        let sender_wallet = Wallet::new();
        let transaction = Transaction::new(
            sender_wallet.address().clone(),
            Address::from("recipient"),
            10,
        );

        assert!(matches!(
            transaction.is_valid(),
            Err(TransactionError::MissingSignature)
        ));
    }

    #[test]
    fn test_reward_transaction() {
        let miner_wallet = Wallet::new();
        let transaction = Transaction::new_reward(miner_wallet.address().clone(), 50);

        assert!(transaction.from_address.is_none());
        assert_eq!(transaction.to_address, *miner_wallet.address());
        assert_eq!(transaction.amount, 50);
        assert!(transaction.is_reward());
        assert!(transaction.is_valid().unwrap());
        assert!(transaction.involves(miner_wallet.address()));
    }
}
