use actix_web::{web, HttpResponse, Responder};
use log::warn;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{spawn_mining, Address, Block, Blockchain, LedgerError, Transaction, Wallet};
use crate::config::MiningConfig;

/// Data structure for the blockchain state
pub type BlockchainData = web::Data<Blockchain>;

/// Mining settings shared with the handlers
pub type MiningData = web::Data<MiningConfig>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    pub amount: i64,

    /// The sender's private key (hex, for signing); the sender address is derived from it
    pub private_key: String,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The signed transaction now waiting to be mined
    pub transaction: Transaction,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The miner's address
    pub miner_address: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Current mining settings
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    pub difficulty: usize,
    pub mining_reward: i64,
}

/// Request for the settings endpoint; absent fields are left unchanged
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SettingsRequest {
    pub difficulty: Option<usize>,
    pub mining_reward: Option<i64>,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Balance and history of one address
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletSummary {
    pub address: String,
    pub balance: i128,
    pub transactions: Vec<Transaction>,
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.get_chain();
    let is_valid = blockchain.is_chain_valid();

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Get one block
///
/// Returns the block at the given index together with its transactions
#[utoipa::path(
    get,
    path = "/api/v1/blocks/{index}",
    params(
        ("index" = u64, Path, description = "Index of the block in the chain")
    ),
    responses(
        (status = 200, description = "Block retrieved successfully", body = Block),
        (status = 404, description = "No block at this index")
    )
)]
pub async fn get_block(blockchain: BlockchainData, index: web::Path<u64>) -> impl Responder {
    let index = index.into_inner();

    match blockchain.get_block(index) {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("Block {} not found", index)
        })),
    }
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    let transactions = blockchain.get_pending_transactions();
    HttpResponse::Ok().json(transactions)
}

/// Create a new transaction
///
/// Signs a transfer with the given key and adds it to the pending transactions
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data")
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    // Create a wallet from the private key
    let private_key_bytes = match hex::decode(&transaction_req.private_key) {
        Ok(bytes) => bytes,
        Err(_) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid private key format. Must be a hex string."
            }));
        }
    };

    let wallet = match Wallet::from_secret_key(&private_key_bytes) {
        Ok(wallet) => wallet,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid private key: {}", err)
            }));
        }
    };

    let mut transaction = Transaction::new(
        wallet.address().clone(),
        Address(transaction_req.recipient.clone()),
        transaction_req.amount,
    );

    // Sign the transaction
    if let Err(err) = transaction.sign(wallet.secret_key()) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to sign transaction: {}", err)
        }));
    }

    // Add the transaction to the blockchain; a rejection is reported, never retried
    match blockchain.add_transaction(transaction.clone()) {
        Ok(()) => {
            let response = TransactionResponse {
                message: "Transaction will be added to the next block".to_string(),
                transaction,
            };

            HttpResponse::Created().json(response)
        }
        Err(err) => {
            warn!("Transaction rejected: {}", err);
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Failed to add transaction: {}", err)
            }))
        }
    }
}

/// Mine a new block
///
/// Mines all pending transactions in the background and waits for the
/// result, up to the configured timeout
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Invalid mining request"),
        (status = 503, description = "Mining timed out and was cancelled"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(
    blockchain: BlockchainData,
    mining: MiningData,
    mine_req: web::Json<MineRequest>,
) -> impl Responder {
    if mine_req.miner_address.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Miner address must not be empty"
        }));
    }

    let miner_address = Address(mine_req.miner_address.clone());
    let handle = spawn_mining(blockchain.get_ref().clone(), miner_address);

    match handle.join_timeout(mining.timeout()).await {
        Ok(block) => {
            let response = MineResponse {
                message: "New Block Mined".to_string(),
                block,
            };

            HttpResponse::Ok().json(response)
        }
        Err(err @ LedgerError::MiningTimedOut(_)) => {
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "error": format!("Failed to mine block: {}", err)
            }))
        }
        Err(err) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to mine block: {}", err)
        })),
    }
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    let is_valid = blockchain.is_chain_valid();
    HttpResponse::Ok().json(is_valid)
}

/// Get mining settings
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    responses(
        (status = 200, description = "Current mining settings", body = SettingsResponse)
    )
)]
pub async fn get_settings(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(SettingsResponse {
        difficulty: blockchain.difficulty(),
        mining_reward: blockchain.mining_reward(),
    })
}

/// Update mining settings
///
/// Changes take effect with the next mined block
#[utoipa::path(
    post,
    path = "/api/v1/settings",
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = SettingsResponse),
        (status = 400, description = "Invalid settings")
    )
)]
pub async fn update_settings(
    blockchain: BlockchainData,
    settings_req: web::Json<SettingsRequest>,
) -> impl Responder {
    if let Some(difficulty) = settings_req.difficulty {
        if let Err(err) = blockchain.set_difficulty(difficulty) {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": err.to_string()
            }));
        }
    }

    if let Some(reward) = settings_req.mining_reward {
        blockchain.set_mining_reward(reward);
    }

    HttpResponse::Ok().json(SettingsResponse {
        difficulty: blockchain.difficulty(),
        mining_reward: blockchain.mining_reward(),
    })
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let wallet = Wallet::new();

    let response = WalletResponse {
        address: wallet.address().0.clone(),
        private_key: hex::encode(wallet.export_secret_key()),
    };

    HttpResponse::Created().json(response)
}

/// Get a wallet
///
/// Returns the balance and every transaction of an address
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{address}",
    params(
        ("address" = String, Path, description = "Wallet address")
    ),
    responses(
        (status = 200, description = "Wallet retrieved successfully", body = WalletSummary)
    )
)]
pub async fn get_wallet(blockchain: BlockchainData, address: web::Path<String>) -> impl Responder {
    let wallet_address = Address(address.into_inner());

    let response = WalletSummary {
        balance: blockchain.get_balance_of_address(&wallet_address),
        transactions: blockchain.get_all_transactions_for_wallet(&wallet_address),
        address: wallet_address.0,
    };

    HttpResponse::Ok().json(response)
}
