use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use powledger::api;
use powledger::blockchain::{self, Address, Blockchain, Transaction, Wallet};
use powledger::config::Config;

// Seed the ledger with two signed transfers from a fresh wallet and mine them
fn seed_demo_transactions(blockchain: &Blockchain) -> Wallet {
    let wallet = Wallet::new();
    info!("Created demo wallet with address: {}", wallet.address());

    for (recipient, amount) in [("123456789", 100), ("987654321", 50)] {
        let mut transaction =
            Transaction::new(wallet.address().clone(), Address::from(recipient), amount);

        if let Err(err) = transaction.sign(wallet.secret_key()) {
            warn!("Failed to sign demo transaction to {}: {}", recipient, err);
            continue;
        }

        if let Err(err) = blockchain.add_transaction(transaction) {
            warn!("Demo transaction to {} rejected: {}", recipient, err);
        }
    }

    let block = blockchain.mine_pending_transactions(wallet.address());
    info!(
        "Demo block {} mined, wallet balance is {}",
        block.index,
        blockchain.get_balance_of_address(wallet.address())
    );

    wallet
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_block,
        api::handlers::get_pending_transactions,
        api::handlers::new_transaction,
        api::handlers::mine_block,
        api::handlers::validate_chain,
        api::handlers::get_settings,
        api::handlers::update_settings,
        api::handlers::create_wallet,
        api::handlers::get_wallet
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::crypto::Address,
            blockchain::crypto::DigitalSignature,
            api::handlers::ChainResponse,
            api::handlers::TransactionRequest,
            api::handlers::TransactionResponse,
            api::handlers::MineRequest,
            api::handlers::MineResponse,
            api::handlers::SettingsRequest,
            api::handlers::SettingsResponse,
            api::handlers::WalletResponse,
            api::handlers::WalletSummary
        )
    ),
    tags(
        (name = "ledger", description = "Proof of work ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "0.1.0",
        description = "A minimal proof of work ledger API",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load_from_env().context("Failed to load configuration")?;

    let blockchain = Blockchain::with_config(&config.ledger)
        .context("Failed to create the ledger")?;
    seed_demo_transactions(&blockchain);

    let blockchain = web::Data::new(blockchain);
    let mining = web::Data::new(config.mining.clone());

    let bind = (config.server.host.clone(), config.server.port);
    info!("Starting HTTP server at http://{}:{}", bind.0, bind.1);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            .app_data(mining.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind(bind)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server failed")
}
