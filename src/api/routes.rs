use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/blocks/{index}", web::get().to(handlers::get_block))
            .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
            .route("/transactions/new", web::post().to(handlers::new_transaction))
            .route("/mine", web::post().to(handlers::mine_block))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/settings", web::get().to(handlers::get_settings))
            .route("/settings", web::post().to(handlers::update_settings))
            .route("/wallet/new", web::post().to(handlers::create_wallet))
            .route("/wallet/{address}", web::get().to(handlers::get_wallet))
    );
}
