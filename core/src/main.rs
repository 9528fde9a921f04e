use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vanish_core::api::{router, AppState};
use vanish_core::rpc_provider::ProviderRegistry;
use vanish_core::settings::load_config;
use vanish_core::wallet::EvmWallet;

#[tokio::main]
async fn main() {
    // -------------------------------
    // Load configuration
    // -------------------------------
    let config = load_config().expect("Failed to load configuration");

    // -------------------------------
    // Initialize Tracing / Logging
    // -------------------------------
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", &config.rust_log);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Vanish starting...");
    tracing::info!(
        chain_id = config.chain_id,
        endpoints = config.rpc_urls.len(),
        signer = config.wallet_private_key.is_some(),
        "Configuration loaded"
    );

    // -------------------------------
    // Chain access
    // -------------------------------
    let deployment = config
        .deployment()
        .expect("Invalid contract configuration");

    let registry = ProviderRegistry::from_urls(&config.rpc_urls);
    registry.spawn_health_checker(config.health_check_interval());

    let wallet = EvmWallet::new(
        Arc::clone(&registry),
        config.chain_id,
        config.wallet_private_key.as_deref(),
    )
    .expect("Failed to initialize wallet");

    let state = AppState::new(
        Arc::new(wallet),
        deployment,
        config.poll_interval(),
        config.snapshot_ttl(),
        config.tx_retention(),
    );
    let app = router(state);

    // -------------------------------
    // Run Server
    // -------------------------------
    let bind_addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on http://{}", bind_addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
