// Conditional Markets - Main Entry Point

use conditional_markets::app_state::{AppState, SharedState};
use conditional_markets::config::Config;
use conditional_markets::handlers::router;
use conditional_markets::Ed25519Verifier;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // `keygen` prints a fresh attester keypair and exits
    if std::env::args().nth(1).as_deref() == Some("keygen") {
        let (key, verifier) = Ed25519Verifier::generate();
        println!("ATTESTER_SECRET_KEY={}", hex::encode(key.to_bytes()));
        println!("ORACLE_ATTESTER_PUBKEY={}", verifier.public_key_hex());
        return Ok(());
    }

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("═══════════════════════════════════════════════");
    info!("     🎲 Conditional Markets");
    info!("═══════════════════════════════════════════════");

    let addr = config.bind_addr;
    let state: SharedState = AppState::new(config)?.shared();

    // Clone state for shutdown handler before moving into router
    let shutdown_state = state.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server running on http://{}", addr);
    info!("📋 Endpoints: /conditions /positions /collateral /pools /oracle /events /health");
    info!("🪪 Callers identify themselves with a `sender` field");

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Failed to install CTRL+C handler: {}", e);
            return;
        }
        info!("🛑 Shutdown signal received, saving state...");
        match shutdown_state.lock() {
            Ok(app_state) => {
                if let Err(e) = app_state.save_to_disk() {
                    error!("❌ Failed to save state: {}", e);
                }
            }
            Err(_) => error!("❌ State lock poisoned, nothing saved"),
        }
        info!("👋 Goodbye!");
        std::process::exit(0);
    });

    axum::serve(listener, app).await?;
    Ok(())
}
