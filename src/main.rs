// Predictum Prediction Market Ledger - Main Entry Point

use std::sync::Arc;

use predictum_ledger::{
    routes, AppState, CoinFlipResolver, Config, LifecycleScheduler, SharedState,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    config.logging.init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "❌ Server failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), BoxError> {
    tracing::info!("🎲 Predictum Prediction Market Ledger");

    let state: SharedState = Arc::new(AppState::from_config(&config)?);

    let scheduler = LifecycleScheduler::new(
        state.ledger.clone(),
        Arc::new(CoinFlipResolver),
        AppState::market_generator(&config),
        config.scheduler,
    )
    .start();

    let app = routes::router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!(addr = %config.bind_addr, "🚀 Server running");
    tracing::info!("   GET  /api/markets              - List markets (status, category, sortBy, page, limit)");
    tracing::info!("   POST /api/markets              - Create market");
    tracing::info!("   GET  /api/markets/:id          - Market details");
    tracing::info!("   POST /api/markets/:id/resolve  - Resolve market");
    tracing::info!("   GET  /api/markets/:id/quote    - Quote a prospective bet");
    tracing::info!("   POST /api/bet                  - Place bet");
    tracing::info!("   POST /api/claim/:marketId      - Claim winnings");
    tracing::info!("   GET  /api/positions            - Positions");
    tracing::info!("   GET  /api/balance              - Balance");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("🛑 Shutting down...");
    scheduler.shutdown().await;
    state.flush();
    tracing::info!("👋 Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
}
